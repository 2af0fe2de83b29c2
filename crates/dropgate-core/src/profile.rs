//! User profile snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A snapshot of identity-provider profile data.
///
/// Profiles are written only by the identity-provider webhook; dropgate never
/// edits them on its own. The credit account and file records are
/// garbage-collected together with the profile when the identity is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// The user this profile belongs to.
    pub user_id: UserId,

    /// Primary email address.
    pub email: Option<String>,

    /// First name.
    pub first_name: Option<String>,

    /// Last name.
    pub last_name: Option<String>,

    /// Avatar URL.
    pub photo_url: Option<String>,

    /// When the profile was first seen.
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Create an empty profile for a user.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            email: None,
            first_name: None,
            last_name: None,
            photo_url: None,
            created_at: Utc::now(),
        }
    }

    /// Display name assembled from the name parts, if any are present.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.to_string()),
            (None, Some(last)) => Some(last.to_string()),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_variants() {
        let mut profile = Profile::new(UserId::generate());
        assert_eq!(profile.display_name(), None);

        profile.first_name = Some("Ada".into());
        assert_eq!(profile.display_name().as_deref(), Some("Ada"));

        profile.last_name = Some("Lovelace".into());
        assert_eq!(profile.display_name().as_deref(), Some("Ada Lovelace"));
    }
}
