//! Stored-file metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FileId, UserId};

/// Metadata for one stored file.
///
/// The record references the physical bytes through `location`, an opaque
/// handle issued by the blob storage backend. `storage_key` is generated
/// independently of the display name so two uploads named `report.pdf` never
/// collide on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique record ID (ULID, time-ordered).
    pub id: FileId,

    /// The owning user. Immutable after creation.
    pub owner: UserId,

    /// Display name as uploaded.
    pub name: String,

    /// Stored byte length.
    pub size_bytes: u64,

    /// Content type as reported by the uploader, if any.
    pub content_type: Option<String>,

    /// Opaque location handle issued by the blob storage backend.
    pub location: String,

    /// Generated storage key, decoupled from the display name.
    pub storage_key: String,

    /// Whether non-owners may read the file.
    pub is_public: bool,

    /// When the record was created.
    pub uploaded_at: DateTime<Utc>,
}

impl FileRecord {
    /// Create a new private record for a freshly stored file.
    #[must_use]
    pub fn new(
        owner: UserId,
        name: impl Into<String>,
        size_bytes: u64,
        content_type: Option<String>,
        location: impl Into<String>,
        storage_key: impl Into<String>,
    ) -> Self {
        Self {
            id: FileId::generate(),
            owner,
            name: name.into(),
            size_bytes,
            content_type,
            location: location.into(),
            storage_key: storage_key.into(),
            is_public: false,
            uploaded_at: Utc::now(),
        }
    }

    /// Whether `caller` owns this record.
    #[must_use]
    pub fn is_owned_by(&self, caller: &UserId) -> bool {
        self.owner == *caller
    }
}

/// Generate a storage key for a display name: a random UUID carrying over the
/// original extension, so the stored name leaks nothing and never collides.
#[must_use]
pub fn storage_key_for(name: &str) -> String {
    let key = uuid::Uuid::new_v4();
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => format!("{key}.{ext}"),
        _ => key.to_string(),
    }
}
