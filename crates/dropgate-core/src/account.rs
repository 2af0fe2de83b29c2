//! Credit ledger types.
//!
//! This module defines the per-user credit account and the plan tiers that
//! determine how many credits a successful payment grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Credits granted to a freshly created account.
pub const STARTING_CREDITS: i64 = 5;

/// The authoritative credit balance and plan record for one user.
///
/// Accounts are created lazily the first time a balance is needed and are
/// deleted only when the owning identity is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAccount {
    /// The owning user.
    pub user_id: UserId,

    /// Current credit balance. Invariant: never negative.
    pub credits: i64,

    /// The plan label set by the most recent successful payment.
    pub plan: Plan,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl CreditAccount {
    /// Create a new account with the starting grant on the starter plan.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            credits: STARTING_CREDITS,
            plan: Plan::Starter,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the balance covers `required` credits.
    #[must_use]
    pub const fn has_at_least(&self, required: i64) -> bool {
        self.credits >= required
    }
}

/// Entitlement tiers. The tier determines the credit grant of a successful
/// payment; it carries no recurring semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Default tier for new accounts. Purchasable plans never resolve to it.
    Starter,

    /// Plus: 500 credits per purchase.
    Plus,

    /// Pro: 2000 credits per purchase.
    Pro,

    /// Business: 5000 credits per purchase.
    Business,

    /// Enterprise: effectively unmetered.
    Enterprise,
}

impl Plan {
    /// Resolve a gateway-facing plan id to a plan.
    ///
    /// Unknown ids resolve to `None`; callers treat them the same as
    /// zero-credit plans.
    #[must_use]
    pub fn from_plan_id(plan_id: &str) -> Option<Self> {
        match plan_id {
            "starter" => Some(Self::Starter),
            "plus" => Some(Self::Plus),
            "pro" => Some(Self::Pro),
            "business" => Some(Self::Business),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }

    /// Credits granted when a payment for this plan succeeds.
    #[must_use]
    pub const fn credits_granted(&self) -> i64 {
        match self {
            Self::Starter => 0,
            Self::Plus => 500,
            Self::Pro => 2000,
            Self::Business => 5000,
            Self::Enterprise => 1_000_000_000,
        }
    }

    /// The label stored on the ledger and shown to users.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Starter => "STARTER",
            Self::Plus => "PLUS",
            Self::Pro => "PRO",
            Self::Business => "BUSINESS",
            Self::Enterprise => "ENTERPRISE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_has_starting_grant() {
        let account = CreditAccount::new(UserId::generate());
        assert_eq!(account.credits, STARTING_CREDITS);
        assert_eq!(account.plan, Plan::Starter);
    }

    #[test]
    fn has_at_least_boundaries() {
        let mut account = CreditAccount::new(UserId::generate());
        account.credits = 3;

        assert!(account.has_at_least(0));
        assert!(account.has_at_least(3));
        assert!(!account.has_at_least(4));
    }

    #[test]
    fn plan_credit_table() {
        assert_eq!(Plan::Starter.credits_granted(), 0);
        assert_eq!(Plan::Plus.credits_granted(), 500);
        assert_eq!(Plan::Pro.credits_granted(), 2000);
        assert_eq!(Plan::Business.credits_granted(), 5000);
        assert_eq!(Plan::Enterprise.credits_granted(), 1_000_000_000);
    }

    #[test]
    fn plan_id_resolution() {
        assert_eq!(Plan::from_plan_id("plus"), Some(Plan::Plus));
        assert_eq!(Plan::from_plan_id("pro"), Some(Plan::Pro));
        assert_eq!(Plan::from_plan_id("business"), Some(Plan::Business));
        assert_eq!(Plan::from_plan_id("enterprise"), Some(Plan::Enterprise));
        assert_eq!(Plan::from_plan_id("starter"), Some(Plan::Starter));
        assert_eq!(Plan::from_plan_id("gold"), None);
    }
}
