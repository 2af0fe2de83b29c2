//! Payment order tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A gateway-side payment intent, tracked locally from order creation until
/// the verification callback confirms or refutes it.
///
/// The gateway-issued `order_id` is the join key between the outbound
/// order-creation call and the inbound verification callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrder {
    /// Gateway-issued order id.
    pub order_id: String,

    /// The purchasing user.
    pub user_id: UserId,

    /// The plan id requested at order creation.
    pub plan_id: String,

    /// Monetary amount in the currency's minor unit.
    pub amount: i64,

    /// ISO currency code.
    pub currency: String,

    /// Gateway payment id, assigned by the verification callback.
    pub payment_id: Option<String>,

    /// Current status. Transitions one way: PENDING to SUCCESS or FAILED.
    pub status: OrderStatus,

    /// Credits granted to the ledger; zero until the order succeeds.
    pub credits_granted: i64,

    /// Purchaser display name snapshot, when a profile exists.
    pub purchaser_name: Option<String>,

    /// Purchaser email snapshot, when a profile exists.
    pub purchaser_email: Option<String>,

    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

impl PaymentOrder {
    /// Create a new pending order.
    #[must_use]
    pub fn new(
        order_id: impl Into<String>,
        user_id: UserId,
        plan_id: impl Into<String>,
        amount: i64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            user_id,
            plan_id: plan_id.into(),
            amount,
            currency: currency.into(),
            payment_id: None,
            status: OrderStatus::Pending,
            credits_granted: 0,
            purchaser_name: None,
            purchaser_email: None,
            created_at: Utc::now(),
        }
    }
}

/// Status of a payment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting the gateway's verification callback.
    Pending,

    /// Verified; credits were granted.
    Success,

    /// Verification failed or the plan was invalid.
    Failed,
}

impl OrderStatus {
    /// Whether this status is terminal. Terminal orders never transition
    /// again, so duplicate callbacks cannot double-credit.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_order_is_pending() {
        let order = PaymentOrder::new("order_1", UserId::generate(), "pro", 2900, "USD");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.credits_granted, 0);
        assert!(order.payment_id.is_none());
    }

    #[test]
    fn terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Success.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
    }
}
