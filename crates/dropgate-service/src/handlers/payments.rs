//! Payment reconciliation handlers: order creation, callback verification,
//! and order history.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use dropgate_core::{PaymentOrder, Plan};
use dropgate_store::{OrderSettle, Store};

use crate::auth::AuthUser;
use crate::crypto;
use crate::error::ApiError;
use crate::state::AppState;

/// Order creation request.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Amount in the currency's minor unit.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Plan id to purchase.
    pub plan_id: String,
}

/// Order creation result. Failures are reported in-band, never as transport
/// errors.
#[derive(Debug, Serialize)]
pub struct OrderResult {
    /// Whether the order was created.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// The gateway-issued order id on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

impl OrderResult {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            order_id: None,
        }
    }
}

/// Create a payment order with the gateway and record it PENDING.
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateOrderRequest>,
) -> Result<Json<OrderResult>, ApiError> {
    let Some(gateway) = state.gateway.as_ref() else {
        return Ok(Json(OrderResult::failure("Payment gateway not configured")));
    };

    if body.amount <= 0 {
        return Ok(Json(OrderResult::failure("Amount must be positive")));
    }

    let receipt = format!("order_{}", chrono::Utc::now().timestamp_millis());

    let gateway_order = match gateway
        .create_order(body.amount, &body.currency, &receipt)
        .await
    {
        Ok(order) => order,
        Err(e) => {
            tracing::error!(user_id = %auth.user_id, error = %e, "Gateway order creation failed");
            return Ok(Json(OrderResult::failure(format!(
                "Error creating order: {e}"
            ))));
        }
    };

    let mut order = PaymentOrder::new(
        &gateway_order.id,
        auth.user_id,
        &body.plan_id,
        body.amount,
        &body.currency,
    );

    // Snapshot purchaser details when a profile exists
    if let Ok(Some(profile)) = state.store.get_profile(&auth.user_id) {
        order.purchaser_name = profile.display_name();
        order.purchaser_email = profile.email.clone();
    }

    if let Err(e) = state.store.put_order(&order) {
        tracing::error!(
            order_id = %order.order_id,
            error = %e,
            "Failed to record pending order"
        );
        return Ok(Json(OrderResult::failure(format!(
            "Error recording order: {e}"
        ))));
    }

    tracing::info!(
        order_id = %order.order_id,
        user_id = %auth.user_id,
        plan_id = %body.plan_id,
        amount = body.amount,
        "Payment order created"
    );

    Ok(Json(OrderResult {
        success: true,
        message: "Order created successfully".into(),
        order_id: Some(order.order_id),
    }))
}

/// Verification callback request.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    /// The order under verification.
    pub order_id: String,
    /// Gateway-assigned payment id.
    pub payment_id: String,
    /// Gateway signature over `order_id|payment_id`.
    pub signature: String,
    /// Plan id the purchase was for.
    pub plan_id: String,
}

/// Verification result.
#[derive(Debug, Serialize)]
pub struct VerifyResult {
    /// Whether verification (or an idempotent replay) succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Balance after crediting, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<i64>,
}

impl VerifyResult {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            credits: None,
        }
    }
}

/// Verify a payment callback and credit the ledger at most once.
pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyResult>, ApiError> {
    // An order belongs to whoever created it; someone else's probe must not
    // flip it FAILED, so ownership is checked before the catch-all below.
    if let Some(order) = state.store.get_order(&body.order_id)? {
        if order.user_id != auth.user_id {
            return Err(ApiError::Forbidden("order belongs to another user".into()));
        }
    }

    match apply_verification(&state, &body) {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            // A verification attempt must never leave the order PENDING.
            if let Err(update_err) = state.store.fail_order(&body.order_id, Some(&body.payment_id))
            {
                tracing::error!(
                    order_id = %body.order_id,
                    error = %update_err,
                    "Failed to mark order FAILED after verification error"
                );
            }
            tracing::error!(order_id = %body.order_id, error = %e, "Payment verification errored");
            Ok(Json(VerifyResult::failure(format!(
                "Error verifying payment: {e}"
            ))))
        }
    }
}

fn apply_verification(
    state: &AppState,
    body: &VerifyPaymentRequest,
) -> Result<VerifyResult, ApiError> {
    let Some(secret) = state.config.gateway_key_secret.as_deref() else {
        return Ok(VerifyResult::failure("Payment gateway not configured"));
    };

    let Some(order) = state.store.get_order(&body.order_id)? else {
        tracing::warn!(order_id = %body.order_id, "Verification callback for unknown order");
        return Ok(VerifyResult::failure("Unknown order"));
    };

    // Terminal-state guard: a replayed callback is a no-op success, never a
    // second credit.
    if order.status.is_terminal() {
        let account = state.store.ensure_account(&order.user_id)?;
        return Ok(VerifyResult {
            success: true,
            message: "Payment already processed".into(),
            credits: Some(account.credits),
        });
    }

    let payload = format!("{}|{}", body.order_id, body.payment_id);
    let expected = crypto::hmac_sha256_hex(secret, &payload);
    if !crypto::constant_time_eq(&expected, &body.signature) {
        state
            .store
            .fail_order(&body.order_id, Some(&body.payment_id))?;
        tracing::warn!(order_id = %body.order_id, "Payment signature verification failed");
        return Ok(VerifyResult::failure(
            "Payment signature verification failed",
        ));
    }

    let Some(plan) = Plan::from_plan_id(&body.plan_id).filter(|p| p.credits_granted() > 0) else {
        state
            .store
            .fail_order(&body.order_id, Some(&body.payment_id))?;
        tracing::warn!(
            order_id = %body.order_id,
            plan_id = %body.plan_id,
            "Payment verified but plan grants no credits"
        );
        return Ok(VerifyResult::failure("Invalid plan selected"));
    };
    let credits = plan.credits_granted();

    match state
        .store
        .settle_order(&body.order_id, &body.payment_id, credits, plan)?
    {
        OrderSettle::Settled { account, .. } => {
            tracing::info!(
                order_id = %body.order_id,
                user_id = %order.user_id,
                credits_granted = credits,
                new_balance = account.credits,
                "Payment verified and credits added"
            );
            Ok(VerifyResult {
                success: true,
                message: "Payment verified and credits added successfully".into(),
                credits: Some(account.credits),
            })
        }
        OrderSettle::AlreadyFinal(_) => {
            // A concurrent duplicate won the terminal transition.
            let account = state.store.ensure_account(&order.user_id)?;
            Ok(VerifyResult {
                success: true,
                message: "Payment already processed".into(),
                credits: Some(account.credits),
            })
        }
        OrderSettle::Missing => Ok(VerifyResult::failure("Unknown order")),
    }
}

/// Payment order response.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    /// Gateway order id.
    pub order_id: String,
    /// Plan id requested.
    pub plan_id: String,
    /// Amount in minor units.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Order status.
    pub status: String,
    /// Credits granted (zero unless successful).
    pub credits_granted: i64,
    /// Gateway payment id, once assigned.
    pub payment_id: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

impl From<&PaymentOrder> for OrderResponse {
    fn from(order: &PaymentOrder) -> Self {
        Self {
            order_id: order.order_id.clone(),
            plan_id: order.plan_id.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            status: format!("{:?}", order.status).to_uppercase(),
            credits_granted: order.credits_granted,
            payment_id: order.payment_id.clone(),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

/// List the caller's payment orders, newest first.
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.store.list_orders_by_user(&auth.user_id, 50)?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}
