//! Payment gateway API types.

use serde::{Deserialize, Serialize};

/// Order creation request body.
#[derive(Debug, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in the currency's minor unit.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Caller-chosen receipt reference.
    pub receipt: String,
}

/// An order as returned by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    /// Gateway-issued order id.
    pub id: String,
    /// Amount echoed back, if present.
    #[serde(default)]
    pub amount: Option<i64>,
    /// Currency echoed back, if present.
    #[serde(default)]
    pub currency: Option<String>,
    /// Gateway-side order status, if present.
    #[serde(default)]
    pub status: Option<String>,
}

/// Error body returned by the gateway API.
#[derive(Debug, Deserialize)]
pub struct GatewayErrorResponse {
    /// Error details.
    pub error: GatewayErrorBody,
}

/// Error details.
#[derive(Debug, Deserialize)]
pub struct GatewayErrorBody {
    /// Machine-readable error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}
