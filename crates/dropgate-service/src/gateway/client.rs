//! Payment gateway API client implementation.

use reqwest::Client;
use std::time::Duration;

use super::types::{CreateOrderRequest, GatewayErrorResponse, GatewayOrder};

/// Error type for gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway API returned an error.
    #[error("gateway API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },
}

/// Payment gateway API client.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl GatewayClient {
    /// Create a new gateway client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Gateway API URL
    /// * `key_id` - API key id (basic auth username)
    /// * `key_secret` - API key secret (basic auth password)
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }

    /// Create an order, returning the gateway-issued order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the gateway rejects it.
    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        let url = format!("{}/v1/orders", self.base_url);
        let request = CreateOrderRequest {
            amount,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<GatewayErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.error.description)
                .unwrap_or_else(|| "order creation rejected".to_string());

            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let order: GatewayOrder = response.json().await?;

        tracing::info!(
            order_id = %order.id,
            amount = %amount,
            currency = %currency,
            "Gateway order created"
        );

        Ok(order)
    }
}
