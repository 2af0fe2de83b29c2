//! Application state.

use std::sync::Arc;

use dropgate_store::RocksStore;

use crate::config::ServiceConfig;
use crate::gateway::GatewayClient;
use crate::storage::BlobStorage;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The metadata storage backend.
    pub store: Arc<RocksStore>,

    /// The blob storage backend.
    pub storage: Arc<dyn BlobStorage>,

    /// Payment gateway client (optional).
    pub gateway: Option<Arc<GatewayClient>>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        store: Arc<RocksStore>,
        storage: Arc<dyn BlobStorage>,
        config: ServiceConfig,
    ) -> Self {
        // Create the gateway client if configured
        let gateway = config
            .gateway_key_id
            .as_ref()
            .zip(config.gateway_key_secret.as_ref())
            .map(|(key_id, key_secret)| {
                tracing::info!(gateway_url = %config.gateway_api_url, "Payment gateway enabled");
                Arc::new(GatewayClient::new(
                    &config.gateway_api_url,
                    key_id,
                    key_secret,
                ))
            });

        if gateway.is_none() {
            tracing::warn!("Payment gateway not configured - credit purchases will not be available");
        }

        if config.identity_webhook_secret.is_none() {
            tracing::warn!(
                "Identity webhook secret not configured - webhook deliveries will be rejected"
            );
        }

        Self {
            store,
            storage,
            gateway,
            config,
        }
    }

    /// Check if the payment gateway is configured.
    #[must_use]
    pub fn has_gateway(&self) -> bool {
        self.gateway.is_some()
    }
}
