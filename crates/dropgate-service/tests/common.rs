//! Common test utilities for dropgate integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use base64::Engine as _;
use tempfile::TempDir;

use dropgate_core::UserId;
use dropgate_service::{create_router, AppState, LocalDiskStorage, ServiceConfig};
use dropgate_store::RocksStore;

/// The shared gateway secret used to sign verification callbacks in tests.
pub const GATEWAY_SECRET: &str = "test-gateway-secret";

/// Raw key material behind the identity webhook secret.
pub const WEBHOOK_KEY: &[u8] = b"dropgate-test-webhook-key";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for database and blobs (kept alive for the test).
    pub _temp_dir: TempDir,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// Direct store handle for seeding and asserting persisted state.
    pub store: Arc<RocksStore>,
    /// Root of the blob directory.
    pub blob_root: PathBuf,
}

impl TestHarness {
    /// Create a new test harness with a fresh database and gateway configured
    /// against an unreachable address (order creation will fail fast).
    pub fn new() -> Self {
        Self::build(Some("http://127.0.0.1:1".to_string()))
    }

    /// Create a harness whose gateway client points at the given URL
    /// (typically a wiremock server).
    pub fn with_gateway_url(url: impl Into<String>) -> Self {
        Self::build(Some(url.into()))
    }

    /// Create a harness with no payment gateway configured.
    pub fn without_gateway() -> Self {
        Self::build(None)
    }

    fn build(gateway_url: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("db");
        let blob_root = temp_dir.path().join("blobs");

        let store = Arc::new(RocksStore::open(&db_path).expect("Failed to open store"));
        let storage = Arc::new(LocalDiskStorage::new(&blob_root));

        let webhook_secret = format!(
            "whsec_{}",
            base64::engine::general_purpose::STANDARD.encode(WEBHOOK_KEY)
        );

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: db_path.to_string_lossy().to_string(),
            upload_dir: blob_root.to_string_lossy().to_string(),
            auth_base_url: "http://localhost".into(),
            auth_audience: "dropgate".into(),
            gateway_api_url: gateway_url
                .clone()
                .unwrap_or_else(|| "http://127.0.0.1:1".into()),
            gateway_key_id: gateway_url.as_ref().map(|_| "test-key-id".into()),
            gateway_key_secret: gateway_url.map(|_| GATEWAY_SECRET.into()),
            identity_webhook_secret: Some(webhook_secret),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        };

        let state = AppState::new(Arc::clone(&store), storage, config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            _temp_dir: temp_dir,
            test_user_id,
            store,
            blob_root,
        }
    }

    /// Get the authorization header for the harness user.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer test-token:{}", self.test_user_id)
    }

    /// Get an authorization header for an arbitrary user.
    pub fn auth_header_for(user: UserId) -> String {
        format!("Bearer test-token:{user}")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Sign a webhook delivery the way the identity provider does.
pub fn sign_webhook(delivery_id: &str, timestamp: &str, body: &str) -> String {
    let signed_content = format!("{delivery_id}.{timestamp}.{body}");
    let sig = dropgate_service::crypto::hmac_sha256_base64(WEBHOOK_KEY, &signed_content);
    format!("v1,{sig}")
}

/// Sign a payment verification callback the way the gateway does.
pub fn sign_payment(order_id: &str, payment_id: &str) -> String {
    dropgate_service::crypto::hmac_sha256_hex(GATEWAY_SECRET, &format!("{order_id}|{payment_id}"))
}
