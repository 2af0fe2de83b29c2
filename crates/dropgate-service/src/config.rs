//! Service configuration.

use serde::Deserialize;
use std::path::Path;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to the `RocksDB` data directory (default: "/data/dropgate/db").
    pub data_dir: String,

    /// Root directory for stored file blobs (default: "/data/dropgate/blobs").
    pub upload_dir: String,

    /// Identity provider base URL for JWT validation.
    pub auth_base_url: String,

    /// Expected JWT audience (default: "dropgate").
    pub auth_audience: String,

    /// Payment gateway API URL.
    pub gateway_api_url: String,

    /// Payment gateway key id (optional; payments disabled without it).
    pub gateway_key_id: Option<String>,

    /// Payment gateway key secret, shared with the callback signer.
    pub gateway_key_secret: Option<String>,

    /// Identity-provider webhook signing secret (`whsec_…`).
    pub identity_webhook_secret: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Gateway secrets file structure.
#[derive(Debug, Deserialize)]
struct GatewaySecrets {
    key_id: String,
    key_secret: String,
    #[serde(default)]
    api_url: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        // Try to load gateway secrets from file first, then fall back to env vars
        let (gateway_key_id, gateway_key_secret, gateway_api_url) = load_gateway_secrets();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/dropgate/db".into()),
            upload_dir: std::env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "/data/dropgate/blobs".into()),
            auth_base_url: std::env::var("AUTH_BASE_URL")
                .unwrap_or_else(|_| "https://auth.dropgate.io".into()),
            auth_audience: std::env::var("AUTH_AUDIENCE").unwrap_or_else(|_| "dropgate".into()),
            gateway_api_url: gateway_api_url
                .or_else(|| std::env::var("GATEWAY_API_URL").ok())
                .unwrap_or_else(|| "https://api.razorpay.com".into()),
            gateway_key_id,
            gateway_key_secret,
            identity_webhook_secret: std::env::var("IDENTITY_WEBHOOK_SECRET").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(25 * 1024 * 1024), // 25MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

/// Load gateway secrets from file or environment.
fn load_gateway_secrets() -> (Option<String>, Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/gateway.json",
        "dropgate/.secrets/gateway.json",
        "../.secrets/gateway.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<GatewaySecrets>(path) {
            tracing::info!(path = %path, "Loaded gateway secrets from file");
            return (
                Some(secrets.key_id),
                Some(secrets.key_secret),
                secrets.api_url,
            );
        }
    }

    // Fall back to environment variables
    tracing::debug!("Gateway secrets file not found, using environment variables");
    (
        std::env::var("GATEWAY_KEY_ID").ok(),
        std::env::var("GATEWAY_KEY_SECRET").ok(),
        None,
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/dropgate/db".into(),
            upload_dir: "/data/dropgate/blobs".into(),
            auth_base_url: "https://auth.dropgate.io".into(),
            auth_audience: "dropgate".into(),
            gateway_api_url: "https://api.razorpay.com".into(),
            gateway_key_id: None,
            gateway_key_secret: None,
            identity_webhook_secret: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 25 * 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
