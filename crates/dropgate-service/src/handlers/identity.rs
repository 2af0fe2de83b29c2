//! Identity-provider webhook handler.
//!
//! The identity provider delivers `user.created`, `user.updated`, and
//! `user.deleted` events signed with an HMAC over the delivery id, timestamp,
//! and raw payload. Deliveries that fail verification are rejected; there is
//! no accept-all fallback.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use base64::Engine as _;
use serde::Serialize;

use dropgate_core::{Profile, UserId};
use dropgate_store::Store;

use crate::crypto;
use crate::error::ApiError;
use crate::state::AppState;

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was processed.
    pub received: bool,
}

/// Handle identity-provider webhooks.
pub async fn identity_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let Some(secret) = state.config.identity_webhook_secret.as_deref() else {
        tracing::warn!("Identity webhook rejected: no signing secret configured");
        return Err(ApiError::Unauthorized);
    };

    let delivery_id = header_str(&headers, "svix-id")?;
    let timestamp = header_str(&headers, "svix-timestamp")?;
    let signature = header_str(&headers, "svix-signature")?;

    if !verify_webhook_signature(secret, delivery_id, timestamp, signature, &body) {
        tracing::warn!(delivery_id = %delivery_id, "Invalid identity webhook signature");
        return Err(ApiError::Unauthorized);
    }

    let payload: serde_json::Value =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let event_type = payload
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let data = payload
        .get("data")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    tracing::info!(event_type = %event_type, "Processing identity event");

    match event_type.as_str() {
        // Both events upsert: an update for a never-seen user creates the
        // profile and account just like a create would.
        "user.created" | "user.updated" => handle_user_upserted(&state, &data)?,
        "user.deleted" => handle_user_deleted(&state, &data).await?,
        _ => {
            tracing::warn!(event_type = %event_type, "Unhandled identity event");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}

/// Verify the delivery signature: HMAC-SHA256 over `"{id}.{timestamp}.{body}"`
/// keyed with the base64-decoded portion of the `whsec_…` secret, compared
/// constant-time against each `v1,<sig>` candidate in the header.
fn verify_webhook_signature(
    secret: &str,
    delivery_id: &str,
    timestamp: &str,
    signature_header: &str,
    payload: &str,
) -> bool {
    let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
    let Ok(key) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
        tracing::error!("Identity webhook secret is not valid base64");
        return false;
    };

    let signed_content = format!("{delivery_id}.{timestamp}.{payload}");
    let expected = crypto::hmac_sha256_base64(&key, &signed_content);

    signature_header
        .split_whitespace()
        .filter_map(|candidate| candidate.strip_prefix("v1,"))
        .any(|candidate| crypto::constant_time_eq(candidate, &expected))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)
}

fn extract_user_id(data: &serde_json::Value) -> Result<UserId, ApiError> {
    data.get("id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing or invalid user id in event data".into()))
}

/// Copy non-empty event fields onto the profile.
fn apply_event_fields(profile: &mut Profile, data: &serde_json::Value) {
    let email = data
        .get("email_addresses")
        .and_then(|v| v.as_array())
        .and_then(|addresses| addresses.first())
        .and_then(|entry| entry.get("email_address"))
        .and_then(|v| v.as_str());
    if let Some(email) = email.filter(|s| !s.is_empty()) {
        profile.email = Some(email.to_string());
    }

    for (field, slot) in [
        ("first_name", &mut profile.first_name),
        ("last_name", &mut profile.last_name),
        ("image_url", &mut profile.photo_url),
    ] {
        if let Some(value) = data
            .get(field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
        {
            *slot = Some(value.to_string());
        }
    }
}

fn handle_user_upserted(state: &AppState, data: &serde_json::Value) -> Result<(), ApiError> {
    let user_id = extract_user_id(data)?;

    let mut profile = state
        .store
        .get_profile(&user_id)?
        .unwrap_or_else(|| Profile::new(user_id));
    apply_event_fields(&mut profile, data);
    state.store.put_profile(&profile)?;

    // The starting grant comes with the account, not the profile.
    let account = state.store.ensure_account(&user_id)?;

    tracing::info!(
        user_id = %user_id,
        credits = account.credits,
        "Identity profile upserted"
    );

    Ok(())
}

/// Garbage-collect everything owned by a deleted identity: file records and
/// blobs, the credit account, and the profile.
async fn handle_user_deleted(state: &AppState, data: &serde_json::Value) -> Result<(), ApiError> {
    let user_id = extract_user_id(data)?;

    let records = state.store.list_files_by_owner(&user_id)?;
    let file_count = records.len();
    for record in records {
        if let Err(e) = state.storage.delete(&record.location).await {
            tracing::warn!(
                location = %record.location,
                error = %e,
                "Failed to delete blob during identity cleanup"
            );
        }
        state.store.delete_file(&record)?;
    }

    state.store.delete_account(&user_id)?;
    state.store.delete_profile(&user_id)?;

    tracing::info!(user_id = %user_id, files_removed = file_count, "Identity deleted");

    Ok(())
}
