//! Credit balance handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use dropgate_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Current credit balance.
    pub credits: i64,
    /// Current plan label.
    pub plan: String,
}

/// Get the current credit balance.
///
/// The account is created with the starting grant if this is the first time
/// the user's balance is needed.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = state.store.ensure_account(&auth.user_id)?;

    Ok(Json(BalanceResponse {
        credits: account.credits,
        plan: account.plan.label().to_string(),
    }))
}
