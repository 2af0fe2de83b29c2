//! File workflow handlers: credit-gated upload, listing, reads, download,
//! visibility toggling, and deletion.
//!
//! Authorization policy, stated once: ownership is `record.owner == caller`;
//! public visibility grants read-only access to non-owners; only the owner
//! may mutate or delete.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::Json;
use serde::Serialize;

use dropgate_core::{storage_key_for, FileId, FileRecord};
use dropgate_store::{Store, StoreError};

use crate::auth::{AuthUser, OptionalAuthUser};
use crate::error::ApiError;
use crate::state::AppState;

/// File record response.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    /// Record ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Stored byte length.
    pub size_bytes: u64,
    /// Content type, if reported at upload.
    pub content_type: Option<String>,
    /// Whether non-owners may read the file.
    pub is_public: bool,
    /// Upload timestamp.
    pub uploaded_at: String,
}

impl From<&FileRecord> for FileResponse {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id.to_string(),
            name: record.name.clone(),
            size_bytes: record.size_bytes,
            content_type: record.content_type.clone(),
            is_public: record.is_public,
            uploaded_at: record.uploaded_at.to_rfc3339(),
        }
    }
}

/// Upload response.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Records for every file that completed the upload.
    pub files: Vec<FileResponse>,
    /// Balance left after the batch.
    pub remaining_credits: i64,
    /// Human-readable summary.
    pub message: String,
}

/// Upload a batch of files, debiting one credit per stored file.
///
/// The whole batch is checked against the balance up front so an undersized
/// balance fails before any I/O. Each file then debits first and rolls the
/// debit back if the blob write or record insert fails, so a debit without a
/// stored file never survives the request. A mid-batch balance exhaustion
/// (a concurrent spend won the race) ends the batch; the records completed
/// so far are returned.
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    // Drain the multipart body first; the batch-size credit check needs the
    // count of named files.
    let mut blobs = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field
            .file_name()
            .map(ToString::to_string)
            .unwrap_or_default();
        let content_type = field.content_type().map(ToString::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        if name.is_empty() {
            tracing::warn!(user_id = %auth.user_id, "Skipping file with no name");
            continue;
        }

        blobs.push((name, content_type, bytes));
    }

    if blobs.is_empty() {
        return Err(ApiError::BadRequest("No files provided".into()));
    }

    let account = state.store.ensure_account(&auth.user_id)?;
    let required = i64::try_from(blobs.len())
        .map_err(|_| ApiError::BadRequest("Too many files in one batch".into()))?;
    if !account.has_at_least(required) {
        return Err(ApiError::InsufficientCredits {
            balance: account.credits,
            required,
        });
    }

    let mut uploaded = Vec::new();
    let mut remaining = account.credits;

    for (name, content_type, bytes) in blobs {
        let account = match state.store.debit_credits(&auth.user_id, 1) {
            Ok(account) => account,
            Err(StoreError::InsufficientCredits { balance, .. }) => {
                tracing::warn!(
                    user_id = %auth.user_id,
                    balance,
                    "Balance exhausted mid-batch, stopping upload"
                );
                remaining = balance;
                break;
            }
            Err(e) => return Err(e.into()),
        };
        remaining = account.credits;

        match store_one(&state, &auth, &name, content_type, &bytes).await {
            Ok(record) => {
                tracing::info!(
                    user_id = %auth.user_id,
                    file_id = %record.id,
                    name = %record.name,
                    size_bytes = record.size_bytes,
                    "File stored"
                );
                uploaded.push(FileResponse::from(&record));
            }
            Err(e) => {
                // Roll the debit back before surfacing the failure.
                state.store.refund_credits(&auth.user_id, 1)?;
                return Err(e);
            }
        }
    }

    tracing::info!(
        user_id = %auth.user_id,
        uploaded = uploaded.len(),
        remaining_credits = remaining,
        "Upload batch finished"
    );

    Ok(Json(UploadResponse {
        files: uploaded,
        remaining_credits: remaining,
        message: "Files uploaded successfully".into(),
    }))
}

/// Write one blob and persist its record. On a record-insert failure the
/// blob is removed best-effort; the caller refunds the debit either way.
async fn store_one(
    state: &AppState,
    auth: &AuthUser,
    name: &str,
    content_type: Option<String>,
    bytes: &[u8],
) -> Result<FileRecord, ApiError> {
    let storage_key = storage_key_for(name);
    let location = state.storage.write(&storage_key, bytes).await?;

    let record = FileRecord::new(
        auth.user_id,
        name,
        bytes.len() as u64,
        content_type,
        location.clone(),
        storage_key,
    );

    if let Err(e) = state.store.put_file(&record) {
        if let Err(del) = state.storage.delete(&location).await {
            tracing::warn!(
                location = %location,
                error = %del,
                "Failed to remove blob after metadata failure"
            );
        }
        return Err(e.into());
    }

    Ok(record)
}

/// List the caller's files.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<FileResponse>>, ApiError> {
    let records = state.store.list_files_by_owner(&auth.user_id)?;
    Ok(Json(records.iter().map(FileResponse::from).collect()))
}

/// Get a file the caller owns or that is public.
///
/// A record the caller may not see is reported the same as a missing one.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(file_id): Path<String>,
) -> Result<Json<FileResponse>, ApiError> {
    let file_id = parse_file_id(&file_id)?;

    let record = state
        .store
        .get_file(&file_id)?
        .filter(|r| r.is_owned_by(&auth.user_id) || r.is_public)
        .ok_or_else(|| ApiError::NotFound(format!("file not found: {file_id}")))?;

    Ok(Json(FileResponse::from(&record)))
}

/// Get a public file without authentication.
pub async fn get_public_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<FileResponse>, ApiError> {
    let file_id = parse_file_id(&file_id)?;

    let record = state
        .store
        .get_file(&file_id)?
        .ok_or_else(|| ApiError::NotFound(format!("file not found: {file_id}")))?;

    if !record.is_public {
        tracing::warn!(file_id = %file_id, "Attempted access to non-public file");
        return Err(ApiError::Forbidden("file is not public".into()));
    }

    Ok(Json(FileResponse::from(&record)))
}

/// Download a file's bytes.
///
/// Anonymous callers may download public files only; authenticated callers
/// may additionally download their own.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    caller: OptionalAuthUser,
    Path(file_id): Path<String>,
) -> Result<(HeaderMap, Vec<u8>), ApiError> {
    let file_id = parse_file_id(&file_id)?;

    let record = state
        .store
        .get_file(&file_id)?
        .ok_or_else(|| ApiError::NotFound(format!("file not found: {file_id}")))?;

    match &caller.0 {
        None => {
            if !record.is_public {
                tracing::warn!(file_id = %file_id, "Unauthenticated download attempt for private file");
                return Err(ApiError::Unauthorized);
            }
        }
        Some(user) => {
            if !record.is_owned_by(&user.user_id) && !record.is_public {
                tracing::warn!(
                    file_id = %file_id,
                    user_id = %user.user_id,
                    "Unauthorized download attempt"
                );
                return Err(ApiError::Forbidden("you do not have access to this file".into()));
            }
        }
    }

    if !state.storage.exists(&record.location).await {
        tracing::error!(location = %record.location, "Physical file missing at recorded location");
        return Err(ApiError::NotFound("file not found on disk".into()));
    }

    let bytes = state.storage.read(&record.location).await?;

    let mut headers = HeaderMap::new();
    let content_type = record
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    let disposition = format!("attachment; filename=\"{}\"", record.name);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    tracing::info!(file_id = %file_id, name = %record.name, "Download authorized");

    Ok((headers, bytes))
}

/// Toggle a file between public and private.
pub async fn toggle_visibility(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(file_id): Path<String>,
) -> Result<Json<FileResponse>, ApiError> {
    let file_id = parse_file_id(&file_id)?;

    let mut record = state
        .store
        .get_file(&file_id)?
        .ok_or_else(|| ApiError::NotFound(format!("file not found: {file_id}")))?;

    if !record.is_owned_by(&auth.user_id) {
        return Err(ApiError::Forbidden("you don't own this file".into()));
    }

    record.is_public = !record.is_public;
    state.store.put_file(&record)?;

    tracing::info!(
        file_id = %file_id,
        is_public = record.is_public,
        "File visibility toggled"
    );

    Ok(Json(FileResponse::from(&record)))
}

/// Deletion response.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    /// Whether a record was deleted.
    pub deleted: bool,
}

/// Delete a file the caller owns.
///
/// Fails silently (`deleted: false`) when the record is absent or not owned.
/// The blob delete is best-effort: an orphaned blob is less harmful than an
/// unremovable record pointing nowhere.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(file_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let file_id = parse_file_id(&file_id)?;

    let Some(record) = state.store.get_file(&file_id)? else {
        tracing::warn!(file_id = %file_id, "Delete requested for missing file");
        return Ok(Json(DeleteResponse { deleted: false }));
    };

    if !record.is_owned_by(&auth.user_id) {
        tracing::warn!(
            file_id = %file_id,
            user_id = %auth.user_id,
            "Unauthorized delete attempt"
        );
        return Ok(Json(DeleteResponse { deleted: false }));
    }

    if let Err(e) = state.storage.delete(&record.location).await {
        tracing::warn!(
            location = %record.location,
            error = %e,
            "Failed to delete blob, removing metadata anyway"
        );
    }

    state.store.delete_file(&record)?;
    tracing::info!(file_id = %file_id, user_id = %auth.user_id, "File deleted");

    Ok(Json(DeleteResponse { deleted: true }))
}

/// Parse a path segment as a file id. Unparseable ids behave like missing
/// records.
fn parse_file_id(raw: &str) -> Result<FileId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("file not found: {raw}")))
}
