//! Attachment download, view and local file serving.
//!
//! These endpoints report their outcome through the status code (401, 404,
//! 202 while a remote upload is still processing, 500) as well as the body.

use crate::{
    core::attachments::{PDF_MIME, ResolvedAttachment},
    errors::{Error, Result},
    web::{AppState, response::ApiError, session::CurrentSession},
};
use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Redirect},
};
use serde_json::{Value, json};

/// Resolves the record's attachment and insists on a usable URL.
///
/// The session is checked before the ID is parsed, so anonymous callers get
/// 401 whatever the path holds.
async fn ready_attachment(
    state: &AppState,
    session: &CurrentSession,
    record_id: &str,
) -> Result<(String, ResolvedAttachment)> {
    state.controller.require_elevated(session.data())?;
    let record_id: i64 = record_id.parse().map_err(|_| Error::NotFound {
        what: format!("record {record_id}"),
    })?;

    let resolved = state
        .controller
        .resolve_attachment(session.data(), record_id)
        .await?;
    if !resolved.ready {
        return Err(Error::AttachmentPending {
            filename: resolved.filename,
        });
    }
    let url = resolved.url.clone().ok_or_else(|| Error::NotFound {
        what: format!("URL for attachment of record {record_id}"),
    })?;
    Ok((url, resolved))
}

/// `GET /api/download/:record_id`
pub async fn download(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(record_id): Path<String>,
) -> std::result::Result<Json<Value>, ApiError> {
    let (url, resolved) = ready_attachment(&state, &session, &record_id)
        .await
        .map_err(|e| ApiError::file(&e, "Failed to get download URL. Please try again."))?;

    tracing::info!(record_id = %record_id, filename = %resolved.filename, "Download URL issued");
    Ok(Json(json!({
        "success": true,
        "downloadUrl": url,
        "filename": resolved.filename,
        "expiryTime": resolved.expiry.map(|t| t.to_rfc3339()),
        "message": "File URL retrieved successfully",
    })))
}

/// `GET /api/view/:record_id` - redirects to the attachment.
pub async fn view(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(record_id): Path<String>,
) -> std::result::Result<Redirect, ApiError> {
    let (url, _) = ready_attachment(&state, &session, &record_id)
        .await
        .map_err(|e| ApiError::file(&e, "Failed to view file. Please try again."))?;
    Ok(Redirect::to(&url))
}

/// `GET /files/:stored_name` - bytes of a locally stored attachment.
pub async fn serve_stored(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(stored_name): Path<String>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let bytes = state
        .controller
        .fetch_stored_file(session.data(), &stored_name)
        .await
        .map_err(|e| ApiError::file(&e, "Failed to read file. Please try again."))?;

    Ok((
        [
            (header::CONTENT_TYPE, PDF_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{stored_name}\""),
            ),
        ],
        bytes,
    ))
}
