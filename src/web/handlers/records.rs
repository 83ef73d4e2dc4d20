//! Adding, listing and clearing records.

use crate::{
    core::{
        attachments::{AttachmentRef, IncomingFile},
        controller::NewRecord,
    },
    entities::record,
    errors::Error,
    web::{AppState, response::ApiError, session::CurrentSession},
};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};

/// Body of `/api/clear-records`; may be empty.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearBody {
    /// Admin password, required when the deployment configures one
    #[serde(default)]
    pub admin_password: Option<String>,
}

fn unreadable_form(error: &MultipartError) -> ApiError {
    tracing::warn!(error = %error, "Unreadable add-record form");
    ApiError::json(
        &Error::validation("Could not read the submitted form. The file may be too large."),
        "",
    )
}

/// Collects the `department`, `syllabusText` and `notesFile` form fields.
async fn read_record_form(mut multipart: Multipart) -> std::result::Result<NewRecord, ApiError> {
    let mut input = NewRecord::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| unreadable_form(&e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "department" => {
                input.department = field.text().await.map_err(|e| unreadable_form(&e))?;
            }
            "syllabusText" => {
                input.syllabus_text = Some(field.text().await.map_err(|e| unreadable_form(&e))?);
            }
            "notesFile" => {
                let original_name = field.file_name().map(ToString::to_string);
                let content_type = field.content_type().map(ToString::to_string);
                let bytes = field.bytes().await.map_err(|e| unreadable_form(&e))?;
                // Browsers send an empty part when no file was chosen
                if let Some(original_name) = original_name.filter(|_| !bytes.is_empty()) {
                    input.file = Some(IncomingFile {
                        bytes: bytes.to_vec(),
                        original_name,
                        content_type,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(input)
}

/// `POST /api/add-record`
pub async fn add_record(
    State(state): State<AppState>,
    session: CurrentSession,
    multipart: Multipart,
) -> std::result::Result<Json<Value>, ApiError> {
    let input = read_record_form(multipart).await?;
    let has_text = input
        .syllabus_text
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty());

    let receipt = state
        .controller
        .add_record(session.data(), input)
        .await
        .map_err(|e| ApiError::json(&e, "Failed to add record. Please try again."))?;

    let message = match &receipt.attachment {
        Some(attachment) => format!(
            "Record added successfully! File \"{}\" uploaded.",
            attachment.original_name()
        ),
        None => "Record added successfully!".to_string(),
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "recordInfo": {
            "recordId": receipt.record.id,
            "displayId": receipt.record.display_id,
            "department": receipt.record.department,
            "hasFile": receipt.attachment.is_some(),
            "fileName": receipt.attachment.as_ref().map(AttachmentRef::original_name),
            "fileSize": receipt.attachment.as_ref().map(AttachmentRef::size_bytes),
            "hasText": has_text,
            "timestamp": receipt.record.created_at.to_rfc3339(),
        },
    })))
}

/// Positional row:
/// `[displayId, createdAt, department, ownerUserID, attachmentDisplay, syllabusText, recordId, hasFile]`.
fn record_row(record: &record::Model) -> Value {
    let attachment = AttachmentRef::from_record(record);
    json!([
        record.display_id,
        record.created_at.to_rfc3339(),
        record.department,
        record.owner_user_id,
        attachment
            .as_ref()
            .map(AttachmentRef::display_label)
            .unwrap_or_default(),
        record.syllabus_text.as_deref().unwrap_or_default(),
        record.id,
        attachment.is_some(),
    ])
}

/// `GET /api/records`
pub async fn list_records(
    State(state): State<AppState>,
    session: CurrentSession,
) -> std::result::Result<Json<Value>, ApiError> {
    let records = state
        .controller
        .list_records(session.data())
        .await
        .map_err(|e| ApiError::json(&e, "Failed to get records. Please try again."))?;

    let rows: Vec<Value> = records.iter().map(record_row).collect();
    Ok(Json(json!({
        "success": true,
        "count": rows.len(),
        "data": rows,
    })))
}

/// `POST /api/clear-records`
pub async fn clear_records(
    State(state): State<AppState>,
    session: CurrentSession,
    body: std::result::Result<Json<ClearBody>, JsonRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();

    let outcome = state
        .controller
        .clear_records(session.data(), body.admin_password.as_deref())
        .await
        .map_err(|e| ApiError::json(&e, "Failed to clear records. Please try again."))?;

    Ok(Json(json!({
        "success": true,
        "message": format!(
            "Successfully cleared {} records. {} attached files deleted.",
            outcome.cleared_count, outcome.files_deleted
        ),
        "clearedCount": outcome.cleared_count,
        "filesDeleted": outcome.files_deleted,
        "clearedBy": outcome.cleared_by,
        "clearedAt": outcome.cleared_at.to_rfc3339(),
    })))
}

/// `GET /api/counts`
pub async fn counts(
    State(state): State<AppState>,
    session: CurrentSession,
) -> std::result::Result<Json<Value>, ApiError> {
    let counts = state
        .controller
        .department_counts(session.data())
        .await
        .map_err(|e| ApiError::json(&e, "Failed to get department counts. Please try again."))?;

    Ok(Json(json!({
        "success": true,
        "totalDepartments": counts.len(),
        "data": counts,
    })))
}
