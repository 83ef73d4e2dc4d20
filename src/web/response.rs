//! Uniform JSON error responses.
//!
//! Every handler failure becomes `{success: false, message}`. User-correctable
//! errors keep their message and HTTP 200; internal errors are logged and
//! replaced with the endpoint's generic failure message under HTTP 500.

use crate::errors::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

/// Message shown to the client for a user-facing error, `None` for internal ones.
#[must_use]
pub fn client_message(error: &Error) -> Option<String> {
    if !error.is_user_facing() {
        return None;
    }
    match error {
        Error::Validation { message } | Error::Unauthorized { message } => Some(message.clone()),
        Error::InvalidCredentials => {
            Some("Invalid userID or password. Please check your details and try again.".to_string())
        }
        Error::InvalidAccessCode => Some(
            "Invalid access code. Please contact your administrator for a valid code.".to_string(),
        ),
        Error::NotFound { .. } => Some("File not found or no longer available".to_string()),
        Error::AttachmentPending { .. } => Some(
            "File is still being processed. Please try again in a few moments.".to_string(),
        ),
        Error::FileTooLarge { limit, .. } => Some(format!(
            "File is too large. The maximum size is {}.",
            human_size(*limit)
        )),
        Error::InvalidFileType { .. } => Some("Only PDF files are allowed".to_string()),
        _ => None,
    }
}

// Whole MB from 1 MiB up, whole KB below.
fn human_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    if bytes >= MIB {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{}KB", bytes.div_ceil(KIB))
    }
}

/// A failed API call, ready to be rendered.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    /// Builds the response for a JSON endpoint.
    ///
    /// `fallback` is shown in place of internal error messages.
    #[must_use]
    pub fn json(error: &Error, fallback: &str) -> Self {
        match client_message(error) {
            Some(message) => Self::with_status(StatusCode::OK, &message),
            None => {
                tracing::error!(error = %error, "Request failed");
                Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, fallback)
            }
        }
    }

    /// Builds the response for a file endpoint, where the status code carries
    /// the outcome: 401, 404, 202 while processing, 500 otherwise.
    #[must_use]
    pub fn file(error: &Error, fallback: &str) -> Self {
        let status = match error {
            Error::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::AttachmentPending { .. } => StatusCode::ACCEPTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut response = match client_message(error) {
            Some(message) => Self::with_status(status, &message),
            None => {
                tracing::error!(error = %error, "File request failed");
                Self::with_status(status, fallback)
            }
        };
        if matches!(error, Error::AttachmentPending { .. }) {
            response.body["processing"] = Value::Bool(true);
        }
        response
    }

    /// A failure with an explicit status and message.
    #[must_use]
    pub fn with_status(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: json!({ "success": false, "message": message }),
        }
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
