//! Registration, login, access code and logout.

use crate::{
    core::session::AccessLevel,
    web::{AppState, response::ApiError, session as web_session},
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tower_sessions::Session;

/// Body of `/api/register` and `/api/login`.
#[derive(Debug, Deserialize)]
pub struct CredentialsBody {
    /// Account name
    #[serde(rename = "userID", default)]
    pub user_id: String,
    /// Plain-text password
    #[serde(default)]
    pub password: String,
}

/// Body of `/api/check-access-code`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCodeBody {
    /// Shared access code
    #[serde(default)]
    pub access_code: String,
}

/// Unwraps a JSON body, turning malformed input into a validation failure.
fn read_json<T: DeserializeOwned>(
    body: std::result::Result<Json<T>, JsonRejection>,
) -> std::result::Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected request body");
        ApiError::with_status(StatusCode::OK, "Invalid request body")
    })
}

/// `POST /api/register`
pub async fn register(
    State(state): State<AppState>,
    body: std::result::Result<Json<CredentialsBody>, JsonRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let body = read_json(body)?;
    state
        .controller
        .register(&body.user_id, &body.password)
        .await
        .map_err(|e| ApiError::json(&e, "Registration failed. Please try again."))?;

    Ok(Json(json!({
        "success": true,
        "message": "Registration successful! Redirecting to login...",
    })))
}

/// `POST /api/login`
///
/// Success replaces any session the client held with a new one under a fresh ID.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    body: std::result::Result<Json<CredentialsBody>, JsonRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    const FAILED: &str = "Login failed. Please try again.";

    let body = read_json(body)?;
    let data = state
        .controller
        .login(&body.user_id, &body.password)
        .await
        .map_err(|e| ApiError::json(&e, FAILED))?;
    web_session::begin(&session, &data, state.controller.session_ttl())
        .await
        .map_err(|e| ApiError::json(&e, FAILED))?;

    Ok(Json(json!({
        "success": true,
        "message": "Login successful! Redirecting to access code...",
    })))
}

/// `POST /api/check-access-code`
pub async fn check_access_code(
    State(state): State<AppState>,
    session: Session,
    body: std::result::Result<Json<AccessCodeBody>, JsonRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    const FAILED: &str = "Access code check failed. Please try again.";

    let body = read_json(body)?;
    let current = web_session::load(&session)
        .await
        .map_err(|e| ApiError::json(&e, FAILED))?;
    let elevated = state
        .controller
        .submit_access_code(current.as_ref(), &body.access_code)
        .await
        .map_err(|e| ApiError::json(&e, FAILED))?;
    web_session::save(&session, &elevated, state.controller.session_ttl())
        .await
        .map_err(|e| ApiError::json(&e, FAILED))?;

    Ok(Json(json!({
        "success": true,
        "message": "Access granted! Welcome to the Session Records System.",
    })))
}

/// `POST /api/logout` - always reports success.
pub async fn logout(State(state): State<AppState>, session: Session) -> Json<Value> {
    match web_session::load(&session).await {
        Ok(current) => state.controller.logout(current.as_ref()),
        Err(e) => tracing::warn!(error = %e, "Could not read session during logout"),
    }
    if let Err(e) = web_session::end(&session).await {
        tracing::error!(error = %e, "Failed to delete session");
    }
    Json(json!({ "success": true, "message": "Logged out successfully" }))
}

/// `GET /api/session`
pub async fn session(
    State(state): State<AppState>,
    session: Session,
) -> std::result::Result<Json<Value>, ApiError> {
    let current = web_session::load(&session)
        .await
        .map_err(|e| ApiError::json(&e, "Failed to read session. Please try again."))?;
    let controller = &state.controller;

    Ok(Json(match controller.session_info(current.as_ref()) {
        Some(data) => json!({
            "authenticated": controller.access_level(Some(data)) == AccessLevel::Elevated,
            "userID": data.user_id,
            "loginTime": data.login_time.to_rfc3339(),
            "accessTime": data.access_time.map(|t| t.to_rfc3339()),
        }),
        None => json!({
            "authenticated": false,
            "userID": null,
            "loginTime": null,
            "accessTime": null,
        }),
    }))
}
