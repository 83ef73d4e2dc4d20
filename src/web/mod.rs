//! Web layer - the HTTP/JSON interface over the session controller
//!
//! Routes live under `/api`, locally stored attachments under `/files`, and
//! anything else falls through to the static client assets.

/// Route handlers grouped by concern
pub mod handlers;
/// Uniform `{success: false, message}` error responses
pub mod response;
/// Session layer and typed session data access
pub mod session;

use crate::core::controller::SessionController;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use std::{path::Path, sync::Arc};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

// Room for multipart framing and the text fields around the file itself.
const FORM_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Shared state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Orchestrates every client-facing operation
    pub controller: Arc<SessionController>,
    /// When the server started, for the health endpoint
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Creates the state for a freshly started server.
    #[must_use]
    pub fn new(controller: Arc<SessionController>) -> Self {
        Self {
            controller,
            started_at: Utc::now(),
        }
    }
}

/// Builds the application router.
///
/// `static_dir`, when given, is served for every path no route matches.
pub fn router(state: AppState, static_dir: Option<&Path>, max_upload_bytes: u64) -> Router {
    use handlers::{auth, files, records, system};

    let api = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/check-access-code", post(auth::check_access_code))
        .route("/logout", post(auth::logout))
        .route("/session", get(auth::session))
        .route("/add-record", post(records::add_record))
        .route("/records", get(records::list_records))
        .route("/clear-records", post(records::clear_records))
        .route("/counts", get(records::counts))
        .route("/download/:record_id", get(files::download))
        .route("/view/:record_id", get(files::view))
        .route("/health", get(system::health))
        .fallback(system::api_not_found);

    let body_limit = usize::try_from(max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES))
        .unwrap_or(usize::MAX);

    let app = Router::new()
        .nest("/api", api)
        .route("/files/:stored_name", get(files::serve_stored))
        .with_state(state);

    let app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app,
    };

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(session::layer())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
