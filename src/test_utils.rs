//! Shared test utilities for `session-records`.
//!
//! This module provides common helper functions for setting up test databases
//! and controllers, and for creating test records with sensible defaults.

use crate::{
    core::{
        access_gate,
        attachments::{IncomingFile, PDF_MIME, local::LocalAttachmentStore},
        controller::{ControllerSettings, SessionController},
        ledger,
    },
    entities,
    errors::Result,
};
use sea_orm::{ConnectOptions, DatabaseConnection};
use std::sync::Arc;
use tempfile::TempDir;

/// Access code seeded by [`setup_test_controller`].
pub const TEST_ACCESS_CODE: &str = "LET-ME-IN";

/// Smallest byte string that passes PDF validation.
pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n% test document\n%%EOF";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database with a pool of several connections.
///
/// An in-memory database is limited to one connection, so tests that need
/// statements to actually run side by side use this instead. The returned
/// `TempDir` holds the database file and must outlive the connection.
pub async fn setup_file_test_db() -> Result<(DatabaseConnection, TempDir)> {
    let dir = tempfile::tempdir()?;
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("test.sqlite").display()
    );
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(5)
        .min_connections(5)
        .sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((db, dir))
}

/// Creates a controller over a fresh database and a temporary upload directory.
///
/// # Defaults
/// * access codes: [`TEST_ACCESS_CODE`]
/// * session lifetime: 1 hour
/// * upload limit: 1 MiB
/// * admin password: none
///
/// The returned `TempDir` must be kept alive for the duration of the test.
pub async fn setup_test_controller() -> Result<(SessionController, TempDir)> {
    setup_test_controller_with(setup_test_db().await?).await
}

/// Same as [`setup_test_controller`], over an existing database.
pub async fn setup_test_controller_with(
    db: DatabaseConnection,
) -> Result<(SessionController, TempDir)> {
    access_gate::seed_codes(&db, [TEST_ACCESS_CODE]).await?;

    let dir = tempfile::tempdir()?;
    let controller = SessionController::new(
        db,
        Arc::new(LocalAttachmentStore::new(dir.path())),
        ControllerSettings {
            max_upload_bytes: 1024 * 1024,
            admin_password: None,
            session_ttl: chrono::TimeDelta::hours(1),
        },
    );
    Ok((controller, dir))
}

/// A small valid PDF upload named `name`.
pub fn pdf_file(name: &str) -> IncomingFile {
    IncomingFile {
        bytes: PDF_BYTES.to_vec(),
        original_name: name.to_string(),
        content_type: Some(PDF_MIME.to_string()),
    }
}

/// Creates a text-only test record owned by `alice`.
pub async fn create_test_record(
    db: &DatabaseConnection,
    department: &str,
    text: &str,
) -> Result<entities::record::Model> {
    ledger::create_record(db, department, "alice", Some(text), None).await
}
