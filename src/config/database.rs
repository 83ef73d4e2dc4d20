//! Database configuration module for the session records service.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the database schema always matches the Rust structs without hand-written SQL.
//! Table creation uses `IF NOT EXISTS`, which makes it safe to run on every startup.

use crate::entities::{AccessCode, DepartmentCounter, Record, User};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;

/// Default database location used when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/session_records.sqlite?mode=rwc";

/// Establishes a connection to the database at `database_url`.
///
/// For file-backed `SQLite` URLs the parent directory is created first, since
/// `SQLite` will create the file but not the directory holding it.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(path) = sqlite_file_path(database_url) {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    Database::connect(database_url).await.map_err(Into::into)
}

fn sqlite_file_path(database_url: &str) -> Option<&str> {
    let rest = database_url.strip_prefix("sqlite://")?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.contains(":memory:") {
        None
    } else {
        Some(path)
    }
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity definitions.
///
/// It creates tables for users, access codes, records, and department counters.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table_for(db, &schema, User).await?;
    create_table_for(db, &schema, AccessCode).await?;
    create_table_for(db, &schema, Record).await?;
    create_table_for(db, &schema, DepartmentCounter).await?;

    Ok(())
}

async fn create_table_for<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}
