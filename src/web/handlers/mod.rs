//! HTTP route handlers
//!
//! Handlers stay thin: they extract input, call the session controller and
//! shape the JSON the browser client expects.

/// Registration, login, access code, logout and session info
pub mod auth;
/// Serving and resolving attachments
pub mod files;
/// Adding, listing and clearing records, plus department counts
pub mod records;
/// Health check and the `/api` fallback
pub mod system;
