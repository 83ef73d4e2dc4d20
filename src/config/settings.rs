//! Application settings loaded from environment variables.
//!
//! Every setting has a default except the remote attachment credentials, which
//! are required only when `ATTACHMENT_BACKEND=remote`. Values are read through
//! a lookup function so tests can supply their own environment.

use crate::errors::{Error, Result};
use chrono::TimeDelta;
use std::path::PathBuf;

/// Default port, matching the original deployment.
pub const DEFAULT_PORT: u16 = 3000;
/// Default upload size limit (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;
/// Default session lifetime in hours.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
/// Longest accepted session lifetime in hours (one year).
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
/// Default version header value for the remote upload API.
pub const DEFAULT_REMOTE_API_VERSION: &str = "2022-06-28";

/// Which attachment strategy the deployment uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentBackend {
    /// Files written under a local directory and served by this process
    Local {
        /// Directory holding stored PDFs
        upload_dir: PathBuf,
    },
    /// Files handed to a remote object-upload API
    Remote {
        /// Base URL of the remote API
        api_url: String,
        /// Bearer token for the remote API
        api_key: String,
        /// Value of the API version header
        api_version: String,
    },
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database connection string
    pub database_url: String,
    /// TCP port to listen on
    pub port: u16,
    /// Fixed session lifetime, counted from login
    pub session_ttl: TimeDelta,
    /// Largest accepted attachment in bytes
    pub max_upload_bytes: u64,
    /// When set, clearing the ledger also requires this password
    pub admin_password: Option<String>,
    /// Attachment storage strategy
    pub attachment_backend: AttachmentBackend,
    /// TOML file holding access codes to seed
    pub access_codes_file: PathBuf,
    /// Extra access codes supplied inline
    pub extra_access_codes: Vec<String>,
    /// Directory of static client assets
    pub static_dir: PathBuf,
    /// Recompute department counters from the ledger at startup
    pub reconcile_counters_on_startup: bool,
}

impl AppConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url = get("DATABASE_URL")
            .unwrap_or_else(|| super::database::DEFAULT_DATABASE_URL.to_string());

        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let session_ttl_hours =
            parse_or("SESSION_TTL_HOURS", get("SESSION_TTL_HOURS"), DEFAULT_SESSION_TTL_HOURS)?;
        let session_ttl = (1..=MAX_SESSION_TTL_HOURS)
            .contains(&session_ttl_hours)
            .then(|| TimeDelta::try_hours(session_ttl_hours))
            .flatten()
            .ok_or_else(|| Error::Config {
                message: format!(
                    "SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}, got {session_ttl_hours}"
                ),
            })?;
        let max_upload_bytes =
            parse_or("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"), DEFAULT_MAX_UPLOAD_BYTES)?;

        let attachment_backend = match get("ATTACHMENT_BACKEND").as_deref() {
            None | Some("local") => AttachmentBackend::Local {
                upload_dir: get("UPLOAD_DIR").map_or_else(|| PathBuf::from("uploads"), PathBuf::from),
            },
            Some("remote") => AttachmentBackend::Remote {
                api_url: get("REMOTE_API_URL").ok_or_else(|| Error::Config {
                    message: "REMOTE_API_URL is required when ATTACHMENT_BACKEND=remote"
                        .to_string(),
                })?,
                api_key: get("REMOTE_API_KEY").ok_or_else(|| Error::Config {
                    message: "REMOTE_API_KEY is required when ATTACHMENT_BACKEND=remote"
                        .to_string(),
                })?,
                api_version: get("REMOTE_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_REMOTE_API_VERSION.to_string()),
            },
            Some(other) => {
                return Err(Error::Config {
                    message: format!("Unknown ATTACHMENT_BACKEND '{other}' (expected local or remote)"),
                });
            }
        };

        let extra_access_codes = get("ACCESS_CODES")
            .map(|codes| {
                codes
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let reconcile_counters_on_startup = match get("RECONCILE_COUNTERS_ON_STARTUP") {
            None => true,
            Some(v) => !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no"),
        };

        Ok(Self {
            database_url,
            port,
            session_ttl,
            max_upload_bytes,
            admin_password: get("ADMIN_PASSWORD"),
            attachment_backend,
            access_codes_file: get("ACCESS_CODES_FILE")
                .map_or_else(|| PathBuf::from("config.toml"), PathBuf::from),
            extra_access_codes,
            static_dir: get("STATIC_DIR").map_or_else(|| PathBuf::from("public"), PathBuf::from),
            reconcile_counters_on_startup,
        })
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.map_or(Ok(default), |raw| {
        raw.parse::<T>().map_err(|e| Error::Config {
            message: format!("Invalid value for {key} ('{raw}'): {e}"),
        })
    })
}
