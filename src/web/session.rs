//! HTTP sessions on top of `tower-sessions`.
//!
//! The session layer owns the `sid` cookie and the in-memory store; handlers
//! read and write the typed [`SessionData`] through the helpers here.

use crate::{core::session::SessionData, errors::Result, web::response::ApiError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::TimeDelta;
use time::OffsetDateTime;
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer, cookie::SameSite};

/// Name of the cookie carrying the session ID.
pub const SESSION_COOKIE: &str = "sid";

const DATA_KEY: &str = "session";

/// Session middleware for the router.
#[must_use]
pub fn layer() -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_secure(false)
}

/// The session data of the request, for handlers that only read it.
#[derive(Debug, Clone, Default)]
pub struct CurrentSession(pub Option<SessionData>);

impl CurrentSession {
    /// Session data as a borrowed option.
    #[must_use]
    pub const fn data(&self) -> Option<&SessionData> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(status, message)| ApiError::with_status(status, message))?;
        let data = load(&session)
            .await
            .map_err(|e| ApiError::json(&e, "Failed to read session. Please try again."))?;
        Ok(Self(data))
    }
}

/// Session data attached to the request, if any.
pub async fn load(session: &Session) -> Result<Option<SessionData>> {
    Ok(session.get::<SessionData>(DATA_KEY).await?)
}

/// Stores a fresh login under a new session ID.
pub async fn begin(session: &Session, data: &SessionData, ttl: TimeDelta) -> Result<()> {
    session.cycle_id().await?;
    save(session, data, ttl).await
}

/// Writes `data` into the session, keeping the store record and the cookie
/// expiring when the login does.
pub async fn save(session: &Session, data: &SessionData, ttl: TimeDelta) -> Result<()> {
    session.set_expiry(Some(Expiry::AtDateTime(cookie_expiry(data, ttl))));
    session.insert(DATA_KEY, data).await?;
    Ok(())
}

/// Deletes the session from the store and expires the cookie.
pub async fn end(session: &Session) -> Result<()> {
    session.flush().await?;
    Ok(())
}

fn cookie_expiry(data: &SessionData, ttl: TimeDelta) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(data.expires_at(ttl).timestamp())
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
}
