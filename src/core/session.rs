//! Per-client session data and the access state machine.
//!
//! The data itself lives in the HTTP session store. Each session has a fixed
//! lifetime counted from login; an expired session reads as anonymous no matter
//! what the store still holds.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Where a session stands in the access state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessLevel {
    /// No session, or an expired one
    Anonymous,
    /// Logged in, access code not yet presented
    Authenticated,
    /// Logged in and holding a valid access code
    Elevated,
}

/// Data held for one logged-in client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// Logged-in user
    #[serde(rename = "userID")]
    pub user_id: String,
    /// When the user logged in
    pub login_time: DateTime<Utc>,
    /// Whether a valid access code has been presented
    pub access_granted: bool,
    /// When the access code was accepted
    pub access_time: Option<DateTime<Utc>>,
}

impl SessionData {
    /// A freshly authenticated session.
    #[must_use]
    pub fn login(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            login_time: now,
            access_granted: false,
            access_time: None,
        }
    }

    /// The same session after a valid access code.
    #[must_use]
    pub fn elevate(self, now: DateTime<Utc>) -> Self {
        Self {
            access_granted: true,
            access_time: Some(now),
            ..self
        }
    }

    /// When the session stops being valid.
    #[must_use]
    pub fn expires_at(&self, ttl: TimeDelta) -> DateTime<Utc> {
        self.login_time
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the fixed lifetime has run out.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now >= self.expires_at(ttl)
    }

    /// The session's state; expiry is checked separately.
    #[must_use]
    pub const fn access_level(&self) -> AccessLevel {
        if self.access_granted {
            AccessLevel::Elevated
        } else {
            AccessLevel::Authenticated
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_state_transitions() {
        let now = Utc::now();

        let session = SessionData::login("alice", now);
        assert_eq!(session.access_level(), AccessLevel::Authenticated);
        assert!(session.access_time.is_none());

        let session = session.elevate(now);
        assert_eq!(session.access_level(), AccessLevel::Elevated);
        assert_eq!(session.access_time, Some(now));
        assert_eq!(session.login_time, now);
    }

    #[test]
    fn test_lifetime_counts_from_login() {
        let login = Utc::now();
        let ttl = TimeDelta::hours(1);
        let session = SessionData::login("alice", login).elevate(login + TimeDelta::minutes(50));

        // Elevation does not extend the lifetime
        assert!(!session.is_expired(login + TimeDelta::minutes(59), ttl));
        assert!(session.is_expired(login + TimeDelta::hours(1), ttl));
        assert_eq!(session.expires_at(ttl), login + TimeDelta::hours(1));
    }

    #[test]
    fn test_serialized_field_names() {
        let session = SessionData::login("alice", Utc::now());
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["userID"], "alice");
        assert_eq!(value["accessGranted"], false);
        assert!(value.get("loginTime").is_some());
        assert!(value.get("accessTime").is_some());

        let back: SessionData = serde_json::from_value(value).unwrap();
        assert_eq!(back, session);
    }
}
