//! Credential Store - user registration and login checks.
//!
//! Users are looked up by `user_id` and compared against a salted PBKDF2 hash.
//! Unknown users and wrong passwords both surface as [`Error::InvalidCredentials`].

use crate::{
    core::password,
    entities::{User, user},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};

/// Minimum length of a user ID.
pub const MIN_USER_ID_LEN: usize = 3;
/// Minimum length of a password.
pub const MIN_PASSWORD_LEN: usize = 6;

// Cheap work factor in test builds.
const HASH_ITERATIONS: u32 = if cfg!(test) {
    1_000
} else {
    password::DEFAULT_ITERATIONS
};

/// Registers a new user after validating the input.
///
/// Fails with a validation error when either field is missing or too short,
/// or when the user ID is already taken.
pub async fn register_user<C>(db: &C, user_id: &str, password: &str) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let user_id = user_id.trim();
    if user_id.is_empty() || password.is_empty() {
        return Err(Error::validation("UserID and password are required"));
    }
    if user_id.chars().count() < MIN_USER_ID_LEN {
        return Err(Error::validation(format!(
            "UserID must be at least {MIN_USER_ID_LEN} characters long"
        )));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    if find_user(db, user_id).await?.is_some() {
        return Err(Error::validation(
            "UserID already registered. Please choose a different UserID.",
        ));
    }

    let password_hash = password::hash_password_blocking(password, HASH_ITERATIONS).await?;
    let model = user::ActiveModel {
        user_id: Set(user_id.to_string()),
        password_hash: Set(password_hash),
        created_at: Set(chrono::Utc::now()),
    };

    // The primary key still guards against a concurrent registration of the same ID.
    match model.insert(db).await {
        Ok(created) => Ok(created),
        Err(e) if is_unique_violation(&e) => Err(Error::validation(
            "UserID already registered. Please choose a different UserID.",
        )),
        Err(e) => Err(e.into()),
    }
}

/// Checks a login attempt and returns the matching user.
pub async fn authenticate<C>(db: &C, user_id: &str, password: &str) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    if user_id.trim().is_empty() || password.is_empty() {
        return Err(Error::validation("UserID and password are required"));
    }

    let user = find_user(db, user_id.trim())
        .await?
        .ok_or(Error::InvalidCredentials)?;

    if password::verify_password_blocking(password, &user.password_hash).await? {
        Ok(user)
    } else {
        Err(Error::InvalidCredentials)
    }
}

/// Finds a user by ID.
pub async fn find_user<C>(db: &C, user_id: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}
