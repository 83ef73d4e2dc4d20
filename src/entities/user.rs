//! User entity - A registered account in the Credential Store.
//!
//! Users are created at registration and never mutated or deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique login name chosen at registration (at least 3 characters)
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Encoded PBKDF2 hash, never the plaintext password
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// When the account was registered
    pub created_at: DateTimeUtc,
}

/// Users have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
