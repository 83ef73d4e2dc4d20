//! Access code entity - The allow-list behind the Access Gate.
//! Presenting any code in this table elevates a session; codes are not
//! tied to a specific user.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Access code database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "access_codes")]
pub struct Model {
    /// The shared secret itself
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
