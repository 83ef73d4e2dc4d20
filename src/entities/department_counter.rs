//! Department counter entity - Derived per-department tally of live records.
//!
//! One row per department name. Rows are archived (not deleted) when the
//! ledger is cleared and revived with a count of 1 on the next increment.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Department counter database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "department_counters")]
pub struct Model {
    /// Department name, unique across the table
    #[sea_orm(primary_key, auto_increment = false)]
    pub department: String,
    /// Number of non-archived records in this department
    pub record_count: i64,
    /// Set when the ledger is cleared; archived rows read as zero
    pub archived: bool,
    /// When the row was last incremented, archived or reconciled
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
