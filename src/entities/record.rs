//! Record entity - One submitted session record in the shared ledger.
//!
//! Records are never hard-deleted. Clearing the ledger flips `archived` and
//! appends a `"System"` audit record. The optional attachment is stored as
//! four flat columns (`attachment_kind`, `attachment_key`, `attachment_name`,
//! `attachment_size`) and rebuilt into an `AttachmentRef` by the core layer.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "records")]
pub struct Model {
    /// Storage identifier, used to address the record's attachment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Creation time in epoch milliseconds, shown to users as the record ID.
    /// Not guaranteed unique under concurrent creates.
    pub display_id: i64,
    /// When the record was created
    pub created_at: DateTimeUtc,
    /// Department tag (e.g., "CS101"); `"System"` marks audit entries
    pub department: String,
    /// User who submitted the record
    pub owner_user_id: String,
    /// `"local"` or `"remote"` when an attachment is present
    pub attachment_kind: Option<String>,
    /// Stored file name (local) or upload handle (remote)
    pub attachment_key: Option<String>,
    /// File name as uploaded by the user
    pub attachment_name: Option<String>,
    /// Attachment size in bytes
    pub attachment_size: Option<i64>,
    /// Free-text syllabus notes
    pub syllabus_text: Option<String>,
    /// Soft delete flag - archived records are hidden from listings
    pub archived: bool,
    /// When the record was archived
    pub archived_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
