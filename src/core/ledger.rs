//! Record Ledger - the shared, append-mostly collection of session records.
//!
//! Records are never hard-deleted. Clearing archives every live record in
//! batches and is safe to retry: rows that are already archived are skipped.
//! After a clear, one audit record of department [`AUDIT_DEPARTMENT`] is
//! appended; audit records are never archived and are the only durable trace
//! that a clear happened.

use crate::{
    core::attachments::AttachmentRef,
    entities::{Record, record},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};

/// Department reserved for audit entries.
pub const AUDIT_DEPARTMENT: &str = "System";

// Bounded so the IN list stays well under SQLite's bound-parameter limit.
const ARCHIVE_BATCH_SIZE: usize = 500;

/// Which records a listing should return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Return archived records instead of live ones
    pub archived: bool,
}

/// Outcome of [`archive_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchivedBatch {
    /// Records flipped to archived by this call
    pub cleared_count: u64,
    /// Attachments referenced by the archived records
    pub attachments: Vec<AttachmentRef>,
}

/// Creates a new live record.
///
/// `department` must be non-empty and at least one of `syllabus_text` and
/// `attachment` must be present. Blank text counts as absent.
pub async fn create_record<C>(
    db: &C,
    department: &str,
    owner_user_id: &str,
    syllabus_text: Option<&str>,
    attachment: Option<&AttachmentRef>,
) -> Result<record::Model>
where
    C: ConnectionTrait,
{
    let department = department.trim();
    if department.is_empty() {
        return Err(Error::validation("Please select a department"));
    }

    let syllabus_text = syllabus_text.map(str::trim).filter(|t| !t.is_empty());
    if syllabus_text.is_none() && attachment.is_none() {
        return Err(Error::validation(
            "Please provide either syllabus text or upload a notes file",
        ));
    }

    insert_record(
        db,
        department,
        owner_user_id,
        syllabus_text.map(ToString::to_string),
        attachment,
        Utc::now(),
    )
    .await
}

async fn insert_record<C>(
    db: &C,
    department: &str,
    owner_user_id: &str,
    syllabus_text: Option<String>,
    attachment: Option<&AttachmentRef>,
    created_at: DateTime<Utc>,
) -> Result<record::Model>
where
    C: ConnectionTrait,
{
    let (kind, key, name, size) = match attachment.map(AttachmentRef::to_columns) {
        Some((kind, key, name, size)) => (Some(kind), Some(key), Some(name), Some(size)),
        None => (None, None, None, None),
    };

    let model = record::ActiveModel {
        display_id: Set(created_at.timestamp_millis()),
        created_at: Set(created_at),
        department: Set(department.to_string()),
        owner_user_id: Set(owner_user_id.to_string()),
        attachment_kind: Set(kind),
        attachment_key: Set(key),
        attachment_name: Set(name),
        attachment_size: Set(size),
        syllabus_text: Set(syllabus_text),
        archived: Set(false),
        archived_at: Set(None),
        ..Default::default()
    };

    model.insert(db).await.map_err(Into::into)
}

/// Lists records matching `filter`, newest first.
pub async fn list_records<C>(db: &C, filter: RecordFilter) -> Result<Vec<record::Model>>
where
    C: ConnectionTrait,
{
    Record::find()
        .filter(record::Column::Archived.eq(filter.archived))
        .order_by_desc(record::Column::CreatedAt)
        .order_by_desc(record::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a live record by its storage ID.
pub async fn get_live_record<C>(db: &C, record_id: i64) -> Result<Option<record::Model>>
where
    C: ConnectionTrait,
{
    let record = Record::find_by_id(record_id).one(db).await?;
    Ok(record.filter(|r| !r.archived))
}

/// Archives every live, non-audit record.
///
/// Rows are flipped in batches, each guarded by `archived = false`, so an
/// interrupted run leaves a mix of archived and live rows and a retry only
/// touches the ones still live.
pub async fn archive_all<C>(db: &C) -> Result<ArchivedBatch>
where
    C: ConnectionTrait,
{
    let live = Record::find()
        .filter(record::Column::Archived.eq(false))
        .filter(record::Column::Department.ne(AUDIT_DEPARTMENT))
        .all(db)
        .await?;

    let mut batch = ArchivedBatch::default();
    let now = Utc::now();

    for chunk in live.chunks(ARCHIVE_BATCH_SIZE) {
        let ids: Vec<i64> = chunk.iter().map(|r| r.id).collect();
        let result = Record::update_many()
            .col_expr(record::Column::Archived, Expr::value(true))
            .col_expr(record::Column::ArchivedAt, Expr::value(now))
            .filter(record::Column::Id.is_in(ids))
            .filter(record::Column::Archived.eq(false))
            .exec(db)
            .await?;

        batch.cleared_count += result.rows_affected;
        batch
            .attachments
            .extend(chunk.iter().filter_map(AttachmentRef::from_record));
    }

    tracing::info!(cleared = batch.cleared_count, "Ledger archived");
    Ok(batch)
}

/// Appends the audit record describing a clear.
pub async fn append_audit_entry<C>(
    db: &C,
    actor_user_id: &str,
    cleared_count: u64,
    files_deleted_count: u64,
    timestamp: DateTime<Utc>,
) -> Result<record::Model>
where
    C: ConnectionTrait,
{
    let text = format!(
        "ADMIN CLEAR: {cleared_count} records cleared by {actor_user_id} at {}. \
         {files_deleted_count} attached files deleted.",
        timestamp.to_rfc3339()
    );

    insert_record(
        db,
        AUDIT_DEPARTMENT,
        actor_user_id,
        Some(text),
        None,
        timestamp,
    )
    .await
}
