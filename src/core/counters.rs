//! Department Counters - a derived tally of live records per department.
//!
//! Counters are maintained incrementally for display and can always be
//! recomputed from the ledger with [`reconcile`]. Increments are a single
//! `INSERT ... ON CONFLICT DO UPDATE` statement, so concurrent increments to
//! the same department never read-then-write and cannot lose updates.

use crate::{
    core::ledger::AUDIT_DEPARTMENT,
    entities::{DepartmentCounter, Record, department_counter, record},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    FromQueryResult, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*,
    sea_query::{Expr, OnConflict},
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Live count for one department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentCount {
    /// Department name
    pub department: String,
    /// Number of live records
    pub count: i64,
}

/// Increments the counter for `department`, creating it at 1 if needed.
///
/// An archived row is revived with a count of 1, since archiving resets the
/// tally for future display.
pub async fn increment<C>(db: &C, department: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let department = department.trim();
    if department.is_empty() {
        return Err(Error::validation("Department is required"));
    }

    let now = Utc::now();
    let row = department_counter::ActiveModel {
        department: Set(department.to_string()),
        record_count: Set(1),
        archived: Set(false),
        updated_at: Set(now),
    };

    // Both assignments read the pre-update row, so `archived` in the CASE is the old flag.
    DepartmentCounter::insert(row)
        .on_conflict(
            OnConflict::column(department_counter::Column::Department)
                .value(
                    department_counter::Column::RecordCount,
                    Expr::cust(r#"CASE WHEN "archived" THEN 1 ELSE "record_count" + 1 END"#),
                )
                .value(department_counter::Column::Archived, Expr::value(false))
                .value(department_counter::Column::UpdatedAt, Expr::value(now))
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    tracing::debug!(department = %department, "Department counter incremented");
    Ok(())
}

/// Archives every counter row, resetting all displayed counts to zero.
///
/// Returns the number of rows archived by this call.
pub async fn archive_all<C>(db: &C) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = DepartmentCounter::update_many()
        .col_expr(department_counter::Column::Archived, Expr::value(true))
        .col_expr(department_counter::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(department_counter::Column::Archived.eq(false))
        .exec(db)
        .await?;

    tracing::info!(archived = result.rows_affected, "Department counters archived");
    Ok(result.rows_affected)
}

/// Lists live counters, ordered by department name.
pub async fn list<C>(db: &C) -> Result<Vec<DepartmentCount>>
where
    C: ConnectionTrait,
{
    let rows = DepartmentCounter::find()
        .filter(department_counter::Column::Archived.eq(false))
        .order_by_asc(department_counter::Column::Department)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| DepartmentCount {
            department: row.department,
            count: row.record_count,
        })
        .collect())
}

#[derive(Debug, FromQueryResult)]
struct DepartmentTally {
    department: String,
    total: i64,
}

/// Recomputes every counter from the live, non-audit records.
///
/// Departments with live records get their exact count; every other counter
/// row is archived. Runs in one transaction so readers never see a
/// half-reconciled table. Returns the number of departments with live records.
pub async fn reconcile<C>(db: &C) -> Result<usize>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let tallies: BTreeMap<String, i64> = Record::find()
        .select_only()
        .column(record::Column::Department)
        .column_as(Expr::col(record::Column::Id).count(), "total")
        .filter(record::Column::Archived.eq(false))
        .filter(record::Column::Department.ne(AUDIT_DEPARTMENT))
        .group_by(record::Column::Department)
        .into_model::<DepartmentTally>()
        .all(&txn)
        .await?
        .into_iter()
        .map(|t| (t.department, t.total))
        .collect();

    let now = Utc::now();
    DepartmentCounter::update_many()
        .col_expr(department_counter::Column::Archived, Expr::value(true))
        .col_expr(department_counter::Column::UpdatedAt, Expr::value(now))
        .filter(department_counter::Column::Archived.eq(false))
        .exec(&txn)
        .await?;

    for (department, total) in &tallies {
        let row = department_counter::ActiveModel {
            department: Set(department.clone()),
            record_count: Set(*total),
            archived: Set(false),
            updated_at: Set(now),
        };
        DepartmentCounter::insert(row)
            .on_conflict(
                OnConflict::column(department_counter::Column::Department)
                    .update_columns([
                        department_counter::Column::RecordCount,
                        department_counter::Column::Archived,
                        department_counter::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;
    }

    txn.commit().await?;

    tracing::info!(departments = tallies.len(), "Department counters reconciled");
    Ok(tallies.len())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::ledger;
    use crate::test_utils::*;
    use std::sync::Arc;

    fn count_for(counts: &[DepartmentCount], department: &str) -> Option<i64> {
        counts
            .iter()
            .find(|c| c.department == department)
            .map(|c| c.count)
    }

    #[tokio::test]
    async fn test_sequential_increments() -> Result<()> {
        let db = setup_test_db().await?;

        for _ in 0..5 {
            increment(&db, "CS101").await?;
        }
        increment(&db, "MATH200").await?;

        let counts = list(&db).await?;
        assert_eq!(count_for(&counts, "CS101"), Some(5));
        assert_eq!(count_for(&counts, "MATH200"), Some(1));
        assert_eq!(counts.len(), 2);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_lose_nothing() -> Result<()> {
        let (db, _dir) = setup_file_test_db().await?;
        let db = Arc::new(db);
        let calls = 50;

        let handles: Vec<_> = (0..calls)
            .map(|_| {
                let db = Arc::clone(&db);
                tokio::spawn(async move { increment(db.as_ref(), "CS101").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap()?;
        }

        let counts = list(db.as_ref()).await?;
        assert_eq!(count_for(&counts, "CS101"), Some(calls));

        Ok(())
    }

    #[tokio::test]
    async fn test_archive_all_resets_counts() -> Result<()> {
        let db = setup_test_db().await?;
        increment(&db, "CS101").await?;
        increment(&db, "CS101").await?;

        assert_eq!(archive_all(&db).await?, 1);
        assert!(list(&db).await?.is_empty());
        assert_eq!(archive_all(&db).await?, 0);

        // Next increment revives the row from zero
        increment(&db, "CS101").await?;
        assert_eq!(count_for(&list(&db).await?, "CS101"), Some(1));

        Ok(())
    }

    #[tokio::test]
    async fn test_increment_rejects_blank_department() -> Result<()> {
        let db = setup_test_db().await?;
        let result = increment(&db, " ").await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_repairs_drift() -> Result<()> {
        let db = setup_test_db().await?;

        // Records without matching increments, as after a crash mid-create
        create_test_record(&db, "CS101", "a").await?;
        create_test_record(&db, "CS101", "b").await?;
        create_test_record(&db, "MATH200", "c").await?;
        // A stale counter for a department with no live records
        increment(&db, "BIO100").await?;
        // Audit entries are not counted
        ledger::append_audit_entry(&db, "alice", 0, 0, Utc::now()).await?;

        assert_eq!(reconcile(&db).await?, 2);

        let counts = list(&db).await?;
        assert_eq!(count_for(&counts, "CS101"), Some(2));
        assert_eq!(count_for(&counts, "MATH200"), Some(1));
        assert_eq!(count_for(&counts, "BIO100"), None);
        assert_eq!(count_for(&counts, AUDIT_DEPARTMENT), None);

        // Incremental updates continue from the reconciled value
        increment(&db, "CS101").await?;
        assert_eq!(count_for(&list(&db).await?, "CS101"), Some(3));

        Ok(())
    }
}
