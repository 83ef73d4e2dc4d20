//! Session/Access Controller - orchestrates credentials, the access gate,
//! the ledger, the counters and the attachment store.
//!
//! Every ledger, counter and attachment operation requires an elevated
//! session. The controller never stores sessions itself: callers pass in the
//! [`SessionData`] attached to the request and persist whatever comes back.
//! Multi-step operations are not rolled back on failure; the
//! consequences are:
//! - attachment bytes stored before a failed record insert stay orphaned;
//! - a failed counter increment after a successful insert leaves the counter
//!   short until the next [`counters::reconcile`];
//! - a failed counter archive after a successful ledger clear leaves stale
//!   counts until the next reconcile.

use crate::{
    core::{
        access_gate,
        attachments::{AttachmentRef, AttachmentStore, IncomingFile, ResolvedAttachment},
        counters::{self, DepartmentCount},
        credentials,
        ledger::{self, AUDIT_DEPARTMENT, RecordFilter},
        password,
        session::{AccessLevel, SessionData},
    },
    entities::record,
    errors::{Error, Result},
};
use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Input for [`SessionController::add_record`].
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    /// Department tag
    pub department: String,
    /// Free-text syllabus notes
    pub syllabus_text: Option<String>,
    /// Uploaded PDF, if any
    pub file: Option<IncomingFile>,
}

/// What was created by [`SessionController::add_record`].
#[derive(Debug, Clone)]
pub struct RecordReceipt {
    /// The persisted record
    pub record: record::Model,
    /// The stored attachment, if one was uploaded
    pub attachment: Option<AttachmentRef>,
}

/// Summary of a ledger clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearOutcome {
    /// Records archived
    pub cleared_count: u64,
    /// Attachments whose bytes were deleted
    pub files_deleted: u64,
    /// User who cleared the ledger
    pub cleared_by: String,
    /// When the clear completed
    pub cleared_at: DateTime<Utc>,
}

/// Knobs the controller needs from the application configuration.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Largest accepted attachment in bytes
    pub max_upload_bytes: u64,
    /// Extra password required to clear the ledger, if configured
    pub admin_password: Option<String>,
    /// Fixed session lifetime, counted from login
    pub session_ttl: TimeDelta,
}

/// Entry point for every client-facing operation.
pub struct SessionController {
    db: DatabaseConnection,
    attachments: Arc<dyn AttachmentStore>,
    settings: ControllerSettings,
}

impl SessionController {
    /// Wires the controller to its collaborators.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        attachments: Arc<dyn AttachmentStore>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            db,
            attachments,
            settings,
        }
    }

    /// Database handle, for startup maintenance.
    #[must_use]
    pub const fn database(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Fixed session lifetime.
    #[must_use]
    pub const fn session_ttl(&self) -> TimeDelta {
        self.settings.session_ttl
    }

    /// Registers a new account. Does not log the user in.
    pub async fn register(&self, user_id: &str, password: &str) -> Result<()> {
        let user = credentials::register_user(&self.db, user_id, password).await?;
        info!(user_id = %user.user_id, "User registered");
        Ok(())
    }

    /// Checks credentials and returns the data of a new authenticated session.
    ///
    /// The caller replaces whatever session the client already held.
    pub async fn login(&self, user_id: &str, password: &str) -> Result<SessionData> {
        match credentials::authenticate(&self.db, user_id, password).await {
            Ok(user) => {
                info!(user_id = %user.user_id, "User logged in");
                Ok(SessionData::login(&user.user_id, Utc::now()))
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Login failed");
                Err(e)
            }
        }
    }

    /// Elevates an authenticated session with a shared access code and
    /// returns the updated session data.
    pub async fn submit_access_code(
        &self,
        session: Option<&SessionData>,
        code: &str,
    ) -> Result<SessionData> {
        let session = self.require_session(session)?;

        if !access_gate::is_valid_code(&self.db, code).await? {
            warn!(user_id = %session.user_id, "Invalid access code presented");
            return Err(Error::InvalidAccessCode);
        }

        info!(user_id = %session.user_id, "Access granted");
        Ok(session.clone().elevate(Utc::now()))
    }

    /// Records a logout. The caller drops the session itself.
    pub fn logout(&self, session: Option<&SessionData>) {
        if let Some(session) = self.session_info(session) {
            info!(user_id = %session.user_id, "User logged out");
        }
    }

    /// The session, if it is present and has not expired.
    #[must_use]
    pub fn session_info<'s>(&self, session: Option<&'s SessionData>) -> Option<&'s SessionData> {
        session.filter(|s| !s.is_expired(Utc::now(), self.settings.session_ttl))
    }

    /// Where the session stands in the access state machine right now.
    #[must_use]
    pub fn access_level(&self, session: Option<&SessionData>) -> AccessLevel {
        self.session_info(session)
            .map_or(AccessLevel::Anonymous, SessionData::access_level)
    }

    fn require_session<'s>(&self, session: Option<&'s SessionData>) -> Result<&'s SessionData> {
        self.session_info(session).ok_or_else(|| Error::Unauthorized {
            message: "Not authenticated. Please login first.".to_string(),
        })
    }

    /// Returns the session if it is elevated, `Unauthorized` otherwise.
    pub fn require_elevated<'s>(
        &self,
        session: Option<&'s SessionData>,
    ) -> Result<&'s SessionData> {
        let session = self.require_session(session)?;
        if session.access_level() == AccessLevel::Elevated {
            Ok(session)
        } else {
            Err(Error::Unauthorized {
                message: "Access code required. Please enter your access code first.".to_string(),
            })
        }
    }

    /// Stores the attachment (if any), creates the record and bumps the
    /// department counter, in that order.
    pub async fn add_record(
        &self,
        session: Option<&SessionData>,
        input: NewRecord,
    ) -> Result<RecordReceipt> {
        let session = self.require_elevated(session)?;

        let department = input.department.trim();
        if department.is_empty() {
            return Err(Error::validation("Please select a department"));
        }
        if department.eq_ignore_ascii_case(AUDIT_DEPARTMENT) {
            return Err(Error::validation(format!(
                "The department name \"{AUDIT_DEPARTMENT}\" is reserved"
            )));
        }
        let syllabus_text = input
            .syllabus_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if syllabus_text.is_none() && input.file.is_none() {
            return Err(Error::validation(
                "Please provide either syllabus text or upload a notes file",
            ));
        }

        let attachment = match &input.file {
            Some(file) => Some(
                self.attachments
                    .store(file, self.settings.max_upload_bytes)
                    .await?,
            ),
            None => None,
        };

        let record = match ledger::create_record(
            &self.db,
            department,
            &session.user_id,
            syllabus_text,
            attachment.as_ref(),
        )
        .await
        {
            Ok(record) => record,
            Err(e) => {
                if let Some(reference) = &attachment {
                    error!(
                        error = %e,
                        attachment = ?reference,
                        "Record creation failed after attachment was stored; attachment is orphaned"
                    );
                }
                return Err(e);
            }
        };

        if let Err(e) = counters::increment(&self.db, department).await {
            error!(department = %department, error = %e, "Failed to update department counter");
        }

        info!(
            record_id = record.id,
            user_id = %session.user_id,
            department = %department,
            has_file = attachment.is_some(),
            store = self.attachments.kind(),
            "Record added"
        );
        Ok(RecordReceipt { record, attachment })
    }

    /// Lists live records, newest first.
    pub async fn list_records(&self, session: Option<&SessionData>) -> Result<Vec<record::Model>> {
        self.require_elevated(session)?;
        ledger::list_records(&self.db, RecordFilter::default()).await
    }

    /// Archives the ledger, deletes the archived records' attachments,
    /// writes the audit entry and archives the counters.
    pub async fn clear_records(
        &self,
        session: Option<&SessionData>,
        admin_password: Option<&str>,
    ) -> Result<ClearOutcome> {
        let session = self.require_elevated(session)?;

        if let Some(expected) = self.settings.admin_password.as_deref() {
            let provided = admin_password.unwrap_or_default();
            if !password::secrets_match(provided, expected) {
                warn!(user_id = %session.user_id, "Clear rejected: wrong admin password");
                return Err(Error::Unauthorized {
                    message: "Invalid admin password".to_string(),
                });
            }
        }

        info!(user_id = %session.user_id, "Clearing records");
        let batch = ledger::archive_all(&self.db).await?;

        let mut files_deleted = 0;
        for reference in &batch.attachments {
            if self.attachments.delete(reference).await {
                files_deleted += 1;
            }
        }

        let cleared_at = Utc::now();
        ledger::append_audit_entry(
            &self.db,
            &session.user_id,
            batch.cleared_count,
            files_deleted,
            cleared_at,
        )
        .await?;

        if let Err(e) = counters::archive_all(&self.db).await {
            error!(error = %e, "Failed to archive department counters after clear");
        }

        info!(
            user_id = %session.user_id,
            cleared = batch.cleared_count,
            files_deleted,
            "Records cleared"
        );
        Ok(ClearOutcome {
            cleared_count: batch.cleared_count,
            files_deleted,
            cleared_by: session.user_id.clone(),
            cleared_at,
        })
    }

    /// Live department counts.
    pub async fn department_counts(
        &self,
        session: Option<&SessionData>,
    ) -> Result<Vec<DepartmentCount>> {
        self.require_elevated(session)?;
        counters::list(&self.db).await
    }

    /// Resolves the attachment of a live record to a fetchable URL.
    pub async fn resolve_attachment(
        &self,
        session: Option<&SessionData>,
        record_id: i64,
    ) -> Result<ResolvedAttachment> {
        self.require_elevated(session)?;

        let not_found = || Error::NotFound {
            what: format!("attachment for record {record_id}"),
        };
        let record = ledger::get_live_record(&self.db, record_id)
            .await?
            .ok_or_else(not_found)?;
        let reference = AttachmentRef::from_record(&record).ok_or_else(not_found)?;

        self.attachments.resolve(&reference).await
    }

    /// Bytes of a file this process serves itself.
    pub async fn fetch_stored_file(
        &self,
        session: Option<&SessionData>,
        key: &str,
    ) -> Result<Vec<u8>> {
        self.require_elevated(session)?;
        self.attachments.fetch(key).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::attachments::local::LocalAttachmentStore;
    use crate::test_utils::*;

    async fn elevated_session(controller: &SessionController) -> Result<SessionData> {
        controller.register("alice", "secret1").await?;
        let session = controller.login("alice", "secret1").await?;
        controller
            .submit_access_code(Some(&session), TEST_ACCESS_CODE)
            .await
    }

    fn text_record(department: &str, text: &str) -> NewRecord {
        NewRecord {
            department: department.to_string(),
            syllabus_text: Some(text.to_string()),
            file: None,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() -> Result<()> {
        let (controller, _dir) = setup_test_controller().await?;

        controller.register("alice", "secret1").await?;
        let session = controller.login("alice", "secret1").await?;
        assert_eq!(
            controller.access_level(Some(&session)),
            AccessLevel::Authenticated
        );
        let session = controller
            .submit_access_code(Some(&session), "LET-ME-IN")
            .await?;
        assert_eq!(controller.access_level(Some(&session)), AccessLevel::Elevated);
        let session = Some(&session);

        controller
            .add_record(session, text_record("CS101", "midterm notes"))
            .await?;
        let records = controller.list_records(session).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].department, "CS101");
        assert_eq!(records[0].syllabus_text.as_deref(), Some("midterm notes"));
        assert_eq!(records[0].owner_user_id, "alice");

        let outcome = controller.clear_records(session, None).await?;
        assert_eq!(outcome.cleared_count, 1);
        assert_eq!(outcome.cleared_by, "alice");

        let records = controller.list_records(session).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].department, AUDIT_DEPARTMENT);
        assert!(controller.department_counts(session).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_authenticated_session_cannot_add_records() -> Result<()> {
        let (controller, _dir) = setup_test_controller().await?;
        controller.register("alice", "secret1").await?;
        let session = controller.login("alice", "secret1").await?;

        let result = controller
            .add_record(Some(&session), text_record("CS101", "notes"))
            .await;
        assert!(matches!(result, Err(Error::Unauthorized { .. })));

        // The ledger was never touched
        let records = ledger::list_records(controller.database(), RecordFilter::default()).await?;
        assert!(records.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_anonymous_is_rejected_everywhere() -> Result<()> {
        let (controller, _dir) = setup_test_controller().await?;
        assert_eq!(controller.access_level(None), AccessLevel::Anonymous);

        assert!(matches!(
            controller.list_records(None).await,
            Err(Error::Unauthorized { .. })
        ));
        assert!(matches!(
            controller.department_counts(None).await,
            Err(Error::Unauthorized { .. })
        ));
        assert!(matches!(
            controller.clear_records(None, None).await,
            Err(Error::Unauthorized { .. })
        ));
        assert!(matches!(
            controller.resolve_attachment(None, 1).await,
            Err(Error::Unauthorized { .. })
        ));
        assert!(matches!(
            controller.submit_access_code(None, TEST_ACCESS_CODE).await,
            Err(Error::Unauthorized { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_session_reads_as_anonymous() -> Result<()> {
        let (controller, _dir) = setup_test_controller().await?;
        let login_time = Utc::now() - controller.session_ttl() - TimeDelta::seconds(1);
        let stale = SessionData::login("alice", login_time).elevate(Utc::now());

        assert_eq!(controller.access_level(Some(&stale)), AccessLevel::Anonymous);
        assert!(controller.session_info(Some(&stale)).is_none());
        assert!(matches!(
            controller.list_records(Some(&stale)).await,
            Err(Error::Unauthorized { .. })
        ));
        assert!(matches!(
            controller
                .submit_access_code(Some(&stale), TEST_ACCESS_CODE)
                .await,
            Err(Error::Unauthorized { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_login_and_access_code_failures() -> Result<()> {
        let (controller, _dir) = setup_test_controller().await?;
        controller.register("alice", "secret1").await?;

        assert!(matches!(
            controller.login("alice", "wrong-password").await,
            Err(Error::InvalidCredentials)
        ));

        let session = controller.login("alice", "secret1").await?;
        assert!(matches!(
            controller.submit_access_code(Some(&session), "NOPE").await,
            Err(Error::InvalidAccessCode)
        ));
        // Still authenticated, not elevated
        assert_eq!(
            controller.access_level(Some(&session)),
            AccessLevel::Authenticated
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_relogin_starts_unelevated() -> Result<()> {
        let (controller, _dir) = setup_test_controller().await?;
        let old = elevated_session(&controller).await?;

        let new = controller.login("alice", "secret1").await?;
        assert!(new.login_time >= old.login_time);
        assert_eq!(controller.access_level(Some(&new)), AccessLevel::Authenticated);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_record_validation() -> Result<()> {
        let (controller, _dir) = setup_test_controller().await?;
        let session = elevated_session(&controller).await?;
        let session = Some(&session);

        for input in [
            text_record("", "notes"),
            text_record("System", "spoofed audit"),
            NewRecord {
                department: "CS101".to_string(),
                syllabus_text: Some("  ".to_string()),
                file: None,
            },
        ] {
            let result = controller.add_record(session, input).await;
            assert!(matches!(result, Err(Error::Validation { .. })));
        }
        assert!(controller.list_records(session).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_counts_follow_creates() -> Result<()> {
        let (controller, _dir) = setup_test_controller().await?;
        let session = elevated_session(&controller).await?;
        let session = Some(&session);

        for i in 0..3 {
            controller
                .add_record(session, text_record("CS101", &format!("notes {i}")))
                .await?;
        }
        let counts = controller.department_counts(session).await?;
        assert_eq!(
            counts,
            vec![DepartmentCount {
                department: "CS101".to_string(),
                count: 3
            }]
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_count_exactly() -> Result<()> {
        let (db, _db_dir) = setup_file_test_db().await?;
        let (controller, _dir) = setup_test_controller_with(db).await?;
        let controller = Arc::new(controller);
        let session = Arc::new(elevated_session(&controller).await?);
        let calls = 20;

        let handles: Vec<_> = (0..calls)
            .map(|i| {
                let controller = Arc::clone(&controller);
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    controller
                        .add_record(
                            Some(session.as_ref()),
                            text_record("CS101", &format!("notes {i}")),
                        )
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap()?;
        }

        let counts = controller.department_counts(Some(session.as_ref())).await?;
        assert_eq!(counts[0].count, calls);
        assert_eq!(
            controller.list_records(Some(session.as_ref())).await?.len(),
            usize::try_from(calls).unwrap()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_attachment_lifecycle() -> Result<()> {
        let (controller, dir) = setup_test_controller().await?;
        let session = elevated_session(&controller).await?;
        let session = Some(&session);

        let receipt = controller
            .add_record(
                session,
                NewRecord {
                    department: "CS101".to_string(),
                    syllabus_text: None,
                    file: Some(pdf_file("notes.pdf")),
                },
            )
            .await?;
        assert!(receipt.attachment.is_some());

        let resolved = controller
            .resolve_attachment(session, receipt.record.id)
            .await?;
        assert!(resolved.ready);
        let url = resolved.url.unwrap();
        let key = url.strip_prefix("/files/").unwrap();
        let bytes = controller.fetch_stored_file(session, key).await?;
        assert_eq!(bytes, pdf_file("notes.pdf").bytes);

        let outcome = controller.clear_records(session, None).await?;
        assert_eq!(outcome.files_deleted, 1);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);

        // The archived record no longer resolves
        assert!(matches!(
            controller.resolve_attachment(session, receipt.record.id).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_upload_creates_no_record() -> Result<()> {
        let (controller, _dir) = setup_test_controller().await?;
        let session = elevated_session(&controller).await?;
        let session = Some(&session);

        let mut file = pdf_file("notes.txt");
        file.content_type = Some("text/plain".to_string());
        let result = controller
            .add_record(
                session,
                NewRecord {
                    department: "CS101".to_string(),
                    syllabus_text: Some("notes".to_string()),
                    file: Some(file),
                },
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidFileType { .. })));
        assert!(controller.list_records(session).await?.is_empty());
        assert!(controller.department_counts(session).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_requires_admin_password_when_configured() -> Result<()> {
        let db = setup_test_db().await?;
        access_gate::seed_codes(&db, [TEST_ACCESS_CODE]).await?;
        let dir = tempfile::tempdir()?;
        let controller = SessionController::new(
            db,
            Arc::new(LocalAttachmentStore::new(dir.path())),
            ControllerSettings {
                max_upload_bytes: 1024,
                admin_password: Some("hunter22".to_string()),
                session_ttl: TimeDelta::hours(1),
            },
        );
        let session = elevated_session(&controller).await?;
        let session = Some(&session);

        for attempt in [None, Some("guess"), Some("hunter2"), Some("hunter222"), Some("")] {
            assert!(
                matches!(
                    controller.clear_records(session, attempt).await,
                    Err(Error::Unauthorized { .. })
                ),
                "expected {attempt:?} to be rejected"
            );
        }
        let outcome = controller.clear_records(session, Some("hunter22")).await?;
        assert_eq!(outcome.cleared_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_twice_is_idempotent() -> Result<()> {
        let (controller, _dir) = setup_test_controller().await?;
        let session = elevated_session(&controller).await?;
        let session = Some(&session);
        controller
            .add_record(session, text_record("CS101", "notes"))
            .await?;

        assert_eq!(controller.clear_records(session, None).await?.cleared_count, 1);
        assert_eq!(controller.clear_records(session, None).await?.cleared_count, 0);

        // One audit entry per clear
        let records = controller.list_records(session).await?;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.department == AUDIT_DEPARTMENT));
        Ok(())
    }
}
