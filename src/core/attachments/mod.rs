//! Attachment Store - persists uploaded PDFs and hands out references to them.
//!
//! Two interchangeable strategies implement [`AttachmentStore`]:
//! [`local::LocalAttachmentStore`] writes files under a directory served by this
//! process, and [`remote::RemoteAttachmentStore`] hands the bytes to a remote
//! object-upload API whose download URLs are signed and short-lived.
//!
//! Bytes are always stored before the record that references them is created.
//! If record creation fails afterwards the bytes stay behind as an orphan;
//! nothing garbage-collects them.

pub mod local;
pub mod remote;

use crate::{
    entities::record,
    errors::{Error, Result},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// MIME type accepted for attachments.
pub const PDF_MIME: &str = "application/pdf";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// A file received from a client, not yet stored.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Raw file content
    pub bytes: Vec<u8>,
    /// File name supplied by the client
    pub original_name: String,
    /// MIME type declared by the client, if any
    pub content_type: Option<String>,
}

/// Store-specific handle to stored attachment bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AttachmentRef {
    /// A file on local disk, served by this process
    Local {
        /// Generated name of the file inside the upload directory
        stored_name: String,
        /// Name the user uploaded it as
        original_name: String,
        /// Size in bytes
        size_bytes: u64,
    },
    /// A file held by the remote upload API
    Remote {
        /// Upload ID issued by the remote API
        upload_handle: String,
        /// Name the user uploaded it as
        original_name: String,
        /// Size in bytes
        size_bytes: u64,
    },
}

const KIND_LOCAL: &str = "local";
const KIND_REMOTE: &str = "remote";

impl AttachmentRef {
    /// Name the user uploaded the file as.
    #[must_use]
    pub fn original_name(&self) -> &str {
        match self {
            Self::Local { original_name, .. } | Self::Remote { original_name, .. } => {
                original_name
            }
        }
    }

    /// Size of the stored file in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        match self {
            Self::Local { size_bytes, .. } | Self::Remote { size_bytes, .. } => *size_bytes,
        }
    }

    /// Short label used for the listing column, e.g. `📄 notes.pdf (12KB)`.
    #[must_use]
    pub fn display_label(&self) -> String {
        let kb = (self.size_bytes() + 512) / 1024;
        format!("📄 {} ({kb}KB)", self.original_name())
    }

    /// Splits the reference into the record's flat attachment columns:
    /// `(kind, key, original name, size)`.
    #[must_use]
    pub fn to_columns(&self) -> (String, String, String, i64) {
        let size = i64::try_from(self.size_bytes()).unwrap_or(i64::MAX);
        match self {
            Self::Local {
                stored_name,
                original_name,
                ..
            } => (
                KIND_LOCAL.to_string(),
                stored_name.clone(),
                original_name.clone(),
                size,
            ),
            Self::Remote {
                upload_handle,
                original_name,
                ..
            } => (
                KIND_REMOTE.to_string(),
                upload_handle.clone(),
                original_name.clone(),
                size,
            ),
        }
    }

    /// Rebuilds the reference stored on a record, if it has one.
    #[must_use]
    pub fn from_record(record: &record::Model) -> Option<Self> {
        let key = record.attachment_key.clone()?;
        let original_name = record
            .attachment_name
            .clone()
            .unwrap_or_else(|| "file.pdf".to_string());
        let size_bytes = record
            .attachment_size
            .and_then(|s| u64::try_from(s).ok())
            .unwrap_or(0);

        match record.attachment_kind.as_deref()? {
            KIND_LOCAL => Some(Self::Local {
                stored_name: key,
                original_name,
                size_bytes,
            }),
            KIND_REMOTE => Some(Self::Remote {
                upload_handle: key,
                original_name,
                size_bytes,
            }),
            other => {
                tracing::warn!(record_id = record.id, kind = other, "Unknown attachment kind");
                None
            }
        }
    }
}

/// Result of resolving a reference to something a client can fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAttachment {
    /// False while the remote side is still processing the upload
    pub ready: bool,
    /// Where the bytes can be fetched; absent while not ready
    pub url: Option<String>,
    /// File name to present to the user
    pub filename: String,
    /// When `url` stops working; `None` for permanent URLs
    pub expiry: Option<DateTime<Utc>>,
}

/// Contract shared by every attachment strategy.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Short strategy name used in logs.
    fn kind(&self) -> &'static str;

    /// Durably stores a PDF and returns a reference to it.
    ///
    /// Fails with [`Error::FileTooLarge`] above `max_size_bytes` and with
    /// [`Error::InvalidFileType`] when the content is not a PDF.
    async fn store(&self, file: &IncomingFile, max_size_bytes: u64) -> Result<AttachmentRef>;

    /// Turns a reference into a fetchable URL.
    ///
    /// `ready: false` is a retryable state, not an error.
    async fn resolve(&self, reference: &AttachmentRef) -> Result<ResolvedAttachment>;

    /// Deletes the stored bytes. Best effort: failures are logged and
    /// reported as `false`, never propagated.
    async fn delete(&self, reference: &AttachmentRef) -> bool;

    /// Returns the bytes for a key this process serves itself.
    ///
    /// Only the local strategy serves bytes; other strategies return
    /// [`Error::NotFound`].
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        Err(Error::NotFound {
            what: format!("file {key}"),
        })
    }
}

/// Checks size and content type shared by all strategies.
pub fn validate_pdf(file: &IncomingFile, max_size_bytes: u64) -> Result<()> {
    let size = file.bytes.len() as u64;
    if size > max_size_bytes {
        return Err(Error::FileTooLarge {
            size,
            limit: max_size_bytes,
        });
    }

    if let Some(declared) = file.content_type.as_deref() {
        let essence = declared.split(';').next().unwrap_or(declared).trim();
        if !essence.eq_ignore_ascii_case(PDF_MIME) {
            return Err(Error::InvalidFileType {
                detected: essence.to_string(),
            });
        }
    }

    if !file.bytes.starts_with(PDF_MAGIC) {
        return Err(Error::InvalidFileType {
            detected: if file.bytes.is_empty() {
                "empty file".to_string()
            } else {
                "content is not a PDF".to_string()
            },
        });
    }

    Ok(())
}

/// Reduces a client-supplied file name to its final path component.
#[must_use]
pub fn sanitize_original_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() {
        "file.pdf".to_string()
    } else {
        base.to_string()
    }
}
