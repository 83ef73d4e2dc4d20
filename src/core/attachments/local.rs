//! Local disk strategy for the Attachment Store.
//!
//! Files are written under `upload_dir` with a generated name and served back
//! by this process at `<url_prefix>/<stored_name>`. Local URLs never expire.

use super::{
    AttachmentRef, AttachmentStore, IncomingFile, ResolvedAttachment, sanitize_original_name,
    validate_pdf,
};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// URL prefix under which the web layer serves stored files.
pub const DEFAULT_URL_PREFIX: &str = "/files";

/// Attachment store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalAttachmentStore {
    upload_dir: PathBuf,
    url_prefix: String,
}

impl LocalAttachmentStore {
    /// Creates a store writing into `upload_dir`.
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
        }
    }

    /// Creates the upload directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        Ok(())
    }

    fn path_for(&self, stored_name: &str) -> Result<PathBuf> {
        if !is_valid_stored_name(stored_name) {
            return Err(Error::NotFound {
                what: format!("file {stored_name}"),
            });
        }
        Ok(self.upload_dir.join(stored_name))
    }
}

/// Generated names look like `notesFile-<millis>-<random>.pdf`; anything
/// else (path separators, `..`) is refused.
fn is_valid_stored_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn generate_stored_name() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::random::<u32>() % 1_000_000_000;
    format!("notesFile-{millis}-{suffix}.pdf")
}

#[async_trait]
impl AttachmentStore for LocalAttachmentStore {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn store(&self, file: &IncomingFile, max_size_bytes: u64) -> Result<AttachmentRef> {
        validate_pdf(file, max_size_bytes)?;
        self.ensure_dir().await?;

        let stored_name = generate_stored_name();
        let path = self.path_for(&stored_name)?;
        tokio::fs::write(&path, &file.bytes).await?;

        let original_name = sanitize_original_name(&file.original_name);
        info!(
            stored_name = %stored_name,
            original_name = %original_name,
            size = file.bytes.len(),
            "Attachment stored locally"
        );

        Ok(AttachmentRef::Local {
            stored_name,
            original_name,
            size_bytes: file.bytes.len() as u64,
        })
    }

    async fn resolve(&self, reference: &AttachmentRef) -> Result<ResolvedAttachment> {
        let AttachmentRef::Local {
            stored_name,
            original_name,
            ..
        } = reference
        else {
            return Err(Error::NotFound {
                what: "attachment stored by another backend".to_string(),
            });
        };

        let path = self.path_for(stored_name)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(Error::NotFound {
                what: format!("file {stored_name}"),
            });
        }

        Ok(ResolvedAttachment {
            ready: true,
            url: Some(format!("{}/{stored_name}", self.url_prefix)),
            filename: original_name.clone(),
            expiry: None,
        })
    }

    async fn delete(&self, reference: &AttachmentRef) -> bool {
        let AttachmentRef::Local { stored_name, .. } = reference else {
            warn!("Refusing to delete an attachment stored by another backend");
            return false;
        };

        let path = match self.path_for(stored_name) {
            Ok(path) => path,
            Err(e) => {
                warn!(stored_name = %stored_name, error = %e, "Invalid stored attachment name");
                return false;
            }
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(stored_name = %stored_name, "Attachment deleted");
                true
            }
            Err(e) => {
                warn!(stored_name = %stored_name, error = %e, "Failed to delete attachment, leaving orphan");
                false
            }
        }
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound {
                what: format!("file {key}"),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
