//! Remote object-upload strategy for the Attachment Store.
//!
//! Uploading is a two-step exchange: create an upload (`POST /v1/file_uploads`)
//! to obtain an ID and an upload URL, then send the bytes to that URL as
//! multipart form data. The remote side processes uploads asynchronously, so a
//! freshly stored file may resolve as not ready for a while. Download URLs are
//! signed and expire; they are requested again on every resolve and never cached.

use super::{
    AttachmentRef, AttachmentStore, IncomingFile, PDF_MIME, ResolvedAttachment,
    sanitize_original_name, validate_pdf,
};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Header carrying the remote API version.
pub const VERSION_HEADER: &str = "Notion-Version";

#[derive(Debug, Serialize)]
struct CreateUploadRequest<'a> {
    filename: &'a str,
    content_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateUploadResponse {
    id: String,
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadStatusResponse {
    status: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    expiry_time: Option<DateTime<Utc>>,
}

/// Attachment store backed by a remote upload API.
#[derive(Debug, Clone)]
pub struct RemoteAttachmentStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_version: String,
}

impl RemoteAttachmentStore {
    /// Creates a client for the API at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("session-records/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: api_version.into(),
        })
    }

    fn uploads_url(&self) -> String {
        format!("{}/v1/file_uploads", self.base_url)
    }

    fn upload_url(&self, handle: &str) -> String {
        format!("{}/v1/file_uploads/{handle}", self.base_url)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(VERSION_HEADER, &self.api_version)
    }
}

/// Maps non-success statuses to crate errors; 404 becomes `NotFound`.
async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound {
            what: what.to_string(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Upstream {
        message: format!("{what}: HTTP {status} - {body}"),
    })
}

#[async_trait]
impl AttachmentStore for RemoteAttachmentStore {
    fn kind(&self) -> &'static str {
        "remote"
    }

    async fn store(&self, file: &IncomingFile, max_size_bytes: u64) -> Result<AttachmentRef> {
        validate_pdf(file, max_size_bytes)?;
        let original_name = sanitize_original_name(&file.original_name);

        // Step 1: create the upload
        let response = self
            .authorized(self.client.post(self.uploads_url()))
            .json(&CreateUploadRequest {
                filename: &original_name,
                content_type: PDF_MIME,
            })
            .send()
            .await
            .map_err(|e| Error::Upstream {
                message: format!("failed to create file upload: {e}"),
            })?;
        let created: CreateUploadResponse = check_status(response, "file upload creation")
            .await?
            .json()
            .await?;
        debug!(upload_id = %created.id, "Remote file upload created");

        // Step 2: send the bytes
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(original_name.clone())
            .mime_str(PDF_MIME)?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .authorized(self.client.post(&created.upload_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Upstream {
                message: format!("failed to upload file content: {e}"),
            })?;
        check_status(response, "file content upload").await?;

        info!(
            upload_id = %created.id,
            original_name = %original_name,
            size = file.bytes.len(),
            "Attachment uploaded to remote store"
        );

        Ok(AttachmentRef::Remote {
            upload_handle: created.id,
            original_name,
            size_bytes: file.bytes.len() as u64,
        })
    }

    async fn resolve(&self, reference: &AttachmentRef) -> Result<ResolvedAttachment> {
        let AttachmentRef::Remote {
            upload_handle,
            original_name,
            ..
        } = reference
        else {
            return Err(Error::NotFound {
                what: "attachment stored by another backend".to_string(),
            });
        };

        let what = format!("file upload {upload_handle}");
        let response = self
            .authorized(self.client.get(self.upload_url(upload_handle)))
            .send()
            .await
            .map_err(|e| Error::Upstream {
                message: format!("failed to retrieve {what}: {e}"),
            })?;
        let status: UploadStatusResponse = check_status(response, &what).await?.json().await?;

        let filename = status.filename.unwrap_or_else(|| original_name.clone());
        let not_ready = ResolvedAttachment {
            ready: false,
            url: None,
            filename: filename.clone(),
            expiry: None,
        };

        match status.status.as_str() {
            "uploaded" => {
                let Some(url) = status.url else {
                    return Ok(not_ready);
                };
                // A URL that has already lapsed is as good as none
                if status.expiry_time.is_some_and(|expiry| expiry <= Utc::now()) {
                    return Ok(not_ready);
                }
                Ok(ResolvedAttachment {
                    ready: true,
                    url: Some(url),
                    filename,
                    expiry: status.expiry_time,
                })
            }
            "pending" => Ok(not_ready),
            other => {
                warn!(upload_id = %upload_handle, status = other, "Remote upload unavailable");
                Err(Error::NotFound { what })
            }
        }
    }

    async fn delete(&self, reference: &AttachmentRef) -> bool {
        let AttachmentRef::Remote { upload_handle, .. } = reference else {
            warn!("Refusing to delete an attachment stored by another backend");
            return false;
        };

        let result = self
            .authorized(self.client.delete(self.upload_url(upload_handle)))
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!(upload_id = %upload_handle, "Remote attachment deleted");
                true
            }
            Ok(response) => {
                warn!(
                    upload_id = %upload_handle,
                    status = %response.status(),
                    "Remote attachment delete rejected, leaving orphan"
                );
                false
            }
            Err(e) => {
                warn!(upload_id = %upload_handle, error = %e, "Remote attachment delete failed, leaving orphan");
                false
            }
        }
    }
}
