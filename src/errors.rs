use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{message}")]
    Validation { message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid access code")]
    InvalidAccessCode,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Attachment {filename} is still being processed")]
    AttachmentPending { filename: String },

    #[error("Upstream error: {message}")]
    Upstream { message: String },

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Invalid file type: {detected}")]
    InvalidFileType { detected: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Builds a [`Error::Validation`] from anything string-like.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether the message can be shown to the client verbatim.
    ///
    /// Internal failures (database, I/O, upstream) are logged server-side and
    /// replaced with a generic message so internals never leak.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::InvalidCredentials
                | Self::InvalidAccessCode
                | Self::Unauthorized { .. }
                | Self::NotFound { .. }
                | Self::AttachmentPending { .. }
                | Self::FileTooLarge { .. }
                | Self::InvalidFileType { .. }
        )
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
