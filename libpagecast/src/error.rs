//! Error types for Pagecast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PagecastError>;

#[derive(Error, Debug)]
pub enum PagecastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl PagecastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PagecastError::InvalidInput(_) | PagecastError::NotFound(_) => 3,
            PagecastError::Config(_) | PagecastError::Database(_) => 2,
            PagecastError::Publish(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

/// Failures inside a single publish attempt.
///
/// The orchestrator never lets these escape: they are flattened into
/// `PublishOutcome::Failed` with the `Display` text as the stored reason.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Platform rejected request (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Upload of image {position} of {total} failed: {source}")]
    PartialUpload {
        position: usize,
        total: usize,
        #[source]
        source: Box<PublishError>,
    },
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PublishError::Transport(format!("request timed out: {}", err))
        } else if err.is_decode() {
            PublishError::MalformedResponse(err.to_string())
        } else {
            PublishError::Transport(err.to_string())
        }
    }
}
