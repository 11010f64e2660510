use thiserror::Error;

/// Failures of the retrieval collaborators (catalog and detail fetchers).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP client error: {0}")]
    Http(reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid catalog payload: {0}")]
    Decode(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Browser session already closed")]
    SessionClosed,

    #[error("Invalid listing URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("No catalog endpoint configured for source group '{0}'")]
    UnknownSourceGroup(String),
}

impl FetchError {
    /// Transient failures that a later attempt may not hit again.
    pub fn is_retriable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Network(_) | FetchError::Browser(_) => true,
            FetchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::Decode(_)
            | FetchError::SessionClosed
            | FetchError::InvalidUrl { .. }
            | FetchError::UnknownSourceGroup(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Http(err)
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook responded with status {status}")]
    Status { status: u16 },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Snapshot store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Missing required collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
