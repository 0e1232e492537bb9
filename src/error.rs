// Mediarr Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediarrError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Job already pending: {0}")]
    JobAlreadyPending(String),

    #[error("Unsupported entity: {0}")]
    UnsupportedEntity(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for MediarrError {
    fn from(err: anyhow::Error) -> Self {
        MediarrError::Other(err.to_string())
    }
}

impl MediarrError {
    /// True when the error is the absence of a keyed row, as opposed to a
    /// real failure. Loops treat this as "skip", everything else bubbles.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MediarrError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, MediarrError>;
