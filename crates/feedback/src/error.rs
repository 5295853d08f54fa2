use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedbackError>;

#[derive(Error, Debug)]
pub enum FeedbackError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("store lock {path}: {message}")]
    Lock { path: String, message: String },

    #[error("unknown decision '{0}'")]
    UnknownDecision(String),

    #[error("invalid feedback: {0}")]
    InvalidFeedback(String),
}
