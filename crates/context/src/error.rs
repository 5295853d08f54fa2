use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContextError>;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("git probe failed: {0}")]
    Git(String),

    #[error("{source_name} timed out after {after_ms}ms")]
    Timeout {
        source_name: &'static str,
        after_ms: u64,
    },

    #[error("{0} is not available")]
    Unavailable(&'static str),
}
