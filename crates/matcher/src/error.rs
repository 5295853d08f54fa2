use thiserror::Error;

pub type Result<T> = std::result::Result<T, MatcherError>;

#[derive(Error, Debug)]
pub enum MatcherError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Rule table parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid rule table: {0}")]
    InvalidTable(String),

    #[error("Invalid rule {path}: {message}")]
    InvalidRule { path: String, message: String },
}
