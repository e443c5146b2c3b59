use std::path::PathBuf;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so every handler can
/// turn a failure into a single reply line without knowing where it came from.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Upstream generation service failure. Displayed verbatim.
    #[error("{0}")]
    Service(String),

    #[error("history store error: {0}")]
    Store(String),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Substring the OpenAI API puts in its message when a key has run out of credit.
pub const QUOTA_SIGNATURE: &str = "You exceeded your current quota";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// The credential in use has no allowance left; an operator should rotate it.
    Quota,
    Generic,
}

/// Classify an error message coming back from the generation service.
pub fn classify_error(text: &str) -> ErrorClass {
    if text.contains(QUOTA_SIGNATURE) {
        ErrorClass::Quota
    } else {
        ErrorClass::Generic
    }
}
