use thiserror::Error;

/// Top-level error type for the Veil runtime.
#[derive(Debug, Error)]
pub enum VeilError {
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("node not found: {0}")]
    NodeNotFound(usize),

    #[error("node {0} is not an element")]
    NotAnElement(usize),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid backup: {0}")]
    InvalidBackup(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VeilError {
    pub fn invalid_selector(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the Veil crates.
pub type Result<T, E = VeilError> = std::result::Result<T, E>;
