use thiserror::Error;

#[derive(Error, Debug)]
pub enum VantageError {
    /// Caller contract violation: operating on a session that does not exist.
    /// Expected runtime failures degrade through fallbacks instead; this
    /// variant indicates a bug at the call site.
    #[error("Sneak session not found: {0}")]
    SessionNotFound(crate::core::types::SessionId),

    #[error("Token not found: {0}")]
    TokenNotFound(crate::core::types::TokenId),

    #[error("Visibility calculation failed: {0}")]
    VisibilityCalculation(String),

    #[error("Cover detection failed: {0}")]
    CoverDetection(String),

    #[error("Batch validation failed: {0:?}")]
    BatchValidation(Vec<String>),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VantageError>;
