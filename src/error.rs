// Error taxonomy for the core: every fallible library operation returns
// `Result<T, CoreError>`. Boundary code (CLI, daemon glue) wraps this in
// `anyhow::Result` and adds `.context(...)`.

use thiserror::Error;

/// The single error type returned by fallible library operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("malformed block: {0}")]
    ParseFailure(String),

    #[error("decryption failed")]
    Decryption,

    #[error("replay check failed for block received within the replay window")]
    ReplayAttack,

    #[error("invalid public key: {0}")]
    InvalidPubkey(String),

    #[error("no such key: {0}")]
    KeyNotKnown(String),

    #[error("key already exists: {0}")]
    KeyExists(String),

    #[error("no data available for hash {0}")]
    NoDataAvailable(String),

    #[error("network startup failed: {0}")]
    NetworkStartup(String),

    #[error("contact has been deleted: {0}")]
    ContactDeleted(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
