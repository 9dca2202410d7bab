//! Error taxonomy shared by the scheduler, engines, storage and the HTTP boundary.

use thiserror::Error;

/// Errors surfaced by the core. Validation and not-found errors are turned into
/// client-facing responses at the boundary; engine and storage errors end up as
/// terminal task state or log lines.
#[derive(Debug, Error)]
pub enum TdmError {
    /// Malformed or missing locator / task id.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The transfer engine refused to begin a transfer.
    #[error(transparent)]
    EngineStart(#[from] EngineStartError),

    /// The transfer engine reported failure mid-transfer.
    #[error("transfer failed: {0}")]
    EngineRuntime(String),

    /// Artifact read/delete failure.
    #[error("storage error on {name}: {source}")]
    Storage {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Unknown task id or artifact name.
    #[error("not found: {0}")]
    NotFound(String),
}

impl TdmError {
    pub fn storage(name: impl Into<String>, source: std::io::Error) -> Self {
        TdmError::Storage {
            name: name.into(),
            source,
        }
    }
}

/// Returned by `TransferEngine::start` when the locator is malformed or the
/// engine rejects it outright.
#[derive(Debug, Error)]
pub enum EngineStartError {
    #[error("malformed locator: {0}")]
    Malformed(String),

    #[error("engine rejected locator: {0}")]
    Rejected(String),

    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T, E = TdmError> = std::result::Result<T, E>;
