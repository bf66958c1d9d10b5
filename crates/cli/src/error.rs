//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The audit database does not exist.
    ///
    /// This typically means no request has been checked yet.
    #[error("audit database not found at {path}. Run 'sierra-rules check' first")]
    AuditNotFound { path: PathBuf },

    /// One or more scenarios did not produce the expected decision.
    #[error("{failed} of {total} scenarios failed")]
    SuiteFailed { failed: usize, total: usize },

    /// Configuration is invalid or missing required fields.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An error occurred loading rules, suites or requests.
    #[error(transparent)]
    Rules(#[from] rules::Error),

    /// An error occurred in the audit layer.
    #[error(transparent)]
    Audit(#[from] audit::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
