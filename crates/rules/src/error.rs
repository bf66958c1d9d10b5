//! Rules error types.
//!
//! Authorization decisions are never errors; these cover loading and
//! validating rules, suites and request fixtures.

use thiserror::Error;

/// Rules errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The ruleset is internally inconsistent.
    #[error("invalid rules: {0}")]
    Invalid(String),

    /// Failed to parse a rules or suite file.
    #[error("failed to parse rules: {0}")]
    Parse(String),

    /// Failed to write rules back out as TOML.
    #[error("failed to serialize rules: {0}")]
    Serialize(String),

    /// A request fixture could not be decoded.
    #[error("invalid request: {0}")]
    Request(#[from] serde_json::Error),

    /// An operation name was not recognised.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// An I/O error occurred while reading rules.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
