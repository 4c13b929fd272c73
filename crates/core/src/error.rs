//! Error types shared by the folder contract and the transfer core
//!
//! Backend-specific failures are translated into these kinds at the adapter
//! boundary, so retry decisions never need backend knowledge.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds observable through the folder contract.
#[derive(Debug, Error)]
pub enum Error {
    /// The named object does not exist. Distinguished so callers can branch
    /// on it; `exists` maps it to `false` and listings map it to empty.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A single transfer or metadata call failed for a retryable reason
    /// (network blip, throttling, 5xx-class response).
    #[error("{backend}: transient failure: {message}")]
    Transient {
        backend: &'static str,
        message: String,
    },

    /// A permanent rejection (bad credentials, malformed request). Retrying
    /// cannot help, so the retrier stops immediately.
    #[error("{backend}: request rejected: {message}")]
    Permanent {
        backend: &'static str,
        message: String,
    },

    /// The caller-supplied input stream failed to produce bytes. Never
    /// retried; a broken local source cannot be repaired remotely.
    #[error("unable to read source data for '{name}' (chunk {chunk})")]
    LocalSource {
        name: String,
        chunk: usize,
        #[source]
        source: std::io::Error,
    },

    /// The attempt budget ran out; wraps the last underlying failure.
    #[error("retry limit has been exceeded, total attempts: {attempts}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// The operation's cancellation signal fired before completion.
    #[error("operation cancelled before completion")]
    Cancelled,

    /// A setting was missing or failed to parse. Raised at folder
    /// construction, before any network activity.
    #[error("invalid setting '{key}': {message}")]
    Config { key: String, message: String },
}

impl Error {
    pub fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound(path.into())
    }

    pub fn transient(backend: &'static str, message: impl Into<String>) -> Self {
        Error::Transient {
            backend,
            message: message.into(),
        }
    }

    pub fn permanent(backend: &'static str, message: impl Into<String>) -> Self {
        Error::Permanent {
            backend,
            message: message.into(),
        }
    }

    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether the retrier may attempt the failed operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
