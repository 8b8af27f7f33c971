//! Error types and handling for kino-core operations.
//!
//! Every fallible operation in the pipeline returns [`Result<T>`] carrying this
//! crate's [`Error`]. Failures fall into three groups:
//!
//! - **Transport**: DNS, connection, non-success status, body decoding
//!   ([`Error::Network`], [`Error::NotFound`], [`Error::InvalidUrl`])
//! - **Structure**: an expected node is missing from a listing page
//!   ([`Error::Structure`])
//! - **Ambient**: configuration, I/O, serialization and deadlines
//!
//! An unparsable rating is deliberately absent from this list: it resolves to the
//! sentinel [`Rating::UNKNOWN`](crate::Rating::UNKNOWN) and never surfaces as an error.
//!
//! ```rust
//! use kino_core::Error;
//!
//! let err = Error::Timeout("pipeline deadline of 120s elapsed".to_string());
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), "timeout");
//! ```

use thiserror::Error;

/// The main error type for kino-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed, typically while reading a configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network operation failed.
    ///
    /// Covers connection failures, TLS errors, timeouts reported by the HTTP
    /// client, non-success statuses other than 404 and body decoding failures.
    /// The underlying `reqwest::Error` is preserved.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The remote page does not exist (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// A URL could not be parsed or resolved against the site base.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A listing page is missing a node the extractor requires.
    ///
    /// `element` names the missing piece (for example `"cinema heading"` or
    /// `"title link"`), `context` locates it (the cinema name or row index).
    ///
    /// ## Common Causes
    ///
    /// - The site changed its markup
    /// - A truncated or partially rendered response
    #[error("Structure error: missing {element} ({context})")]
    Structure {
        /// Which structural node was expected.
        element: &'static str,
        /// Where in the document it was expected.
        context: String,
    },

    /// The pipeline did not finish within its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("Failed to parse config: {err}"))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl Error {
    /// Build a structural error for a missing node.
    pub fn missing(element: &'static str, context: impl Into<String>) -> Self {
        Self::Structure {
            element,
            context: context.into(),
        }
    }

    /// Check if the error might succeed on a later attempt.
    ///
    /// The pipeline itself never retries. The HTTP service answers recoverable
    /// failures with a `Retry-After` hint.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a string identifier for logs and API bodies.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::NotFound(_) => "not_found",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Structure { .. } => "structure",
            Self::Timeout(_) => "timeout",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
