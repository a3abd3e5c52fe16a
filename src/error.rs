//! Error types for provisioning operations.
//!
//! Every remote failure carries the resource kind and name it happened on so the
//! caller can see where the dependency chain stopped. A missing resource is not
//! an error: clients return `Ok(None)` for it.

use crate::models::ResourceKind;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reconciling a topology.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid local configuration. Raised before any remote call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The management API rejected the initial request.
    #[error("{kind} '{name}' request rejected: {message}")]
    Submission {
        /// Kind of resource the request targeted.
        kind: ResourceKind,
        /// Resource name.
        name: String,
        /// Error reported by the remote side.
        message: String,
    },

    /// The long-running operation was accepted but ended in a failed state.
    #[error("{kind} '{name}' operation failed: {message}")]
    OperationFailed {
        /// Kind of resource the operation targeted.
        kind: ResourceKind,
        /// Resource name.
        name: String,
        /// Failure reported by the remote side.
        message: String,
    },

    /// The long-running operation did not reach a terminal state in time.
    #[error("{kind} '{name}' did not complete within {waited:?}")]
    Timeout {
        /// Kind of resource the operation targeted.
        kind: ResourceKind,
        /// Resource name.
        name: String,
        /// How long the poll loop waited.
        waited: Duration,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A response or file could not be decoded.
    #[error("Parse error at '{path}': {message}")]
    Parse {
        /// JSON path of the offending field.
        path: String,
        /// Decoder message.
        message: String,
    },

    /// YAML decoding error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Token acquisition failed.
    #[error("Credential error: {0}")]
    Credential(String),
}

impl Error {
    pub(crate) fn submission(kind: ResourceKind, name: &str, message: impl Into<String>) -> Self {
        Error::Submission {
            kind,
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Attach the resource to errors that do not name one yet.
    ///
    /// Transport, credential and parse failures while talking to the remote side
    /// become [`Error::Submission`] for `kind`/`name`; other variants pass through.
    pub fn for_resource(self, kind: ResourceKind, name: &str) -> Self {
        match self {
            Error::Transport(_) | Error::Credential(_) | Error::Parse { .. } => {
                Error::submission(kind, name, self.to_string())
            }
            other => other,
        }
    }

    pub(crate) fn operation_failed(
        kind: ResourceKind,
        name: &str,
        message: impl Into<String>,
    ) -> Self {
        Error::OperationFailed {
            kind,
            name: name.to_string(),
            message: message.into(),
        }
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for Error {
    fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
        Error::Parse {
            path: e.path().to_string(),
            message: e.into_inner().to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse {
            path: ".".to_string(),
            message: e.to_string(),
        }
    }
}

impl From<azure_core::Error> for Error {
    fn from(e: azure_core::Error) -> Self {
        Error::Credential(e.to_string())
    }
}

/// Decode a JSON value into `T`, reporting the failing path.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    Ok(serde_path_to_error::deserialize(value)?)
}

/// Decode JSON text into `T`, reporting the failing path.
pub(crate) fn decode_str<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    Ok(serde_path_to_error::deserialize(&mut deserializer)?)
}
