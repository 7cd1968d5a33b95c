//! Error type for failures reported by the broker.

use thiserror::Error;

/// An error reported by the broker client inside an event.
///
/// Events are plain data, so the error is stored as its rendered message plus
/// the broker's error code name when one is known. Client implementations
/// convert their native error type into this one at the boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BrokerError {
    /// Broker error code name (e.g. `"BrokerTransportFailure"`), if known
    pub code: Option<String>,
    /// Human readable description
    pub message: String,
}

impl BrokerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}
