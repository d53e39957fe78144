//! Error types for the OData client.
//!
//! # Design
//! A rejected status keeps the numeric code, the status text and the raw
//! body so callers can log the server's OData error payload. Connection
//! resets during DELETE are retried inside the client and only surface as
//! `RetriesExhausted` once the retry budget is spent.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors returned by `ODataClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request payload could not be encoded as JSON. Raised before any
    /// network call is attempted.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A response body could not be decoded into the requested type.
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// The transport failed to complete the round trip.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a status outside the verb's accepted set.
    /// `body` is the response body decoded lossily as UTF-8.
    #[error("{status_text}")]
    UnexpectedStatus {
        status: u16,
        status_text: String,
        body: String,
    },

    /// Every DELETE attempt ended in a connection reset.
    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// Client configuration is missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Status code of an `UnexpectedStatus` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
