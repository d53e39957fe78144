//! The OData response envelope.
//!
//! # Design
//! The client returns raw bodies; decoding into `ODataResponse` is left to
//! the caller (or the `get_json` / `pages` helpers). `value` defaults to an
//! untyped `serde_json::Value` so unknown entity shapes still decode.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// `{"@odata.context": ..., "value": ..., "@odata.nextLink": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ODataResponse<T = serde_json::Value> {
    #[serde(rename = "@odata.context", default)]
    pub context: String,
    pub value: T,
    #[serde(
        rename = "@odata.nextLink",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub next_link: Option<String>,
}

impl<T: DeserializeOwned> ODataResponse<T> {
    /// Decode a response body, given as text or raw bytes.
    pub fn from_json(body: impl AsRef<[u8]>) -> Result<Self, ApiError> {
        serde_json::from_slice(body.as_ref()).map_err(ApiError::Deserialization)
    }
}
