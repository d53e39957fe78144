//! Blocking client core for OData REST services.
//!
//! # Overview
//! `ODataClient` issues GET/POST/PATCH/PUT/DELETE calls against an OData
//! endpoint with Basic or NTLM authentication, JSON bodies and a per-verb
//! status policy. Requests are plain `HttpRequest` values executed by a
//! pluggable `Transport`; `UreqTransport` is the default.
//!
//! # Design
//! - The client is immutable after construction; calls share nothing.
//! - Credentials are applied in one place for every verb.
//! - Accepted status codes live in a single table (`policy`).
//! - DELETE retries connection resets under a bounded `RetryPolicy` and
//!   treats 404 as "already gone".
//! - Response bodies are returned raw; `ODataResponse` decodes the
//!   `@odata.context` / `value` / `@odata.nextLink` envelope on request.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod paging;
pub mod policy;
pub mod retry;
pub mod transport;
pub mod types;

pub use auth::{AuthScheme, Credentials};
pub use client::ODataClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use crate::http::{Headers, HttpMethod, HttpRequest, HttpResponse};
pub use paging::Pages;
pub use policy::StatusOutcome;
pub use retry::RetryPolicy;
pub use transport::{Transport, TransportError, TransportErrorKind, UreqTransport};
pub use types::ODataResponse;
