//! Transports that carry an `HttpRequest` over the network.
//!
//! # Design
//! `ODataClient` never opens sockets itself. It hands fully built requests to
//! a `Transport`, which returns the raw status, headers and body. Non-2xx
//! statuses are data, not errors; status interpretation stays in the client.
//!
//! `UreqTransport` is the default blocking implementation. NTLM negotiation
//! is a transport capability: a transport that can complete the handshake
//! overrides `execute_ntlm`, the default refuses.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::auth::Credentials;
use crate::config::ClientConfig;
use crate::http::{Headers, HttpMethod, HttpRequest, HttpResponse};

/// Broad classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The peer reset the connection. The only retryable kind.
    ConnectionReset,
    /// DNS lookup or TCP connect failed.
    Connect,
    Timeout,
    /// The TLS handshake or certificate check failed.
    Tls,
    /// The transport cannot perform the requested authentication.
    Unsupported,
    Other,
}

#[derive(Debug, Clone, Error)]
#[error("transport error ({kind:?}): {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection_reset(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ConnectionReset, message)
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_connection_reset(&self) -> bool {
        self.kind == TransportErrorKind::ConnectionReset
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => TransportErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionRefused | io::ErrorKind::NotConnected => {
                TransportErrorKind::Connect
            }
            io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            _ => TransportErrorKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

/// Executes one HTTP round trip.
pub trait Transport {
    /// Send `request` as-is and return whatever the server answered.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Send `request`, completing an NTLM handshake with `credentials`.
    fn execute_ntlm(
        &self,
        request: &HttpRequest,
        credentials: &Credentials,
    ) -> Result<HttpResponse, TransportError> {
        let _ = (request, credentials);
        Err(TransportError::new(
            TransportErrorKind::Unsupported,
            "this transport cannot negotiate NTLM",
        ))
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }

    fn execute_ntlm(
        &self,
        request: &HttpRequest,
        credentials: &Credentials,
    ) -> Result<HttpResponse, TransportError> {
        (**self).execute_ntlm(request, credentials)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }

    fn execute_ntlm(
        &self,
        request: &HttpRequest,
        credentials: &Credentials,
    ) -> Result<HttpResponse, TransportError> {
        (**self).execute_ntlm(request, credentials)
    }
}

/// Blocking transport backed by a `ureq::Agent`.
///
/// Status codes are returned as data so 4xx/5xx reach the client's status
/// policy instead of surfacing as transport errors.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new(verify_tls: bool, timeout: Option<Duration>) -> Self {
        let tls = ureq::tls::TlsConfig::builder()
            .disable_verification(!verify_tls)
            .build();
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .tls_config(tls)
            .build()
            .new_agent();
        Self { agent }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.verify_tls, config.timeout)
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(true, None)
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &Headers) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

type UreqResult = Result<ureq::http::Response<ureq::Body>, ureq::Error>;

fn send_body(builder: ureq::RequestBuilder<ureq::typestate::WithBody>, body: Option<&str>) -> UreqResult {
    match body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let body = request.body.as_deref();
        let result = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), &request.headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), &request.headers).call(),
            HttpMethod::Post => send_body(with_headers(self.agent.post(url), &request.headers), body),
            HttpMethod::Patch => send_body(with_headers(self.agent.patch(url), &request.headers), body),
            HttpMethod::Put => send_body(with_headers(self.agent.put(url), &request.headers), body),
        };
        let mut response = result.map_err(map_ureq_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        // No size cap: large collection pages are returned whole.
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(map_ureq_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_ureq_error(err: ureq::Error) -> TransportError {
    let message = err.to_string();
    let kind = match err {
        ureq::Error::Io(io) => return TransportError::from(io),
        ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => TransportErrorKind::Connect,
        ureq::Error::Tls(_) | ureq::Error::Rustls(_) | ureq::Error::TlsRequired => TransportErrorKind::Tls,
        _ => TransportErrorKind::Other,
    };
    TransportError::new(kind, message)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_resets_are_classified_as_connection_reset() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
        ] {
            let err = TransportError::from(io::Error::new(kind, "boom"));
            assert!(err.is_connection_reset(), "{kind:?}");
        }
    }

    #[test]
    fn other_io_errors_are_not_retryable() {
        let refused = TransportError::from(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(refused.kind(), TransportErrorKind::Connect);
        assert!(!refused.is_connection_reset());

        let timeout = TransportError::from(io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(timeout.kind(), TransportErrorKind::Timeout);
    }

    #[test]
    fn ureq_errors_are_classified() {
        let tls = map_ureq_error(ureq::Error::Tls("certificate not trusted"));
        assert_eq!(tls.kind(), TransportErrorKind::Tls);
        assert!(!tls.is_connection_reset());

        let host = map_ureq_error(ureq::Error::HostNotFound);
        assert_eq!(host.kind(), TransportErrorKind::Connect);

        let reset = map_ureq_error(ureq::Error::Io(io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(reset.is_connection_reset());
    }

    #[test]
    fn default_execute_ntlm_is_unsupported() {
        struct Plain;
        impl Transport for Plain {
            fn execute(&self, _: &HttpRequest) -> Result<HttpResponse, TransportError> {
                unreachable!("execute_ntlm must not fall back to execute")
            }
        }

        let req = HttpRequest::new(HttpMethod::Get, "http://host/");
        let err = Plain
            .execute_ntlm(&req, &Credentials::new("u", "p"))
            .unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Unsupported);
    }
}
