//! HTTP request and response values exchanged with a transport.
//!
//! # Design
//! Requests and responses are plain data. `ODataClient` builds an
//! `HttpRequest`, a `Transport` turns it into an `HttpResponse`, and the
//! client checks the status against the per-verb policy. Callers that do
//! their own I/O can use the same values through the `build_*` / `parse_*`
//! methods without a transport at all.
//!
//! Header names are stored as given; lookups are case-insensitive.

use std::fmt;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const IF_MATCH: &str = "If-Match";
pub const AUTHORIZATION: &str = "Authorization";
pub const APPLICATION_JSON: &str = "application/json";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered header list. Duplicate names are allowed, as on the wire.
pub type Headers = Vec<(String, String)>;

/// An outbound call described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Set `name` to `value`, replacing any existing values for `name`.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A response as returned by a transport.
///
/// The body is kept as raw bytes; nothing assumes it is UTF-8.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Status line text such as `404 Not Found`.
    pub fn status_text(&self) -> String {
        status_text(self.status)
    }
}

fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Human-readable status text for `status`, e.g. `204 No Content`.
///
/// Codes without a registered reason phrase render as the bare number.
pub fn status_text(status: u16) -> String {
    match ::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
    {
        Some(reason) => format!("{status} {reason}"),
        None => status.to_string(),
    }
}
