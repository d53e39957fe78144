//! Credentials and how they are attached to outgoing requests.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::ApiError;
use crate::http::{HttpRequest, AUTHORIZATION};

/// Username and password for the service.
///
/// The password is wrapped in a `SecretString` and never shows up in
/// `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// `Basic <base64(username:password)>` header value.
    pub fn basic_header_value(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password.expose_secret());
        format!("Basic {}", STANDARD.encode(raw))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// How credentials are presented to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization: Basic ...` on every request.
    #[default]
    Basic,
    /// Challenge-response handshake, completed by the transport.
    Ntlm,
}

impl FromStr for AuthScheme {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(AuthScheme::Basic),
            "ntlm" => Ok(AuthScheme::Ntlm),
            other => Err(ApiError::Config(format!("unknown auth scheme: {other}"))),
        }
    }
}

/// Inject Basic credentials into `request`.
///
/// NTLM requests are left untouched: the handshake owns the
/// `Authorization` header and is carried out by the transport.
pub(crate) fn apply(request: &mut HttpRequest, scheme: AuthScheme, credentials: &Credentials) {
    if scheme == AuthScheme::Basic {
        request.set_header(AUTHORIZATION, credentials.basic_header_value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;

    #[test]
    fn basic_header_is_base64_of_user_colon_password() {
        let creds = Credentials::new("Aladdin", "open sesame");
        assert_eq!(creds.basic_header_value(), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::new("app", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("app"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn ntlm_leaves_authorization_to_transport() {
        let creds = Credentials::new("app", "secret");
        let mut req = HttpRequest::new(HttpMethod::Get, "http://host/Entities");
        apply(&mut req, AuthScheme::Ntlm, &creds);
        assert!(req.header(AUTHORIZATION).is_none());

        apply(&mut req, AuthScheme::Basic, &creds);
        assert!(req.header(AUTHORIZATION).unwrap().starts_with("Basic "));
    }

    #[test]
    fn scheme_parses_case_insensitively() {
        assert_eq!("NTLM".parse::<AuthScheme>().unwrap(), AuthScheme::Ntlm);
        assert_eq!(" basic ".parse::<AuthScheme>().unwrap(), AuthScheme::Basic);
        assert!(matches!("digest".parse::<AuthScheme>(), Err(ApiError::Config(_))));
    }
}
