//! Client configuration.
//!
//! A `ClientConfig` is assembled once and consumed by `ODataClient::new`.
//! It can be built in code or read from `ODATA_*` environment variables.

use std::env;
use std::time::Duration;

use crate::auth::{AuthScheme, Credentials};
use crate::error::ApiError;
use crate::http::Headers;
use crate::retry::RetryPolicy;

pub const ENV_BASE_URL: &str = "ODATA_BASE_URL";
pub const ENV_USERNAME: &str = "ODATA_USERNAME";
pub const ENV_PASSWORD: &str = "ODATA_PASSWORD";
pub const ENV_AUTH_SCHEME: &str = "ODATA_AUTH_SCHEME";
pub const ENV_INSECURE_TLS: &str = "ODATA_INSECURE_TLS";
pub const ENV_TIMEOUT_SECS: &str = "ODATA_TIMEOUT_SECS";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub credentials: Option<Credentials>,
    pub auth_scheme: AuthScheme,
    /// Sent on GET requests in place of the defaults when set.
    pub headers: Option<Headers>,
    pub verify_tls: bool,
    pub timeout: Option<Duration>,
    pub delete_retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: None,
            auth_scheme: AuthScheme::Basic,
            headers: None,
            verify_tls: true,
            timeout: None,
            delete_retry: RetryPolicy::default(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_auth_scheme(mut self, scheme: AuthScheme) -> Self {
        self.auth_scheme = scheme;
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Accept any server certificate. Intended for on-premise servers with
    /// self-signed certificates.
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_delete_retry(mut self, policy: RetryPolicy) -> Self {
        self.delete_retry = policy;
        self
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its
    /// value. `from_env` is this with `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let base_url = lookup(ENV_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ApiError::Config(format!("{ENV_BASE_URL} is not set")))?;
        let mut config = Self::new(base_url);

        match (lookup(ENV_USERNAME), lookup(ENV_PASSWORD)) {
            (Some(user), Some(password)) => {
                config.credentials = Some(Credentials::new(user, password));
            }
            (Some(_), None) => {
                return Err(ApiError::Config(format!(
                    "{ENV_USERNAME} is set but {ENV_PASSWORD} is not"
                )));
            }
            (None, Some(_)) => {
                return Err(ApiError::Config(format!(
                    "{ENV_PASSWORD} is set but {ENV_USERNAME} is not"
                )));
            }
            (None, None) => {}
        }

        if let Some(scheme) = lookup(ENV_AUTH_SCHEME) {
            config.auth_scheme = scheme.parse()?;
        }
        if let Some(flag) = lookup(ENV_INSECURE_TLS) {
            config.verify_tls = !parse_bool(ENV_INSECURE_TLS, &flag)?;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| ApiError::Config(format!("{ENV_TIMEOUT_SECS} is not a number: {secs}")))?;
            config.timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(ApiError::Config(format!("{key} is not a boolean: {other}"))),
    }
}
