//! Verb dispatcher for an OData service.
//!
//! # Design
//! `ODataClient` holds the base URL, credentials, optional GET header
//! override, DELETE retry policy and a `Transport`. None of it changes after
//! construction, so every operation takes `&self` and calls are independent.
//!
//! Each verb is split the same way:
//! - `build_*` produces an `HttpRequest` with the verb's headers and the
//!   credentials already applied,
//! - `parse_*` checks an `HttpResponse` against the per-verb status policy,
//! - the plain verb method (`get`, `post`, ...) runs both around one
//!   transport round trip.
//!
//! Callers that execute requests themselves can use `build_*` / `parse_*`
//! and skip the transport entirely.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use crate::auth::{self, AuthScheme, Credentials};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{Headers, HttpMethod, HttpRequest, HttpResponse, APPLICATION_JSON, CONTENT_TYPE, IF_MATCH};
use crate::paging::Pages;
use crate::policy::{self, StatusOutcome};
use crate::retry::RetryPolicy;
use crate::transport::{Transport, TransportError, UreqTransport};
use crate::types::ODataResponse;

#[derive(Debug, Clone)]
pub struct ODataClient<T = UreqTransport> {
    base_url: String,
    credentials: Option<Credentials>,
    auth_scheme: AuthScheme,
    headers: Option<Headers>,
    delete_retry: RetryPolicy,
    transport: T,
}

impl ODataClient<UreqTransport> {
    /// Client over a `UreqTransport` configured from `config`.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::from_config(&config);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> ODataClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            base_url: config.base_url,
            credentials: config.credentials,
            auth_scheme: config.auth_scheme,
            headers: config.headers,
            delete_retry: config.delete_retry,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `resource` appended to the base URL with a single `/` between them.
    pub fn url_for(&self, resource: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            resource.trim_start_matches('/')
        )
    }

    // -----------------------------------------------------------------------
    // Request building
    // -----------------------------------------------------------------------

    pub fn build_get(&self, url: &str) -> HttpRequest {
        let mut request = HttpRequest::new(HttpMethod::Get, url);
        if let Some(headers) = &self.headers {
            request.headers = headers.clone();
        }
        self.authorize(request)
    }

    pub fn build_post<P: Serialize + ?Sized>(&self, url: &str, payload: &P) -> Result<HttpRequest, ApiError> {
        self.build_json(HttpMethod::Post, url, payload)
    }

    /// POST with an already encoded JSON body.
    pub fn build_post_raw(&self, url: &str, body: &str) -> HttpRequest {
        self.authorize(json_request(HttpMethod::Post, url, body.to_string()))
    }

    /// PATCH carries `If-Match: *`, so the update applies whatever the
    /// entity's current ETag is.
    pub fn build_patch<P: Serialize + ?Sized>(&self, url: &str, payload: &P) -> Result<HttpRequest, ApiError> {
        self.build_json(HttpMethod::Patch, url, payload)
    }

    pub fn build_put<P: Serialize + ?Sized>(&self, url: &str, payload: &P) -> Result<HttpRequest, ApiError> {
        self.build_json(HttpMethod::Put, url, payload)
    }

    pub fn build_delete(&self, url: &str) -> HttpRequest {
        let mut request = HttpRequest::new(HttpMethod::Delete, url);
        request.set_header(IF_MATCH, "*");
        self.authorize(request)
    }

    fn build_json<P: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        url: &str,
        payload: &P,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(payload).map_err(ApiError::Serialization)?;
        let mut request = json_request(method, url, body);
        if method == HttpMethod::Patch {
            request.set_header(IF_MATCH, "*");
        }
        Ok(self.authorize(request))
    }

    /// Apply the configured credentials. Every builder ends here.
    fn authorize(&self, mut request: HttpRequest) -> HttpRequest {
        if let Some(credentials) = &self.credentials {
            auth::apply(&mut request, self.auth_scheme, credentials);
        }
        request
    }

    // -----------------------------------------------------------------------
    // Response parsing
    // -----------------------------------------------------------------------

    /// Raw body and headers of a 200 response.
    pub fn parse_get(&self, response: HttpResponse) -> Result<(Vec<u8>, Headers), ApiError> {
        let response = check_status(HttpMethod::Get, response)?;
        Ok((response.body, response.headers))
    }

    pub fn parse_post(&self, response: HttpResponse) -> Result<Vec<u8>, ApiError> {
        check_status(HttpMethod::Post, response).map(|r| r.body)
    }

    pub fn parse_patch(&self, response: HttpResponse) -> Result<Vec<u8>, ApiError> {
        check_status(HttpMethod::Patch, response).map(|r| r.body)
    }

    pub fn parse_put(&self, response: HttpResponse) -> Result<Vec<u8>, ApiError> {
        check_status(HttpMethod::Put, response).map(|r| r.body)
    }

    /// `Accepted` for 204, `Absent` for 404, an error for anything else.
    pub fn parse_delete(&self, response: HttpResponse) -> Result<StatusOutcome, ApiError> {
        match policy::classify(HttpMethod::Delete, response.status) {
            StatusOutcome::Rejected => Err(unexpected_status(&response)),
            outcome => Ok(outcome),
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// GET `url`; succeeds only on 200.
    pub fn get(&self, url: &str) -> Result<(Vec<u8>, Headers), ApiError> {
        let response = self.send(&self.build_get(url))?;
        self.parse_get(response)
    }

    /// GET a resource relative to the base URL.
    pub fn get_path(&self, resource: &str) -> Result<(Vec<u8>, Headers), ApiError> {
        self.get(&self.url_for(resource))
    }

    /// GET the base URL itself.
    pub fn get_base(&self) -> Result<(Vec<u8>, Headers), ApiError> {
        self.get(&self.base_url)
    }

    /// GET `url` and decode the body as an OData envelope.
    pub fn get_json<V: DeserializeOwned>(&self, url: &str) -> Result<ODataResponse<V>, ApiError> {
        let (body, _) = self.get(url)?;
        ODataResponse::from_json(&body)
    }

    /// Iterate over every page of a collection, following `@odata.nextLink`.
    pub fn pages<V: DeserializeOwned>(&self, url: &str) -> Pages<'_, T, V> {
        Pages::new(self, url)
    }

    pub fn post<P: Serialize + ?Sized>(&self, url: &str, payload: &P) -> Result<Vec<u8>, ApiError> {
        let response = self.send(&self.build_post(url, payload)?)?;
        self.parse_post(response)
    }

    /// POST to the base URL.
    pub fn post_base<P: Serialize + ?Sized>(&self, payload: &P) -> Result<Vec<u8>, ApiError> {
        self.post(&self.base_url, payload)
    }

    pub fn post_raw(&self, url: &str, body: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.send(&self.build_post_raw(url, body))?;
        self.parse_post(response)
    }

    pub fn patch<P: Serialize + ?Sized>(&self, url: &str, payload: &P) -> Result<Vec<u8>, ApiError> {
        let response = self.send(&self.build_patch(url, payload)?)?;
        self.parse_patch(response)
    }

    /// PATCH the base URL.
    pub fn patch_base<P: Serialize + ?Sized>(&self, payload: &P) -> Result<Vec<u8>, ApiError> {
        self.patch(&self.base_url, payload)
    }

    pub fn put<P: Serialize + ?Sized>(&self, url: &str, payload: &P) -> Result<Vec<u8>, ApiError> {
        let response = self.send(&self.build_put(url, payload)?)?;
        self.parse_put(response)
    }

    /// DELETE `url`. Returns `true` when the entity was removed or was
    /// already absent (404).
    ///
    /// Connection resets are retried according to the configured
    /// `RetryPolicy`; any other transport error fails at once.
    pub fn delete(&self, url: &str) -> Result<bool, ApiError> {
        self.delete_outcome(url).map(|_| true)
    }

    /// Like `delete`, but reports whether the entity existed.
    pub fn delete_outcome(&self, url: &str) -> Result<StatusOutcome, ApiError> {
        let request = self.build_delete(url);
        let response = self.delete_retry.run(|attempt| {
            if attempt > 1 {
                debug!(attempt, url, "re-sending DELETE");
            }
            self.execute(&request)
        })?;
        self.parse_delete(response)
    }

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        self.execute(request).map_err(ApiError::Transport)
    }

    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "dispatching request");
        let result = match (&self.credentials, self.auth_scheme) {
            (Some(credentials), AuthScheme::Ntlm) => self.transport.execute_ntlm(request, credentials),
            _ => self.transport.execute(request),
        };
        match &result {
            Ok(response) => debug!(status = response.status, "response received"),
            Err(err) => error!(method = %request.method, url = %request.url, error = %err, "transport failure"),
        }
        result
    }
}

fn json_request(method: HttpMethod, url: &str, body: String) -> HttpRequest {
    let mut request = HttpRequest::new(method, url);
    request.set_header(CONTENT_TYPE, APPLICATION_JSON);
    request.body = Some(body);
    request
}

fn check_status(method: HttpMethod, response: HttpResponse) -> Result<HttpResponse, ApiError> {
    match policy::classify(method, response.status) {
        StatusOutcome::Accepted => Ok(response),
        _ => Err(unexpected_status(&response)),
    }
}

fn unexpected_status(response: &HttpResponse) -> ApiError {
    ApiError::UnexpectedStatus {
        status: response.status,
        status_text: response.status_text(),
        body: String::from_utf8_lossy(&response.body).into_owned(),
    }
}
