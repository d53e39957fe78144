//! Verify build/parse methods against the JSON vectors in `test-vectors/`.
//!
//! Each case names a verb, a target URL and an optional payload, the headers
//! the built request must carry, a simulated response, and the expected
//! outcome. Bodies are compared as parsed JSON so field order does not
//! matter.

use odata_core::{
    ApiError, ClientConfig, Credentials, HttpMethod, HttpRequest, HttpResponse, ODataClient, ODataResponse,
    StatusOutcome,
};
use serde_json::Value;

/// Transport that is never called; vectors only exercise build/parse.
struct NoTransport;

impl odata_core::Transport for NoTransport {
    fn execute(&self, _: &HttpRequest) -> Result<HttpResponse, odata_core::TransportError> {
        panic!("vectors do not perform I/O")
    }
}

fn load() -> (ODataClient<NoTransport>, Vec<Value>) {
    let raw = include_str!("../../test-vectors/dispatch.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let creds = &vectors["credentials"];
    let config = ClientConfig::new(vectors["base_url"].as_str().unwrap()).with_credentials(Credentials::new(
        creds["username"].as_str().unwrap(),
        creds["password"].as_str().unwrap(),
    ));
    let client = ODataClient::with_transport(config, NoTransport);
    (client, vectors["cases"].as_array().unwrap().clone())
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PATCH" => HttpMethod::Patch,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn expected_headers(case: &Value) -> Vec<(String, String)> {
    case["expected_request"]["headers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let pair = h.as_array().unwrap();
            (pair[0].as_str().unwrap().to_string(), pair[1].as_str().unwrap().to_string())
        })
        .collect()
}

fn simulated_response(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: Vec::new(),
        body: sim["body"].as_str().unwrap().as_bytes().to_vec(),
    }
}

fn text(body: Vec<u8>) -> Value {
    Value::String(String::from_utf8(body).unwrap())
}

fn build(client: &ODataClient<NoTransport>, method: HttpMethod, url: &str, payload: &Value) -> HttpRequest {
    match method {
        HttpMethod::Get => client.build_get(url),
        HttpMethod::Post => client.build_post(url, payload).unwrap(),
        HttpMethod::Patch => client.build_patch(url, payload).unwrap(),
        HttpMethod::Put => client.build_put(url, payload).unwrap(),
        HttpMethod::Delete => client.build_delete(url),
    }
}

#[test]
fn dispatch_test_vectors() {
    let (client, cases) = load();
    assert!(!cases.is_empty());

    for case in &cases {
        let name = case["name"].as_str().unwrap();
        let method = parse_method(case["method"].as_str().unwrap());
        let url = case["url"].as_str().unwrap();
        let payload = &case["payload"];

        // Verify build
        let req = build(&client, method, url, payload);
        assert_eq!(req.method, method, "{name}: method");
        assert_eq!(req.url, url, "{name}: url");
        assert_eq!(req.headers, expected_headers(case), "{name}: headers");
        match req.body.as_deref() {
            Some(body) => {
                let sent: Value = serde_json::from_str(body).unwrap();
                assert_eq!(&sent, payload, "{name}: body");
            }
            None => assert!(payload.is_null(), "{name}: body should be present"),
        }

        // Verify parse
        let response = simulated_response(case);
        let result: Result<Value, ApiError> = match method {
            HttpMethod::Get => client.parse_get(response).map(|(body, _)| {
                let envelope: ODataResponse = ODataResponse::from_json(&body).unwrap();
                envelope.value
            }),
            HttpMethod::Post => client.parse_post(response).map(text),
            HttpMethod::Patch => client.parse_patch(response).map(text),
            HttpMethod::Put => client.parse_put(response).map(text),
            HttpMethod::Delete => client.parse_delete(response).map(|outcome| match outcome {
                StatusOutcome::Accepted => Value::from("Accepted"),
                StatusOutcome::Absent => Value::from("Absent"),
                StatusOutcome::Rejected => Value::from("Rejected"),
            }),
        };

        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            assert!(matches!(err, ApiError::UnexpectedStatus { .. }), "{name}: {err:?}");
            assert_eq!(err.to_string(), expected_error.as_str().unwrap(), "{name}: status text");
            continue;
        }

        let got = result.unwrap_or_else(|e| panic!("{name}: unexpected error {e}"));
        if let Some(value) = case.get("expected_value") {
            assert_eq!(&got, value, "{name}: envelope value");
        } else if let Some(body) = case.get("expected_body") {
            assert_eq!(&got, body, "{name}: body");
        } else if let Some(outcome) = case.get("expected_outcome") {
            assert_eq!(&got, outcome, "{name}: delete outcome");
        } else {
            panic!("{name}: case has no expectation");
        }
    }
}
