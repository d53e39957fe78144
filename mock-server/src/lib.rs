//! In-memory OData service used to exercise the client end to end.
//!
//! Serves a single entity set, `ItemCategories`, with the OData v4 URL
//! conventions the client relies on: `ItemCategories` for the collection,
//! `ItemCategories(<key>)` for one entity, server-driven paging through
//! `$skiptoken` / `@odata.nextLink`, and `If-Match` on PATCH and DELETE.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const ENTITY_SET: &str = "ItemCategories";
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCategory {
    pub id: Uuid,
    pub code: String,
    pub description: String,
}

#[derive(Deserialize)]
pub struct CreateItemCategory {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct ReplaceItemCategory {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct PatchItemCategory {
    pub code: Option<String>,
    pub description: Option<String>,
}

/// Insertion-ordered store, so paging is stable.
pub type Db = Arc<RwLock<Vec<ItemCategory>>>;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub page_size: usize,
    /// Username and password required as Basic auth, if any.
    pub credentials: Option<(String, String)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            credentials: None,
        }
    }
}

#[derive(Clone)]
struct AppState {
    db: Db,
    page_size: usize,
    expected_authorization: Option<String>,
}

/// Router with default settings and no authentication.
pub fn app() -> Router {
    app_with(ServerConfig::default())
}

pub fn app_with(config: ServerConfig) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Vec::new())),
        page_size: config.page_size.max(1),
        expected_authorization: config
            .credentials
            .map(|(user, password)| format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))),
    };
    Router::new()
        .route(
            "/{resource}",
            get(read).post(create).patch(patch).put(replace).delete(remove),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_basic_auth))
        .with_state(state)
}

pub async fn run(listener: TcpListener, config: ServerConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An OData error response: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug)]
pub struct ODataFault {
    status: StatusCode,
    message: String,
}

impl ODataFault {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "the requested resource does not exist")
    }

    fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "method not allowed on this resource")
    }
}

impl IntoResponse for ODataFault {
    fn into_response(self) -> Response {
        let code = self.status.canonical_reason().unwrap_or("Error").replace(' ', "");
        let body = json!({ "error": { "code": code, "message": self.message } });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Resource addressing
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Target {
    Collection,
    Entity(Uuid),
}

/// `ItemCategories` or `ItemCategories(<uuid>)`; the key may be quoted.
fn parse_target(resource: &str) -> Result<Target, ODataFault> {
    let Some(rest) = resource.strip_prefix(ENTITY_SET) else {
        return Err(ODataFault::not_found());
    };
    if rest.is_empty() {
        return Ok(Target::Collection);
    }
    let key = rest
        .strip_prefix('(')
        .and_then(|k| k.strip_suffix(')'))
        .ok_or_else(ODataFault::not_found)?;
    let key = key.trim_matches('\'');
    Uuid::parse_str(key)
        .map(Target::Entity)
        .map_err(|_| ODataFault::new(StatusCode::BAD_REQUEST, format!("invalid key: {key}")))
}

fn service_root(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}

fn require_if_match(headers: &HeaderMap) -> Result<(), ODataFault> {
    if headers.contains_key(header::IF_MATCH) {
        Ok(())
    } else {
        Err(ODataFault::new(
            StatusCode::PRECONDITION_REQUIRED,
            "If-Match header is required",
        ))
    }
}

fn with_odata_version(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert("odata-version", HeaderValue::from_static("4.0"));
    response
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

async fn require_basic_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = &state.expected_authorization else {
        return next.run(request).await;
    };
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());
    if presented == Some(expected.as_str()) {
        return next.run(request).await;
    }
    let mut response = ODataFault::new(StatusCode::UNAUTHORIZED, "authentication required").into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"odata\""),
    );
    response
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn read(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ODataFault> {
    let root = service_root(&headers);
    let db = state.db.read().await;
    match parse_target(&resource)? {
        Target::Collection => {
            let offset = match params.get("$skiptoken") {
                Some(token) => token
                    .parse::<usize>()
                    .map_err(|_| ODataFault::new(StatusCode::BAD_REQUEST, "invalid $skiptoken"))?,
                None => 0,
            };
            let end = (offset + state.page_size).min(db.len());
            let page = db.get(offset..end).unwrap_or_default();
            let mut body = json!({
                "@odata.context": format!("{root}/$metadata#{ENTITY_SET}"),
                "value": page,
            });
            if end < db.len() {
                body["@odata.nextLink"] = json!(format!("{root}/{ENTITY_SET}?$skiptoken={end}"));
            }
            debug!(offset, returned = page.len(), "listed item categories");
            Ok(with_odata_version(Json(body).into_response()))
        }
        Target::Entity(id) => {
            let item = db.iter().find(|c| c.id == id).ok_or_else(ODataFault::not_found)?;
            let mut body = serde_json::to_value(item).unwrap_or_default();
            body["@odata.context"] = json!(format!("{root}/$metadata#{ENTITY_SET}/$entity"));
            Ok(with_odata_version(Json(body).into_response()))
        }
    }
}

async fn create(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(input): Json<CreateItemCategory>,
) -> Result<Response, ODataFault> {
    if parse_target(&resource)? != Target::Collection {
        return Err(ODataFault::method_not_allowed());
    }
    let item = ItemCategory {
        id: Uuid::new_v4(),
        code: input.code,
        description: input.description,
    };
    state.db.write().await.push(item.clone());
    debug!(id = %item.id, "created item category");
    Ok(with_odata_version((StatusCode::CREATED, Json(item)).into_response()))
}

async fn patch(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    headers: HeaderMap,
    Json(input): Json<PatchItemCategory>,
) -> Result<Response, ODataFault> {
    let Target::Entity(id) = parse_target(&resource)? else {
        return Err(ODataFault::method_not_allowed());
    };
    require_if_match(&headers)?;
    let mut db = state.db.write().await;
    let item = db.iter_mut().find(|c| c.id == id).ok_or_else(ODataFault::not_found)?;
    if let Some(code) = input.code {
        item.code = code;
    }
    if let Some(description) = input.description {
        item.description = description;
    }
    Ok(with_odata_version(Json(item.clone()).into_response()))
}

async fn replace(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(input): Json<ReplaceItemCategory>,
) -> Result<Response, ODataFault> {
    let Target::Entity(id) = parse_target(&resource)? else {
        return Err(ODataFault::method_not_allowed());
    };
    let mut db = state.db.write().await;
    let item = db.iter_mut().find(|c| c.id == id).ok_or_else(ODataFault::not_found)?;
    item.code = input.code;
    item.description = input.description;
    Ok(with_odata_version(Json(item.clone()).into_response()))
}

async fn remove(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ODataFault> {
    let Target::Entity(id) = parse_target(&resource)? else {
        return Err(ODataFault::method_not_allowed());
    };
    require_if_match(&headers)?;
    let mut db = state.db.write().await;
    let index = db.iter().position(|c| c.id == id).ok_or_else(ODataFault::not_found)?;
    db.remove(index);
    debug!(%id, "deleted item category");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_collection_and_entity_targets() {
        assert_eq!(parse_target("ItemCategories").unwrap(), Target::Collection);
        assert_eq!(
            parse_target("ItemCategories(00000000-0000-0000-0000-000000000000)").unwrap(),
            Target::Entity(Uuid::nil())
        );
        assert_eq!(
            parse_target("ItemCategories('00000000-0000-0000-0000-000000000000')").unwrap(),
            Target::Entity(Uuid::nil())
        );
    }

    #[test]
    fn unknown_entity_set_is_not_found() {
        let fault = parse_target("Customers").unwrap_err();
        assert_eq!(fault.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn malformed_key_is_bad_request() {
        let fault = parse_target("ItemCategories(42)").unwrap_err();
        assert_eq!(fault.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn item_category_roundtrips_through_json() {
        let item = ItemCategory {
            id: Uuid::new_v4(),
            code: "FURNITURE".to_string(),
            description: "Office furniture".to_string(),
        };
        let json = serde_json::to_string(&item).unwrap();
        let back: ItemCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn create_defaults_description_to_empty() {
        let input: CreateItemCategory = serde_json::from_str(r#"{"code":"MISC"}"#).unwrap();
        assert_eq!(input.code, "MISC");
        assert!(input.description.is_empty());
    }

    #[test]
    fn patch_fields_are_optional() {
        let input: PatchItemCategory = serde_json::from_str("{}").unwrap();
        assert!(input.code.is_none());
        assert!(input.description.is_none());
    }
}
