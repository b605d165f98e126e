//! HTTP surface of the custom ID engine
//!
//! Exposes template load/save, preview, item creation and custom ID changes
//! as JSON endpoints. Authentication and authorization are the caller's
//! concern; requests reaching this router are trusted.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | `GET` | `/inventories/{inventory_id}/custom-id` | load template |
//! | `PUT` | `/inventories/{inventory_id}/custom-id` | save template |
//! | `POST` | `/custom-id/preview` | preview a template |
//! | `POST` | `/inventories/{inventory_id}/items` | create an item |
//! | `PUT` | `/items/{item_id}/custom-id` | change an item's custom ID |
//! | `GET` | `/health` | liveness |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use customid::{
    ConfigVersion, ConflictError, CustomId, CustomIdConfig, CustomIdEngine, CustomIdError,
    ElementDraft, ExpectedVersion, InventoryId, InventoryItem, InventoryStore, ItemId,
    ItemVersion, StoreError, ValidationError,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

/// Engine over a store chosen at startup.
pub type SharedEngine = Arc<CustomIdEngine<Arc<dyn InventoryStore>>>;

/// Axum application state.
#[derive(Clone)]
pub struct AppState {
    engine: SharedEngine,
}

impl AppState {
    /// Wraps an engine for use by the router.
    pub const fn new(engine: SharedEngine) -> Self {
        Self { engine }
    }
}

/// Body of `PUT /inventories/{inventory_id}/custom-id`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConfigRequest {
    /// Template elements in wire form.
    pub elements: Vec<ElementDraft>,
    /// Version the caller last read; omit to overwrite unconditionally.
    #[serde(default)]
    pub version: Option<u64>,
}

/// Body of `POST /custom-id/preview`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    /// Template elements in wire form.
    pub elements: Vec<ElementDraft>,
    /// Inventory whose sequence the preview should show.
    #[serde(default)]
    pub inventory_id: Option<String>,
}

/// Response of `POST /custom-id/preview`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    /// The rendered sample ID.
    pub preview: String,
}

/// Body of `POST /inventories/{inventory_id}/items`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    /// Explicit custom ID; generated from the template when omitted.
    #[serde(default)]
    pub custom_id: Option<String>,
}

/// Body of `PUT /items/{item_id}/custom-id`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeCustomIdRequest {
    /// Inventory the item belongs to.
    pub inventory_id: String,
    /// The new custom ID.
    pub custom_id: String,
    /// Item version the caller last read.
    #[serde(default)]
    pub version: Option<u64>,
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Human readable message.
    pub error: String,
    /// Free alternative for a duplicate custom ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Current version after a stale write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<u64>,
}

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Result of every handler.
pub type ApiResult<T> = Result<T, ApiError>;

/// Maps an engine error onto a status code and JSON body.
pub fn error_response(err: CustomIdError) -> ApiError {
    let mut body = ErrorResponse {
        error: err.to_string(),
        suggestion: None,
        current_version: None,
    };

    let status = match &err {
        CustomIdError::Validation(_) => StatusCode::BAD_REQUEST,
        CustomIdError::Conflict(ConflictError::DuplicateCustomId { suggestion, .. }) => {
            body.suggestion = suggestion.as_ref().map(ToString::to_string);
            StatusCode::CONFLICT
        }
        CustomIdError::Conflict(ConflictError::StaleConfig { current, .. }) => {
            body.current_version = current.map(ConfigVersion::into_inner);
            StatusCode::CONFLICT
        }
        CustomIdError::Conflict(ConflictError::StaleItem { current, .. }) => {
            body.current_version = Some(current.into_inner());
            StatusCode::CONFLICT
        }
        CustomIdError::Store(StoreError::ItemNotFound(_)) => StatusCode::NOT_FOUND,
        CustomIdError::Store(
            StoreError::DuplicateCustomId { .. }
            | StoreError::ConfigVersionConflict { .. }
            | StoreError::ItemVersionConflict { .. },
        ) => StatusCode::CONFLICT,
        CustomIdError::Store(store_error) => {
            error!(error = %store_error, "[http.store_error] request failed in the store");
            body.error = "internal storage error".to_string();
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (status, Json(body))
}

fn parse_inventory_id(raw: String) -> ApiResult<InventoryId> {
    InventoryId::try_new(raw)
        .map_err(|e| error_response(ValidationError::InvalidInventoryId(e.to_string()).into()))
}

fn parse_custom_id(raw: String) -> ApiResult<CustomId> {
    CustomId::try_new(raw).map_err(|_| error_response(ValidationError::EmptyCustomId.into()))
}

/// `GET /inventories/{inventory_id}/custom-id`
pub async fn get_config(
    State(state): State<AppState>,
    Path(inventory_id): Path<String>,
) -> ApiResult<Json<Option<CustomIdConfig>>> {
    let inventory_id = parse_inventory_id(inventory_id)?;
    state
        .engine
        .load_config(&inventory_id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// `PUT /inventories/{inventory_id}/custom-id`
pub async fn save_config(
    State(state): State<AppState>,
    Path(inventory_id): Path<String>,
    Json(request): Json<SaveConfigRequest>,
) -> ApiResult<Json<CustomIdConfig>> {
    let inventory_id = parse_inventory_id(inventory_id)?;
    let expected = request
        .version
        .map_or(ExpectedVersion::Any, |version| {
            ExpectedVersion::Exact(ConfigVersion::new(version))
        });

    state
        .engine
        .save_config(&inventory_id, &request.elements, expected)
        .await
        .map(Json)
        .map_err(error_response)
}

/// `POST /custom-id/preview`
pub async fn preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewResponse>> {
    let inventory_id = request.inventory_id.map(parse_inventory_id).transpose()?;

    state
        .engine
        .preview(&request.elements, inventory_id.as_ref())
        .await
        .map(|preview| Json(PreviewResponse { preview }))
        .map_err(error_response)
}

/// `POST /inventories/{inventory_id}/items`
pub async fn create_item(
    State(state): State<AppState>,
    Path(inventory_id): Path<String>,
    Json(request): Json<CreateItemRequest>,
) -> ApiResult<(StatusCode, Json<InventoryItem>)> {
    let inventory_id = parse_inventory_id(inventory_id)?;
    let explicit = request.custom_id.map(parse_custom_id).transpose()?;

    state
        .engine
        .create_item(&inventory_id, explicit)
        .await
        .map(|item| (StatusCode::CREATED, Json(item)))
        .map_err(error_response)
}

/// `PUT /items/{item_id}/custom-id`
pub async fn change_custom_id(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(request): Json<ChangeCustomIdRequest>,
) -> ApiResult<Json<InventoryItem>> {
    let inventory_id = parse_inventory_id(request.inventory_id)?;
    let custom_id = parse_custom_id(request.custom_id)?;

    state
        .engine
        .change_custom_id(
            &inventory_id,
            ItemId::new(item_id),
            custom_id,
            request.version.map(ItemVersion::new),
        )
        .await
        .map(Json)
        .map_err(error_response)
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// Builds the router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route(
            "/inventories/{inventory_id}/custom-id",
            get(get_config).put(save_config),
        )
        .route("/inventories/{inventory_id}/items", post(create_item))
        .route("/items/{item_id}/custom-id", put(change_custom_id))
        .route("/custom-id/preview", post(preview))
        .route("/health", get(health))
        .with_state(state)
}
