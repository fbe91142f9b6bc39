use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::ledger::engine::{
    AddNewItemCommand, IssueCommand, NewInventoryEntry, ReceiveCommand, UploadedImage,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub item_code: String,
    /// Accepted as a JSON number or a numeric string
    #[schema(value_type = Object)]
    pub issuance_qty: Value,
    pub issued_by: String,
    pub activity: String,
    pub notes: Option<String>,
    pub location: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveRequest {
    pub item_code: String,
    /// Accepted as a JSON number or a numeric string
    #[schema(value_type = Object)]
    pub receipt_qty: Value,
    pub received_by: String,
    pub notes: Option<String>,
    pub location: String,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct SearchQuery {
    pub keyword: Option<String>,
}

/// Create the inventory router
pub fn inventory_router() -> Router<AppState> {
    Router::new()
        .route("/add", post(add_inventory))
        .route("/search", get(search_inventory))
        .route("/issue", post(issue_inventory))
        .route("/receive", post(receive_inventory))
        .route("/addNewItem", post(add_new_item))
}

/// Add a new inventory row with an attached image
#[utoipa::path(
    post,
    path = "/inventory/add",
    responses(
        (status = 201, description = "Inventory row stored"),
        (status = 400, description = "Missing image or malformed entry", body = crate::errors::ErrorResponse),
        (status = 500, description = "Configuration or dependency failure", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn add_inventory(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let engine = state.engine()?;
    let (entry, image) = read_add_multipart(multipart).await?;

    let entry: NewInventoryEntry = serde_json::from_str(&entry)
        .map_err(|e| ServiceError::ValidationError(format!("invalid entry: {}", e)))?;
    let image = image.ok_or_else(|| ServiceError::ValidationError("image file is required".into()))?;

    let stored = engine.add_with_image(entry, image).await?;
    Ok((StatusCode::CREATED, Json(Value::Object(stored))))
}

/// Search the inventory table
#[utoipa::path(
    get,
    path = "/inventory/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching rows returned"),
        (status = 400, description = "Missing keyword", body = crate::errors::ErrorResponse),
        (status = 404, description = "No inventory data", body = crate::errors::ErrorResponse),
        (status = 500, description = "Configuration or dependency failure", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn search_inventory(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let engine = state.engine()?;
    let keyword = query
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ServiceError::ValidationError("keyword query parameter is required".into()))?;

    let results = engine.search(keyword).await?;
    Ok((StatusCode::OK, Json(json!({ "results": results }))))
}

/// Issue stock from an inventory row
#[utoipa::path(
    post,
    path = "/inventory/issue",
    request_body = IssueRequest,
    responses(
        (status = 200, description = "Issuance recorded", body = crate::ledger::engine::MovementReceipt),
        (status = 400, description = "Invalid quantity or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item/location not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Configuration or dependency failure", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn issue_inventory(
    State(state): State<AppState>,
    Json(payload): Json<IssueRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let engine = state.engine()?;
    let receipt = engine
        .issue(IssueCommand {
            item_code: payload.item_code,
            issuance_qty: payload.issuance_qty,
            issued_by: payload.issued_by,
            activity: payload.activity,
            notes: payload.notes,
            location: payload.location,
        })
        .await?;
    Ok((StatusCode::OK, Json(receipt)))
}

/// Receive stock into an inventory row
#[utoipa::path(
    post,
    path = "/inventory/receive",
    request_body = ReceiveRequest,
    responses(
        (status = 200, description = "Receipt recorded", body = crate::ledger::engine::MovementReceipt),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item/location not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Configuration or dependency failure", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn receive_inventory(
    State(state): State<AppState>,
    Json(payload): Json<ReceiveRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let engine = state.engine()?;
    let receipt = engine
        .receive(ReceiveCommand {
            item_code: payload.item_code,
            receipt_qty: payload.receipt_qty,
            received_by: payload.received_by,
            notes: payload.notes,
            location: payload.location,
        })
        .await?;
    Ok((StatusCode::OK, Json(receipt)))
}

/// Record the arrival of an item that has no code yet
#[utoipa::path(
    post,
    path = "/inventory/addNewItem",
    responses(
        (status = 201, description = "Addition recorded", body = crate::ledger::engine::AdditionReceipt),
        (status = 400, description = "Missing or invalid fields", body = crate::errors::ErrorResponse),
        (status = 500, description = "Configuration or dependency failure", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn add_new_item(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let engine = state.engine()?;

    let mut image = None;
    let mut fields = serde_json::Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::ValidationError(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            image = Some(read_image_field(field).await?);
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ServiceError::ValidationError(format!("invalid field '{}': {}", name, e)))?;
            fields.insert(name, Value::String(text));
        }
    }

    let required = |key: &str| -> Result<String, ServiceError> {
        match fields.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            _ => Err(ServiceError::ValidationError(format!("{} is required", key))),
        }
    };

    let receipt = engine
        .add_new_item_without_code(AddNewItemCommand {
            receipt_qty: fields
                .get("receiptQty")
                .cloned()
                .unwrap_or(Value::Null),
            location: required("location")?,
            description: required("description")?,
            returnable_item: required("returnableItem")?,
            received_by: required("receivedBy")?,
            notes: fields
                .get("notes")
                .and_then(Value::as_str)
                .map(str::to_string),
            image,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Pull the `entry` JSON text and the `image` file out of the add-inventory
/// multipart body.
async fn read_add_multipart(
    mut multipart: Multipart,
) -> Result<(String, Option<UploadedImage>), ServiceError> {
    let mut entry = None;
    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::ValidationError(format!("invalid multipart body: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "entry" => {
                entry = Some(field.text().await.map_err(|e| {
                    ServiceError::ValidationError(format!("invalid entry field: {}", e))
                })?);
            }
            "image" => {
                image = Some(read_image_field(field).await?);
            }
            _ => {}
        }
    }
    let entry =
        entry.ok_or_else(|| ServiceError::ValidationError("entry field is required".into()))?;
    Ok((entry, image))
}

async fn read_image_field(field: axum::extract::multipart::Field<'_>) -> Result<UploadedImage, ServiceError> {
    let file_name = field
        .file_name()
        .unwrap_or("upload")
        .to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| ServiceError::ValidationError(format!("invalid image upload: {}", e)))?;
    Ok(UploadedImage {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    })
}
