use axum::{
    extract::{Path, Query},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::controller::BaseError;
use crate::database::model::Model;
use crate::database::model_provider::{
    ModelWithProvider, NewModelWithProvider, UpdateModelWithProviderData,
};
use crate::database::provider::Provider;
use crate::utils::HttpResult;

fn default_weight() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct InsertMappingRequest {
    pub model_id: i64,
    pub provider_id: i64,
    pub provider_model: String,
    #[serde(default = "default_weight")]
    pub weight: i32,
    pub tool_call: Option<bool>,
    pub structured_output: Option<bool>,
    pub image: Option<bool>,
}

async fn insert_mapping(
    Json(request): Json<InsertMappingRequest>,
) -> Result<HttpResult<ModelWithProvider>, BaseError> {
    if request.weight < 1 {
        return Err(BaseError::ParamInvalid(Some(
            "weight must be at least 1".to_string(),
        )));
    }
    if request.provider_model.trim().is_empty() {
        return Err(BaseError::ParamInvalid(Some(
            "provider_model must not be empty".to_string(),
        )));
    }
    // Both ends of the binding must exist and be live.
    Model::get_by_id(request.model_id)?;
    Provider::get_by_id(request.provider_id)?;

    let now = Utc::now().timestamp_millis();
    let created = ModelWithProvider::create(&NewModelWithProvider {
        model_id: request.model_id,
        provider_id: request.provider_id,
        provider_model: request.provider_model,
        weight: request.weight,
        tool_call: request.tool_call,
        structured_output: request.structured_output,
        image: request.image,
        created_at: now,
        updated_at: now,
    })?;
    Ok(HttpResult::new(created))
}

#[derive(Debug, Deserialize)]
pub struct UpdateMappingRequest {
    pub provider_model: Option<String>,
    pub weight: Option<i32>,
    pub tool_call: Option<Option<bool>>,
    pub structured_output: Option<Option<bool>>,
    pub image: Option<Option<bool>>,
}

async fn update_mapping(
    Path(id): Path<i64>,
    Json(request): Json<UpdateMappingRequest>,
) -> Result<HttpResult<ModelWithProvider>, BaseError> {
    if request.weight.unwrap_or(1) < 1 {
        return Err(BaseError::ParamInvalid(Some(
            "weight must be at least 1".to_string(),
        )));
    }
    let updated = ModelWithProvider::update(
        id,
        &UpdateModelWithProviderData {
            provider_model: request.provider_model,
            weight: request.weight,
            tool_call: request.tool_call,
            structured_output: request.structured_output,
            image: request.image,
        },
    )?;
    Ok(HttpResult::new(updated))
}

async fn delete_mapping(Path(id): Path<i64>) -> Result<HttpResult<()>, BaseError> {
    ModelWithProvider::delete(id)?;
    Ok(HttpResult::new(()))
}

#[derive(Debug, Deserialize)]
pub struct ListMappingsQuery {
    pub model_id: Option<i64>,
}

async fn list_mappings(
    Query(query): Query<ListMappingsQuery>,
) -> Result<HttpResult<Vec<ModelWithProvider>>, BaseError> {
    let mappings = match query.model_id {
        Some(model_id) => ModelWithProvider::find_by_model_id(model_id)?,
        None => ModelWithProvider::list_all()?,
    };
    Ok(HttpResult::new(mappings))
}

pub fn create_model_provider_router() -> Router {
    Router::new().nest(
        "/model_provider",
        Router::new()
            .route("/", post(insert_mapping))
            .route("/list", get(list_mappings))
            .route("/{id}", put(update_mapping))
            .route("/{id}", delete(delete_mapping)),
    )
}
