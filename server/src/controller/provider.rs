use axum::{
    extract::Path,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::controller::BaseError;
use crate::database::provider::{NewProvider, Provider, UpdateProviderData};
use crate::schema::enum_def::ProviderType;
use crate::utils::HttpResult;

#[derive(Debug, Deserialize)]
pub struct InsertProviderRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub config: Value,
}

// The config blob is opaque to everything but the matching adapter; the
// admin surface only checks it is a JSON object.
fn validate_config(config: &Value) -> Result<String, BaseError> {
    if !config.is_object() {
        return Err(BaseError::ParamInvalid(Some(
            "config must be a JSON object".to_string(),
        )));
    }
    serde_json::to_string(config)
        .map_err(|e| BaseError::ParamInvalid(Some(format!("invalid config: {}", e))))
}

async fn insert_provider(
    Json(request): Json<InsertProviderRequest>,
) -> Result<HttpResult<Provider>, BaseError> {
    if request.name.trim().is_empty() {
        return Err(BaseError::ParamInvalid(Some(
            "provider name must not be empty".to_string(),
        )));
    }
    let config = validate_config(&request.config)?;
    let now = Utc::now().timestamp_millis();
    let created = Provider::create(&NewProvider {
        name: request.name,
        provider_type: request.provider_type,
        config,
        created_at: now,
        updated_at: now,
    })?;
    Ok(HttpResult::new(created))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProviderRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub provider_type: Option<ProviderType>,
    pub config: Option<Value>,
}

async fn update_provider(
    Path(id): Path<i64>,
    Json(request): Json<UpdateProviderRequest>,
) -> Result<HttpResult<Provider>, BaseError> {
    let config = match &request.config {
        Some(value) => Some(validate_config(value)?),
        None => None,
    };
    let updated = Provider::update(
        id,
        &UpdateProviderData {
            name: request.name,
            provider_type: request.provider_type,
            config,
        },
    )?;
    Ok(HttpResult::new(updated))
}

async fn delete_provider(Path(id): Path<i64>) -> Result<HttpResult<()>, BaseError> {
    Provider::delete(id)?;
    Ok(HttpResult::new(()))
}

async fn list_providers() -> Result<HttpResult<Vec<Provider>>, BaseError> {
    Ok(HttpResult::new(Provider::list_all()?))
}

async fn get_provider(Path(id): Path<i64>) -> Result<HttpResult<Provider>, BaseError> {
    Ok(HttpResult::new(Provider::get_by_id(id)?))
}

pub fn create_provider_router() -> Router {
    Router::new().nest(
        "/provider",
        Router::new()
            .route("/", post(insert_provider))
            .route("/list", get(list_providers))
            .route("/{id}", get(get_provider))
            .route("/{id}", put(update_provider))
            .route("/{id}", delete(delete_provider)),
    )
}
