use axum::{
    extract::Path,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::controller::BaseError;
use crate::database::model::{Model, NewModel, UpdateModelData};
use crate::utils::HttpResult;

fn default_max_retry() -> i32 {
    3
}

fn default_timeout_seconds() -> i32 {
    60
}

#[derive(Debug, Deserialize)]
pub struct InsertModelRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_max_retry")]
    pub max_retry: i32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: i32,
}

fn validate_limits(max_retry: i32, timeout_seconds: i32) -> Result<(), BaseError> {
    if max_retry < 1 {
        return Err(BaseError::ParamInvalid(Some(
            "max_retry must be at least 1".to_string(),
        )));
    }
    if timeout_seconds < 1 {
        return Err(BaseError::ParamInvalid(Some(
            "timeout_seconds must be at least 1".to_string(),
        )));
    }
    Ok(())
}

async fn insert_model(
    Json(request): Json<InsertModelRequest>,
) -> Result<HttpResult<Model>, BaseError> {
    if request.name.trim().is_empty() {
        return Err(BaseError::ParamInvalid(Some(
            "model name must not be empty".to_string(),
        )));
    }
    validate_limits(request.max_retry, request.timeout_seconds)?;
    let now = Utc::now().timestamp_millis();
    let created = Model::create(&NewModel {
        name: request.name,
        description: request.description,
        max_retry: request.max_retry,
        timeout_seconds: request.timeout_seconds,
        created_at: now,
        updated_at: now,
    })?;
    Ok(HttpResult::new(created))
}

#[derive(Debug, Deserialize)]
pub struct UpdateModelRequest {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub max_retry: Option<i32>,
    pub timeout_seconds: Option<i32>,
}

async fn update_model(
    Path(id): Path<i64>,
    Json(request): Json<UpdateModelRequest>,
) -> Result<HttpResult<Model>, BaseError> {
    validate_limits(
        request.max_retry.unwrap_or(1),
        request.timeout_seconds.unwrap_or(1),
    )?;
    let updated = Model::update(
        id,
        &UpdateModelData {
            name: request.name,
            description: request.description,
            max_retry: request.max_retry,
            timeout_seconds: request.timeout_seconds,
        },
    )?;
    Ok(HttpResult::new(updated))
}

async fn delete_model(Path(id): Path<i64>) -> Result<HttpResult<()>, BaseError> {
    Model::delete(id)?;
    Ok(HttpResult::new(()))
}

async fn list_models() -> Result<HttpResult<Vec<Model>>, BaseError> {
    Ok(HttpResult::new(Model::list_all()?))
}

pub fn create_model_router() -> Router {
    Router::new().nest(
        "/model",
        Router::new()
            .route("/", post(insert_model))
            .route("/list", get(list_models))
            .route("/{id}", put(update_model))
            .route("/{id}", delete(delete_model)),
    )
}
