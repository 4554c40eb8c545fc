use axum::{
    body::{Body, Bytes},
    extract::Request,
    response::Response,
    Json,
};
use serde::Serialize;

use super::core::dispatch;
use super::error::ProxyError;
use super::introspect::{inspect_anthropic, inspect_openai};
use crate::database::model::Model;
use crate::schema::enum_def::ProviderType;

pub(super) async fn handle_openai_chat(request: Request<Body>) -> Result<Response, ProxyError> {
    let raw = read_raw_body(request).await?;
    let profile = inspect_openai(raw)?;
    dispatch(ProviderType::Openai, profile).await
}

pub(super) async fn handle_anthropic_messages(
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let raw = read_raw_body(request).await?;
    let profile = inspect_anthropic(raw)?;
    dispatch(ProviderType::Anthropic, profile).await
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    id: String,
    object: &'static str,
    created: i64,
    owned_by: &'static str,
}

#[derive(Debug, Serialize)]
pub(super) struct ModelListResponse {
    object: &'static str,
    data: Vec<ModelInfo>,
}

/// Lists the logical model names clients can dispatch against.
pub(super) async fn handle_list_models() -> Result<Json<ModelListResponse>, ProxyError> {
    let models = Model::list_all()?;
    let mut data: Vec<ModelInfo> = models
        .into_iter()
        .map(|m| ModelInfo {
            id: m.name,
            object: "model",
            created: m.created_at / 1000,
            owned_by: "modelmux",
        })
        .collect();
    data.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(Json(ModelListResponse {
        object: "list",
        data,
    }))
}

async fn read_raw_body(request: Request<Body>) -> Result<Bytes, ProxyError> {
    axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| ProxyError::BadRequest(format!("failed to read body: {}", e)))
}
