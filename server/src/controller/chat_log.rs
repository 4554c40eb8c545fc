use axum::{extract::Query, routing::get, Router};
use serde::Deserialize;

use crate::controller::BaseError;
use crate::database::chat_log::ChatLog;
use crate::database::ListResult;
use crate::utils::HttpResult;

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct ListChatLogsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

async fn list_chat_logs(
    Query(query): Query<ListChatLogsQuery>,
) -> Result<HttpResult<ListResult<ChatLog>>, BaseError> {
    Ok(HttpResult::new(ChatLog::list(query.page, query.page_size)?))
}

pub fn create_chat_log_router() -> Router {
    Router::new().nest(
        "/chat_log",
        Router::new().route("/list", get(list_chat_logs)),
    )
}
