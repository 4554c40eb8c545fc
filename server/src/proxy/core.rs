use std::time::{Duration, Instant};

use axum::response::Response;
use chrono::Utc;
use reqwest::StatusCode;
use tracing::{error, info, warn};

use super::accounting::stream_response;
use super::error::ProxyError;
use super::introspect::RequestProfile;
use super::logging::{CancelLogGuard, ChatLogSink};
use super::pool::{resolve_pool, ResolvedPool};
use super::providers::Adapter;
use crate::database::chat_log::{ChatLog, NewChatLog};
use crate::schema::enum_def::{ChatStatus, ProviderType};
use crate::utils::body_snippet;

/// Dispatches one introspected request: resolve the candidate pool, then
/// loop select → call → classify under the model's retry and time budget.
/// A 2xx upstream answer commits the request; everything else mutates the
/// weight table and tries again.
pub(super) async fn dispatch(
    style: ProviderType,
    profile: RequestProfile,
) -> Result<Response, ProxyError> {
    let proxy_start = Instant::now();
    info!(
        model = %profile.model, %style, stream = profile.stream,
        tool_call = profile.tool_call, structured_output = profile.structured_output,
        image = profile.image, "dispatch started"
    );

    let pool = resolve_pool(&profile.model, style, &profile)?;
    info!(
        model = %profile.model, candidates = pool.entries.len(),
        max_retry = pool.max_retry, timeout_seconds = pool.timeout_seconds,
        "pool resolved"
    );

    // Failed attempts are logged through a per-request writer which is
    // always drained before the request returns.
    let sink = ChatLogSink::spawn(pool.max_retry as usize);
    let result = run_attempts(style, &profile, pool, proxy_start, &sink).await;
    sink.finish().await;
    result
}

async fn run_attempts(
    style: ProviderType,
    profile: &RequestProfile,
    pool: ResolvedPool,
    proxy_start: Instant,
    sink: &ChatLogSink,
) -> Result<Response, ProxyError> {
    let ResolvedPool {
        mut weights,
        entries,
        max_retry,
        timeout_seconds,
    } = pool;
    let budget = Duration::from_secs(timeout_seconds as u64);

    for retry in 0..max_retry {
        // The budget gates entering an attempt; an in-flight call is
        // bounded by the transport timeout on the client below.
        if proxy_start.elapsed() >= budget {
            warn!(model = %profile.model, retry, timeout_seconds, "retry budget elapsed");
            return Err(ProxyError::RetryTimeout);
        }

        let picked = match weights.pick() {
            Ok(id) => id,
            Err(_) => {
                warn!(model = %profile.model, retry, "candidate pool exhausted");
                return Err(ProxyError::Exhausted);
            }
        };
        let entry = entries
            .get(&picked)
            .ok_or_else(|| ProxyError::AdapterConfig("selected mapping missing from lookup".to_string()))?;
        let mapping = &entry.mapping;
        let provider = &entry.provider;

        // A bad config blob is an operator problem, not a retryable one.
        let adapter = Adapter::from_config(style, &provider.config).map_err(|e| {
            error!(provider = %provider.name, error = %e, "failed to create provider adapter");
            ProxyError::AdapterConfig(e.to_string())
        })?;

        info!(
            provider = %provider.name, provider_model = %mapping.provider_model, retry,
            "provider selected"
        );

        let log = NewChatLog {
            name: profile.model.clone(),
            provider_model: mapping.provider_model.clone(),
            provider_name: provider.name.clone(),
            status: ChatStatus::Success,
            style,
            retry,
            error: None,
            proxy_time: proxy_start.elapsed().as_millis() as i64,
            created_at: Utc::now().timestamp_millis(),
        };

        let client = build_llm_client(timeout_seconds)?;
        let call_start = Instant::now();
        let mut cancel_guard = CancelLogGuard::arm(log.clone());
        let outcome = adapter
            .chat(&client, &mapping.provider_model, &profile.raw)
            .await;
        cancel_guard.disarm();

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                error!(provider = %provider.name, retry, error = %e, "provider request failed");
                sink.emit(log.with_error(e.to_string())).await;
                weights.remove(picked);
                info!(remaining = weights.len(), "candidate removed from pool");
                continue;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let snippet = body_snippet(&body);
            error!(
                provider = %provider.name, status = status.as_u16(), retry, body = %snippet,
                "provider returned error status"
            );
            sink.emit(
                log.with_error(format!("status: {}, body: {}", status.as_u16(), snippet)),
            )
            .await;
            if status == StatusCode::TOO_MANY_REQUESTS {
                // Rate limited: the candidate stays in the pool at reduced
                // weight.
                weights.penalize(picked);
                warn!(
                    provider = %provider.name, weight = ?weights.weight_of(picked),
                    "rate limit hit, weight reduced"
                );
            } else {
                weights.remove(picked);
                info!(remaining = weights.len(), "candidate removed from pool");
            }
            continue;
        }

        // Provisional success row; the accounting task fills in timings and
        // token counts when the stream ends.
        let log_id = ChatLog::insert(&log)?;
        info!(
            provider = %provider.name, log_id, retry, status = status.as_u16(),
            "provider response success"
        );
        return Ok(stream_response(
            response,
            adapter,
            profile.stream,
            log_id,
            call_start,
        ));
    }

    warn!(model = %profile.model, max_retry, "maximum retry attempts reached");
    Err(ProxyError::MaxRetriesReached)
}

fn build_llm_client(timeout_seconds: i32) -> Result<reqwest::Client, ProxyError> {
    // A third of the attempt budget, so a hanging transport cannot consume
    // the whole retry window.
    let timeout = Duration::from_secs((timeout_seconds as u64 / 3).max(1));
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProxyError::AdapterConfig(format!("failed to build HTTP client: {}", e)))
}
