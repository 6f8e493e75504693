use axum::{
    Extension,
    extract::{Json, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    ai::AiError,
    error::AppError,
    ip::{ClientAddress, production_safe},
    utils::success_to_api_response,
};

use super::model::{OptimizeRequest, OptimizeResponse};

pub const MAX_PROMPT_CHARS: usize = 4000;

#[axum::debug_handler]
pub async fn optimize(
    State(state): State<AppState>,
    Extension(client): Extension<ClientAddress>,
    payload: Result<Json<OptimizeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::Validation("Prompt must not be empty".to_string()));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(AppError::Validation(format!(
            "Prompt must be at most {} characters",
            MAX_PROMPT_CHARS
        )));
    }

    // 命中缓存直接返回，不消耗额度
    if let Some(cached) = state.prompt_cache.get(prompt) {
        tracing::debug!("Prompt served from cache");
        return Ok((
            StatusCode::OK,
            success_to_api_response(OptimizeResponse {
                optimized_prompt: cached,
                from_cache: true,
                remaining_count: None,
            }),
        ));
    }

    let ip = production_safe(&client, state.config.deployment);
    let outcome = state.usage.consume(&ip).await;
    if !outcome.permitted {
        if outcome.result.error.is_some() {
            return Err(AppError::UpstreamUnavailable(
                "Usage service is temporarily unavailable".to_string(),
            ));
        }
        let policy = state.usage.policy();
        return Err(AppError::RateLimited {
            limit: policy.max_usage,
            window_secs: policy.window.as_secs(),
        });
    }

    let optimized = state.generator.optimize(prompt).await.map_err(|e| {
        tracing::error!(ip = %ip, error = %e, "Prompt optimization failed");
        match e {
            AiError::NotConfigured => AppError::UpstreamUnavailable(
                "Prompt optimization is not available".to_string(),
            ),
            _ => AppError::UpstreamUnavailable("Prompt optimization failed".to_string()),
        }
    })?;

    state.prompt_cache.set(prompt, optimized.clone());

    Ok((
        StatusCode::OK,
        success_to_api_response(OptimizeResponse {
            optimized_prompt: optimized,
            from_cache: false,
            remaining_count: Some(outcome.result.remaining_count),
        }),
    ))
}
