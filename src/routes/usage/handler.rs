use axum::{
    Extension,
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    AppState,
    ip::{ClientAddress, production_safe},
};

use super::model::{CheckResponse, DebugInfo, ResetResponse};

#[axum::debug_handler]
pub async fn check_usage(
    State(state): State<AppState>,
    Extension(client): Extension<ClientAddress>,
) -> impl IntoResponse {
    let ip = production_safe(&client, state.config.deployment);
    let result = state.usage.check_usage_limit(&ip).await;

    let window = chrono::Duration::from_std(state.usage.policy().window)
        .unwrap_or_else(|_| chrono::Duration::hours(24));
    let now = Utc::now();
    let reset_time = now.checked_add_signed(window).unwrap_or(now);

    tracing::debug!(
        ip = %ip,
        can_use = result.can_use,
        usage_count = result.usage_count,
        from_cache = result.is_from_cache,
        "Usage limit checked"
    );

    (
        StatusCode::OK,
        Json(CheckResponse {
            ip_address: ip,
            max_usage_count: state.usage.policy().max_usage,
            reset_time,
            database_record: result.record.clone(),
            debug: DebugInfo::from(&result),
            service_level: result,
        }),
    )
}

// 重置接口没有鉴权，仅用于调试和运维
#[axum::debug_handler]
pub async fn reset(
    State(state): State<AppState>,
    Extension(client): Extension<ClientAddress>,
) -> impl IntoResponse {
    let ip = production_safe(&client, state.config.deployment);
    let outcome = state.usage.reset_usage(&ip).await;

    if outcome.success {
        tracing::info!(ip = %ip, removed = outcome.removed, "Usage reset");
        (
            StatusCode::OK,
            Json(ResetResponse {
                success: true,
                message: Some("Usage count has been reset".to_string()),
                error: None,
                ip_address: ip,
            }),
        )
    } else {
        let error = outcome
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| "Failed to reset usage".to_string());
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ResetResponse {
                success: false,
                message: None,
                error: Some(error),
                ip_address: ip,
            }),
        )
    }
}
