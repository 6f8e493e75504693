use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use crate::{
    AppState,
    middleware::{log_errors, resolve_client},
    routes,
};

// 使用限制相关的路由
fn usage_routes() -> Router<AppState> {
    Router::new()
        .route("/usage-limit/check", get(routes::usage::check_usage))
        .route("/usage-limit/reset", post(routes::usage::reset))
}

// 提示词优化相关的路由
fn prompt_routes() -> Router<AppState> {
    Router::new().route("/prompt/optimize", post(routes::prompt::optimize))
}

// 创建主路由
pub fn create_router(state: AppState) -> Router {
    let api = Router::new().merge(usage_routes()).merge(prompt_routes());

    // 根路径不能 nest
    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    router
        .layer(axum::middleware::from_fn(log_errors))
        .layer(axum::middleware::from_fn(resolve_client))
        // 所有 OPTIONS 请求由 CorsLayer 直接应答，允许任意来源
        .layer(CorsLayer::permissive())
        .with_state(state)
}
