use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::utils::{error_codes, error_to_api_response};

/// 路由层错误，统一以 ApiResponse 形式返回
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    RateLimited { limit: u32, window_secs: u64 },
    UpstreamUnavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR, msg)
            }
            AppError::RateLimited { limit, window_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                error_codes::RATE_LIMIT,
                format!(
                    "Usage limit of {} requests reached, try again in {} hours",
                    limit,
                    window_secs.div_ceil(3600)
                ),
            ),
            AppError::UpstreamUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                error_codes::UPSTREAM_ERROR,
                msg,
            ),
        };

        (status, error_to_api_response::<()>(code, msg)).into_response()
    }
}

/// 计数存储和快速缓存的访问错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// 稳定的错误码，数据库错误优先使用 SQLSTATE
    pub fn code(&self) -> String {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => db
                .code()
                .map(|c| c.into_owned())
                .unwrap_or_else(|| "DATABASE_ERROR".to_string()),
            StoreError::Database(sqlx::Error::PoolTimedOut) => "POOL_TIMEOUT".to_string(),
            StoreError::Database(_) => "DATABASE_ERROR".to_string(),
            StoreError::Cache(_) => "CACHE_ERROR".to_string(),
            StoreError::Serialization(_) => "SERIALIZATION_ERROR".to_string(),
        }
    }
}

/// 返回给调用方的结构化错误描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageError {
    pub code: String,
    pub message: String,
}

impl From<&StoreError> for UsageError {
    fn from(e: &StoreError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}
