use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::UsageRecord;
use crate::usage::UsageLimitResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub has_error: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl From<&UsageLimitResult> for DebugInfo {
    fn from(result: &UsageLimitResult) -> Self {
        Self {
            has_error: result.error.is_some(),
            error_code: result.error.as_ref().map(|e| e.code.clone()),
            error_message: result.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub ip_address: String,
    pub max_usage_count: u32,
    pub reset_time: DateTime<Utc>,
    pub service_level: UsageLimitResult,
    pub database_record: Option<UsageRecord>,
    pub debug: DebugInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub ip_address: String,
}
