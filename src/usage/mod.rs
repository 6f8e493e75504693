// 使用限制服务
// 根据 IP 判断调用方能否继续使用，并负责扣减与重置额度

mod service;

use std::time::Duration;

use serde::Serialize;

use crate::config::{Config, FailPolicy};
use crate::database::UsageRecord;
use crate::error::UsageError;

pub use service::UsageLimitService;

/// 额度策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsagePolicy {
    pub max_usage: u32,
    pub window: Duration,
    pub fail_policy: FailPolicy,
}

impl UsagePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_usage: config.usage_limit_max,
            window: config.usage_limit_window(),
            fail_policy: config.usage_limit_fail_policy,
        }
    }
}

impl Default for UsagePolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 一次额度检查的结果
///
/// `remaining_count = max(0, max_usage - usage_count)`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLimitResult {
    pub can_use: bool,
    pub remaining_count: u32,
    pub usage_count: u32,
    pub is_from_cache: bool,
    pub error: Option<UsageError>,
    /// 从存储读到的原始记录，仅用于诊断输出
    #[serde(skip)]
    pub record: Option<UsageRecord>,
}

/// 扣减额度的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeOutcome {
    pub permitted: bool,
    pub result: UsageLimitResult,
}

/// 重置额度的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetOutcome {
    pub success: bool,
    pub removed: u64,
    pub error: Option<UsageError>,
}
