use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 单个 IP 的使用计数，对应 ip_usage_limits 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UsageRecord {
    pub ip_address: String,
    pub usage_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(ip_address: &str, now: DateTime<Utc>) -> Self {
        Self {
            ip_address: ip_address.to_string(),
            usage_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// 窗口从 created_at 开始计算
    pub fn window_elapsed(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.created_at
            .checked_add_signed(window)
            .is_some_and(|end| end <= now)
    }

    /// 当前窗口内的有效计数，窗口过期后视为 0
    pub fn effective_count(&self, window: Duration, now: DateTime<Utc>) -> u32 {
        if self.window_elapsed(window, now) {
            0
        } else {
            u32::try_from(self.usage_count).unwrap_or(0)
        }
    }
}
