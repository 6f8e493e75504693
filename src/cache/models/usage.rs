use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::models::usage::UsageRecord;

/// 使用计数缓存数据模型
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CachedUsage {
    pub ip_address: String,
    pub usage_count: u32,
    pub window_started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reset_at: i64, // Unix timestamp
}

impl CachedUsage {
    pub fn from_record(record: &UsageRecord, window: chrono::Duration) -> Self {
        let reset_at = record
            .created_at
            .checked_add_signed(window)
            .unwrap_or(record.created_at)
            .timestamp();
        Self {
            ip_address: record.ip_address.clone(),
            usage_count: u32::try_from(record.usage_count).unwrap_or(0),
            window_started_at: record.created_at,
            updated_at: record.updated_at,
            reset_at,
        }
    }

    /// 还原成存储中的行，供快速路径返回 databaseRecord
    pub fn to_record(&self) -> UsageRecord {
        UsageRecord {
            ip_address: self.ip_address.clone(),
            usage_count: i32::try_from(self.usage_count).unwrap_or(i32::MAX),
            created_at: self.window_started_at,
            updated_at: self.updated_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.reset_at <= now.timestamp()
    }

    /// 距离窗口结束的剩余秒数
    pub fn ttl_secs(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from(self.reset_at - now.timestamp()).unwrap_or(0)
    }
}
