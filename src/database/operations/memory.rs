use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;

use super::usage::UsageStore;
use crate::database::models::usage::UsageRecord;
use crate::error::StoreError;

/// 进程内计数存储，未配置数据库时使用
///
/// 每个 IP 的检查与自增在 dashmap 的条目锁内完成。
#[derive(Default)]
pub struct MemoryUsageStore {
    records: DashMap<String, UsageRecord>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入一条记录，覆盖已有值
    pub fn insert_record(&self, record: UsageRecord) {
        self.records.insert(record.ip_address.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 删除窗口已结束的记录，返回删除数量
    pub fn purge_expired_at(&self, window: Duration, now: DateTime<Utc>) -> usize {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let before = self.records.len();
        self.records.retain(|_, record| !record.window_elapsed(window, now));
        before.saturating_sub(self.records.len())
    }

    /// 定期清理过期记录，存储被释放后任务自行退出
    pub fn spawn_purger(self: &Arc<Self>, window: Duration, interval: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let removed = store.purge_expired_at(window, Utc::now());
                if removed > 0 {
                    tracing::info!(removed, remaining = store.len(), "Purged expired usage records");
                }
            }
        })
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn fetch_latest(&self, ip: &str) -> Result<Option<UsageRecord>, StoreError> {
        Ok(self.records.get(ip).map(|r| r.value().clone()))
    }

    async fn upsert_or_increment(
        &self,
        ip: &str,
        limit: u32,
        window: Duration,
    ) -> Result<Option<UsageRecord>, StoreError> {
        if limit == 0 {
            return Ok(None);
        }

        let now = Utc::now();
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);

        let mut entry = self
            .records
            .entry(ip.to_string())
            .or_insert_with(|| UsageRecord::new(ip, now));

        if entry.window_elapsed(window, now) {
            entry.usage_count = 0;
            entry.created_at = now;
        }

        if entry.usage_count >= limit {
            return Ok(None);
        }

        entry.usage_count += 1;
        entry.updated_at = now;
        Ok(Some(entry.value().clone()))
    }

    async fn delete(&self, ip: &str) -> Result<u64, StoreError> {
        Ok(self.records.remove(ip).map_or(0, |_| 1))
    }
}
