use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::models::usage::UsageRecord;
use crate::error::StoreError;

/// 使用计数存储
///
/// 所有错误以 `StoreError` 返回，不会越过组件边界抛出。
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// 按创建时间取该 IP 最新的一条记录
    async fn fetch_latest(&self, ip: &str) -> Result<Option<UsageRecord>, StoreError>;

    /// 原子地检查并增加计数
    ///
    /// 没有记录时以 1 新建；窗口已过期时从 1 重新开始；否则仅在计数小于
    /// `limit` 时加一。已达上限返回 `None`。
    async fn upsert_or_increment(
        &self,
        ip: &str,
        limit: u32,
        window: Duration,
    ) -> Result<Option<UsageRecord>, StoreError>;

    /// 删除该 IP 的全部记录，返回删除的行数
    async fn delete(&self, ip: &str) -> Result<u64, StoreError>;
}

/// 基于 Postgres 的计数存储
#[derive(Clone)]
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    async fn fetch_latest(&self, ip: &str) -> Result<Option<UsageRecord>, StoreError> {
        let record = sqlx::query_as::<_, UsageRecord>(
            r#"
            SELECT ip_address, usage_count, created_at, updated_at
            FROM ip_usage_limits
            WHERE ip_address = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(ip)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
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

        // 单条语句完成检查与自增，避免并发请求同时通过检查
        let record = sqlx::query_as::<_, UsageRecord>(
            r#"
            INSERT INTO ip_usage_limits (ip_address, usage_count, created_at, updated_at)
            VALUES ($1, 1, NOW(), NOW())
            ON CONFLICT (ip_address) DO UPDATE SET
                usage_count = CASE
                    WHEN ip_usage_limits.created_at + make_interval(secs => $3) <= NOW() THEN 1
                    ELSE ip_usage_limits.usage_count + 1
                END,
                created_at = CASE
                    WHEN ip_usage_limits.created_at + make_interval(secs => $3) <= NOW() THEN NOW()
                    ELSE ip_usage_limits.created_at
                END,
                updated_at = NOW()
            WHERE ip_usage_limits.created_at + make_interval(secs => $3) <= NOW()
               OR ip_usage_limits.usage_count < $2
            RETURNING ip_address, usage_count, created_at, updated_at
            "#,
        )
        .bind(ip)
        .bind(i32::try_from(limit).unwrap_or(i32::MAX))
        .bind(window.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete(&self, ip: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM ip_usage_limits WHERE ip_address = $1")
            .bind(ip)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(86_400);

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn upsert_stops_at_limit(pool: PgPool) {
        let store = PgUsageStore::new(pool);

        for expected in 1..=3 {
            let record = store.upsert_or_increment("203.0.113.10", 3, DAY).await.unwrap();
            assert_eq!(record.unwrap().usage_count, expected);
        }
        assert!(store.upsert_or_increment("203.0.113.10", 3, DAY).await.unwrap().is_none());

        let latest = store.fetch_latest("203.0.113.10").await.unwrap().unwrap();
        assert_eq!(latest.usage_count, 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn concurrent_upserts_never_exceed_limit(pool: PgPool) {
        let store = std::sync::Arc::new(PgUsageStore::new(pool));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.upsert_or_increment("203.0.113.11", 3, DAY).await })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                granted += 1;
            }
        }
        assert_eq!(granted, 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn elapsed_window_restarts_row(pool: PgPool) {
        sqlx::query(
            "INSERT INTO ip_usage_limits (ip_address, usage_count, created_at, updated_at) \
             VALUES ($1, 3, NOW() - INTERVAL '30 hours', NOW() - INTERVAL '30 hours')",
        )
        .bind("203.0.113.12")
        .execute(&pool)
        .await
        .unwrap();
        let store = PgUsageStore::new(pool);

        let record = store
            .upsert_or_increment("203.0.113.12", 3, DAY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.usage_count, 1);

        assert_eq!(store.delete("203.0.113.12").await.unwrap(), 1);
        assert!(store.fetch_latest("203.0.113.12").await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn zero_limit_writes_nothing(pool: PgPool) {
        let store = PgUsageStore::new(pool);
        assert!(store.upsert_or_increment("203.0.113.13", 0, DAY).await.unwrap().is_none());
        assert!(store.fetch_latest("203.0.113.13").await.unwrap().is_none());
    }
}
