use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};

use crate::cache::keys::usage_key;
use crate::cache::models::usage::CachedUsage;
use crate::error::StoreError;

/// 使用计数的快速缓存
///
/// 仅作为加速层，出错时调用方回退到计数存储。
#[async_trait]
pub trait UsageCache: Send + Sync {
    async fn get(&self, ip: &str) -> Result<Option<CachedUsage>, StoreError>;

    async fn set(&self, usage: &CachedUsage, ttl_secs: u64) -> Result<(), StoreError>;

    async fn invalidate(&self, ip: &str) -> Result<(), StoreError>;
}

/// 基于 Redis 的使用计数缓存
#[derive(Clone)]
pub struct RedisUsageCache {
    redis: Arc<RedisClient>,
}

impl RedisUsageCache {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl UsageCache for RedisUsageCache {
    async fn get(&self, ip: &str) -> Result<Option<CachedUsage>, StoreError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let result: Option<String> = conn.get(usage_key(ip)).await?;

        match result {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, usage: &CachedUsage, ttl_secs: u64) -> Result<(), StoreError> {
        // 过期时间为 0 时 SETEX 会报错，直接跳过
        if ttl_secs == 0 {
            return Ok(());
        }

        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let json = serde_json::to_string(usage)?;
        let _: () = conn.set_ex(usage_key(&usage.ip_address), json, ttl_secs).await?;

        Ok(())
    }

    async fn invalidate(&self, ip: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let _: () = conn.del(usage_key(ip)).await?;

        Ok(())
    }
}
