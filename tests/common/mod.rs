#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, Response},
};
use serde_json::Value;
use usage_gate::{
    AppState,
    ai::{AiError, PromptGenerator},
    cache::PromptCache,
    config::Config,
    database::{MemoryUsageStore, UsageRecord, UsageStore},
    error::StoreError,
    router::create_router,
    usage::{UsageLimitService, UsagePolicy},
};

/// 返回固定前缀的生成器，记录调用次数
#[derive(Default)]
pub struct EchoGenerator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl PromptGenerator for EchoGenerator {
    async fn optimize(&self, prompt: &str) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("Optimized: {}", prompt))
    }
}

impl EchoGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// 所有操作都失败的存储
pub struct BrokenStore;

#[async_trait]
impl UsageStore for BrokenStore {
    async fn fetch_latest(&self, _ip: &str) -> Result<Option<UsageRecord>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn upsert_or_increment(
        &self,
        _ip: &str,
        _limit: u32,
        _window: Duration,
    ) -> Result<Option<UsageRecord>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn delete(&self, _ip: &str) -> Result<u64, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryUsageStore>,
    pub generator: Arc<EchoGenerator>,
}

pub fn test_app_with(config: Config, store: Arc<dyn UsageStore>) -> Router {
    let usage = UsageLimitService::new(store, UsagePolicy::from_config(&config));
    let state = AppState {
        prompt_cache: Arc::new(PromptCache::new(
            config.prompt_cache_ttl(),
            config.prompt_cache_capacity,
        )),
        config: Arc::new(config),
        usage: Arc::new(usage),
        generator: Arc::new(EchoGenerator::default()),
    };
    create_router(state)
}

pub fn test_app(config: Config) -> TestApp {
    let store = Arc::new(MemoryUsageStore::new());
    let generator = Arc::new(EchoGenerator::default());
    let usage = UsageLimitService::new(store.clone(), UsagePolicy::from_config(&config));
    let state = AppState {
        prompt_cache: Arc::new(PromptCache::new(
            config.prompt_cache_ttl(),
            config.prompt_cache_capacity,
        )),
        config: Arc::new(config),
        usage: Arc::new(usage),
        generator: generator.clone(),
    };

    TestApp {
        router: create_router(state),
        store,
        generator,
    }
}

pub fn request(method: Method, uri: &str, client_ip: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", client_ip);

    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
