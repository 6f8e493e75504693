use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use usage_gate::{
    AppState, ai,
    cache::{PromptCache, RedisUsageCache},
    config::Config,
    database::{self, MemoryUsageStore, PgUsageStore, UsageStore},
    router::create_router,
    usage::{UsagePolicy, UsageLimitService},
};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        deployment = ?config.deployment,
        max_usage = config.usage_limit_max,
        fail_policy = ?config.usage_limit_fail_policy,
        "Configuration loaded"
    );

    // 设置计数存储，未配置数据库时退回进程内存储
    let store: Arc<dyn UsageStore> = match &config.database_url {
        Some(url) => {
            let pool = database::connect(url)
                .await
                .expect("Failed to connect to Postgres");
            Arc::new(PgUsageStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, usage counts are kept in memory");
            let store = Arc::new(MemoryUsageStore::new());
            let _purger = store.spawn_purger(
                config.usage_limit_window(),
                config.prompt_cache_sweep_interval(),
            );
            store as Arc<dyn UsageStore>
        }
    };

    let mut usage = UsageLimitService::new(store, UsagePolicy::from_config(&config));

    // 设置 Redis 快速缓存
    if let Some(url) = &config.redis_url {
        let redis_client =
            redis::Client::open(url.as_str()).expect("Failed to create Redis client");
        usage = usage.with_cache(Arc::new(RedisUsageCache::new(Arc::new(redis_client))));
    }

    // 提示词缓存及其定期清理任务
    let prompt_cache = Arc::new(PromptCache::new(
        config.prompt_cache_ttl(),
        config.prompt_cache_capacity,
    ));
    let _sweeper = prompt_cache.spawn_sweeper(config.prompt_cache_sweep_interval());

    let generator = ai::from_config(&config).expect("Failed to create AI client");

    // 设置应用状态
    let state = AppState {
        config: Arc::new(config),
        usage: Arc::new(usage),
        prompt_cache,
        generator,
    };

    let app = create_router(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
