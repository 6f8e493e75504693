use std::env;
use std::time::Duration;

/// 部署环境，决定客户端地址能否原样写入存储键和日志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    Local,
    Production,
}

impl Deployment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" | "staging" => Deployment::Production,
            _ => Deployment::Local,
        }
    }
}

/// 存储不可用时限流的放行策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPolicy {
    /// 存储出错时放行
    Open,
    /// 存储出错时拒绝
    Closed,
}

impl FailPolicy {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => FailPolicy::Open,
            _ => FailPolicy::Closed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub deployment: Deployment,
    pub usage_limit_max: u32,
    pub usage_limit_window_secs: u64,
    pub usage_limit_fail_policy: FailPolicy,
    pub prompt_cache_ttl_secs: u64,
    pub prompt_cache_capacity: usize,
    pub prompt_cache_sweep_secs: u64,
    pub ai_api_base: String,
    pub ai_api_key: Option<String>,
    pub ai_model: String,
    pub ai_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            redis_url: None,
            server_host: "0.0.0.0".into(),
            server_port: 3000,
            api_base_uri: "/api".into(),
            deployment: Deployment::Local,
            usage_limit_max: 3,
            usage_limit_window_secs: 24 * 3600,
            usage_limit_fail_policy: FailPolicy::Closed,
            prompt_cache_ttl_secs: 24 * 3600,
            prompt_cache_capacity: 100,
            prompt_cache_sweep_secs: 5 * 60,
            ai_api_base: "https://generativelanguage.googleapis.com".into(),
            ai_api_key: None,
            ai_model: "gemini-1.5-flash".into(),
            ai_timeout_secs: 30,
        }
    }
}

// 未设置的变量返回 None，非 UTF-8 的值视为配置错误
fn optional(key: &str) -> Result<Option<String>, env::VarError> {
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();

        // 时间类配置允许带 s 后缀，例如 "300s"
        let secs = |key: &str, default: u64| -> Result<u64, env::VarError> {
            Ok(optional(key)?
                .and_then(|v| v.trim().trim_end_matches('s').parse::<u64>().ok())
                .unwrap_or(default))
        };

        let mut api_base_uri = optional("API_BASE_URI")?.unwrap_or(defaults.api_base_uri);
        if !api_base_uri.starts_with('/') {
            api_base_uri.insert(0, '/');
        }

        Ok(Config {
            database_url: optional("DATABASE_URL")?,
            redis_url: optional("REDIS_URL")?,
            server_host: optional("SERVER_HOST")?.unwrap_or(defaults.server_host),
            server_port: optional("SERVER_PORT")?
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            api_base_uri,
            deployment: optional("APP_ENV")?
                .map(|v| Deployment::parse(&v))
                .unwrap_or(defaults.deployment),
            usage_limit_max: optional("USAGE_LIMIT_MAX")?
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.usage_limit_max),
            usage_limit_window_secs: secs("USAGE_LIMIT_WINDOW", defaults.usage_limit_window_secs)?,
            usage_limit_fail_policy: optional("USAGE_LIMIT_FAIL_POLICY")?
                .map(|v| FailPolicy::parse(&v))
                .unwrap_or(defaults.usage_limit_fail_policy),
            prompt_cache_ttl_secs: secs("PROMPT_CACHE_TTL", defaults.prompt_cache_ttl_secs)?,
            prompt_cache_capacity: optional("PROMPT_CACHE_CAPACITY")?
                .and_then(|v| v.parse().ok())
                .filter(|c: &usize| *c > 0)
                .unwrap_or(defaults.prompt_cache_capacity),
            prompt_cache_sweep_secs: secs(
                "PROMPT_CACHE_SWEEP_INTERVAL",
                defaults.prompt_cache_sweep_secs,
            )?,
            ai_api_base: optional("AI_API_BASE")?.unwrap_or(defaults.ai_api_base),
            ai_api_key: optional("AI_API_KEY")?,
            ai_model: optional("AI_MODEL")?.unwrap_or(defaults.ai_model),
            ai_timeout_secs: secs("AI_TIMEOUT", defaults.ai_timeout_secs)?,
        })
    }

    pub fn usage_limit_window(&self) -> Duration {
        Duration::from_secs(self.usage_limit_window_secs)
    }

    pub fn prompt_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.prompt_cache_ttl_secs)
    }

    pub fn prompt_cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.prompt_cache_sweep_secs.max(1))
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }
}
