use serde::Serialize;

/// 使用限制相关事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UsageEvent {
    Consumed { ip: String, usage_count: u32, remaining: u32 },
    Denied { ip: String, usage_count: u32 },
    Reset { ip: String, removed: u64 },
    StoreFailure { ip: String, code: String },
}

/// 事件上报接口，由调用方注入
pub trait UsageReporter: Send + Sync {
    fn report(&self, event: UsageEvent);
}

/// 默认实现，写入结构化日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl UsageReporter for TracingReporter {
    fn report(&self, event: UsageEvent) {
        match &event {
            UsageEvent::StoreFailure { ip, code } => {
                tracing::warn!(ip = %ip, code = %code, "Usage store failure")
            }
            UsageEvent::Denied { ip, usage_count } => {
                tracing::info!(ip = %ip, usage_count, "Usage limit reached")
            }
            _ => tracing::debug!(?event, "Usage event"),
        }
    }
}
