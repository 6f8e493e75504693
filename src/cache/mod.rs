// 缓存模块
// 包含使用计数的 Redis 快速缓存和进程内的提示词缓存

pub mod keys;
pub mod models;
pub mod operations;
pub mod prompt;

// 重新导出常用类型，方便其他模块使用
pub use models::CachedUsage;
pub use operations::{RedisUsageCache, UsageCache};
pub use prompt::PromptCache;
