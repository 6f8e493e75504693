// 使用计数存储
pub mod memory;
pub mod usage;

pub use memory::MemoryUsageStore;
pub use usage::{PgUsageStore, UsageStore};
