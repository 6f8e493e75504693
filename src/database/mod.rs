// 数据库模块
// 包含使用计数的实体定义和存储实现

pub mod models; // 数据库实体定义
pub mod operations; // 存储操作实现

// 重新导出常用类型，方便其他模块使用
pub use models::usage::UsageRecord;
pub use operations::{MemoryUsageStore, PgUsageStore, UsageStore};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// 建立连接池并执行内嵌的迁移
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
