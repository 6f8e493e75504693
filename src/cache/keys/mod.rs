/// 缓存键模块
/// 提供各种缓存键生成函数

/// 使用计数缓存键前缀
const USAGE_PREFIX: &str = "usage:ip:";

/// 生成使用计数缓存键
pub fn usage_key(ip: &str) -> String {
    format!("{}{}", USAGE_PREFIX, ip)
}
