//! 进程内的提示词结果缓存
//!
//! 以规范化后提示词的 32 位多项式哈希为键，条目超过 TTL 视为不存在。
//! 容量满时按插入顺序淘汰最早的条目（不是 LRU）。每个进程各自持有一份，
//! 多实例之间不共享。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// 规范化提示词：去掉首尾空白，合并连续空白，转小写
pub fn normalize_prompt(prompt: &str) -> String {
    prompt
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// h = h * 31 + unit，按 UTF-16 码元计算，32 位回绕
pub fn prompt_hash(normalized: &str) -> u32 {
    normalized
        .encode_utf16()
        .fold(0u32, |h, unit| h.wrapping_mul(31).wrapping_add(u32::from(unit)))
}

#[derive(Debug, Clone)]
struct CacheEntry {
    normalized: String,
    result: String,
    inserted_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<u32, CacheEntry>,
    // 插入顺序，队首最旧
    order: VecDeque<u32>,
}

impl Inner {
    fn remove(&mut self, key: u32) {
        self.entries.remove(&key);
        self.order.retain(|k| *k != key);
    }
}

pub struct PromptCache {
    inner: Mutex<Inner>,
    ttl: chrono::Duration,
    capacity: usize,
}

impl PromptCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            capacity: capacity.max(1),
        }
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        entry
            .inserted_at
            .checked_add_signed(self.ttl)
            .is_some_and(|deadline| deadline < now)
    }

    pub fn get(&self, prompt: &str) -> Option<String> {
        self.get_at(prompt, Utc::now())
    }

    /// 查找缓存结果，过期条目在此处顺带删除
    pub fn get_at(&self, prompt: &str, now: DateTime<Utc>) -> Option<String> {
        let normalized = normalize_prompt(prompt);
        let key = prompt_hash(&normalized);
        let mut inner = self.inner.lock();

        let entry = inner.entries.get(&key)?;
        if self.is_expired(entry, now) {
            inner.remove(key);
            tracing::debug!(key, "Prompt cache entry expired");
            return None;
        }

        // 哈希碰撞时不返回别的提示词的结果
        if entry.normalized != normalized {
            tracing::debug!(key, "Prompt cache hash collision");
            return None;
        }

        Some(entry.result.clone())
    }

    pub fn set(&self, prompt: &str, result: impl Into<String>) {
        self.set_at(prompt, result, Utc::now());
    }

    pub fn set_at(&self, prompt: &str, result: impl Into<String>, now: DateTime<Utc>) {
        let normalized = normalize_prompt(prompt);
        let key = prompt_hash(&normalized);
        let entry = CacheEntry {
            normalized,
            result: result.into(),
            inserted_at: now,
        };

        let mut inner = self.inner.lock();

        // 覆盖已有键时保留原来的插入位置
        if let Some(existing) = inner.entries.get_mut(&key) {
            *existing = entry;
            return;
        }

        while inner.entries.len() >= self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            tracing::debug!(key = oldest, "Prompt cache evicted oldest entry");
        }

        inner.order.push_back(key);
        inner.entries.insert(key, entry);
    }

    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    /// 删除所有过期条目，返回删除数量
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();

        inner.entries.retain(|_, entry| {
            !entry
                .inserted_at
                .checked_add_signed(self.ttl)
                .is_some_and(|deadline| deadline < now)
        });
        let Inner { entries, order } = &mut *inner;
        order.retain(|k| entries.contains_key(k));

        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 启动后台清理任务，缓存被释放后任务自行退出
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 第一次 tick 立即返回
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.sweep_expired();
                if removed > 0 {
                    tracing::info!(removed, remaining = cache.len(), "Swept expired prompt cache entries");
                }
            }
        })
    }
}
