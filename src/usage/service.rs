use std::sync::Arc;

use chrono::Utc;

use super::{ConsumeOutcome, ResetOutcome, UsageLimitResult, UsagePolicy};
use crate::cache::{CachedUsage, UsageCache};
use crate::config::FailPolicy;
use crate::database::{UsageRecord, UsageStore};
use crate::error::UsageError;
use crate::events::{TracingReporter, UsageEvent, UsageReporter};

/// 使用限制服务，进程启动时构造一次，通过 `Arc` 共享
pub struct UsageLimitService {
    store: Arc<dyn UsageStore>,
    cache: Option<Arc<dyn UsageCache>>,
    reporter: Arc<dyn UsageReporter>,
    policy: UsagePolicy,
}

impl UsageLimitService {
    pub fn new(store: Arc<dyn UsageStore>, policy: UsagePolicy) -> Self {
        Self {
            store,
            cache: None,
            reporter: Arc::new(TracingReporter),
            policy,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn UsageCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn UsageReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn policy(&self) -> &UsagePolicy {
        &self.policy
    }

    fn window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.policy.window).unwrap_or(chrono::Duration::MAX)
    }

    fn evaluate(
        &self,
        usage_count: u32,
        is_from_cache: bool,
        error: Option<UsageError>,
        record: Option<UsageRecord>,
    ) -> UsageLimitResult {
        let fail_open = self.policy.fail_policy == FailPolicy::Open;
        UsageLimitResult {
            can_use: usage_count < self.policy.max_usage && (error.is_none() || fail_open),
            remaining_count: self.policy.max_usage.saturating_sub(usage_count),
            usage_count,
            is_from_cache,
            error,
            record,
        }
    }

    fn store_failure(&self, ip: &str, error: UsageError) -> UsageError {
        self.reporter.report(UsageEvent::StoreFailure {
            ip: ip.to_string(),
            code: error.code.clone(),
        });
        error
    }

    /// 只读检查，不修改存储也不回填缓存
    pub async fn check_usage_limit(&self, ip: &str) -> UsageLimitResult {
        let now = Utc::now();

        if let Some(cache) = &self.cache {
            match cache.get(ip).await {
                Ok(Some(cached)) if !cached.is_expired(now) => {
                    let record = cached.to_record();
                    return self.evaluate(cached.usage_count, true, None, Some(record));
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(ip, error = %e, "Usage cache read failed, using store"),
            }
        }

        match self.store.fetch_latest(ip).await {
            Ok(record) => {
                let usage_count = record
                    .as_ref()
                    .map_or(0, |r| r.effective_count(self.window(), now));
                self.evaluate(usage_count, false, None, record)
            }
            Err(e) => {
                let error = self.store_failure(ip, UsageError::from(&e));
                self.evaluate(0, false, Some(error), None)
            }
        }
    }

    /// 扣减一次额度，检查与自增在存储中原子完成
    pub async fn consume(&self, ip: &str) -> ConsumeOutcome {
        let max = self.policy.max_usage;

        match self
            .store
            .upsert_or_increment(ip, max, self.policy.window)
            .await
        {
            Ok(Some(record)) => {
                let usage_count = u32::try_from(record.usage_count).unwrap_or(0);

                if let Some(cache) = &self.cache {
                    let cached = CachedUsage::from_record(&record, self.window());
                    let ttl = cached.ttl_secs(Utc::now());
                    if let Err(e) = cache.set(&cached, ttl).await {
                        tracing::warn!(ip, error = %e, "Failed to write usage cache");
                    }
                }

                let result = self.evaluate(usage_count, false, None, Some(record));
                self.reporter.report(UsageEvent::Consumed {
                    ip: ip.to_string(),
                    usage_count,
                    remaining: result.remaining_count,
                });
                ConsumeOutcome {
                    permitted: true,
                    result,
                }
            }
            Ok(None) => {
                self.reporter.report(UsageEvent::Denied {
                    ip: ip.to_string(),
                    usage_count: max,
                });
                ConsumeOutcome {
                    permitted: false,
                    result: self.evaluate(max, false, None, None),
                }
            }
            Err(e) => {
                let error = self.store_failure(ip, UsageError::from(&e));
                ConsumeOutcome {
                    permitted: self.policy.fail_policy == FailPolicy::Open,
                    result: self.evaluate(0, false, Some(error), None),
                }
            }
        }
    }

    /// 删除该 IP 的计数，同时清掉快速缓存
    pub async fn reset_usage(&self, ip: &str) -> ResetOutcome {
        match self.store.delete(ip).await {
            Ok(removed) => {
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.invalidate(ip).await {
                        tracing::warn!(ip, error = %e, "Failed to invalidate usage cache");
                    }
                }
                self.reporter.report(UsageEvent::Reset {
                    ip: ip.to_string(),
                    removed,
                });
                ResetOutcome {
                    success: true,
                    removed,
                    error: None,
                }
            }
            Err(e) => ResetOutcome {
                success: false,
                removed: 0,
                error: Some(self.store_failure(ip, UsageError::from(&e))),
            },
        }
    }
}
