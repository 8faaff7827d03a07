use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub generations_requested: u64,
    pub provider_attempts: u64,
    pub provider_failures: u64,
    pub parse_failures: u64,
    pub provider_successes: u64,
    pub fallbacks_used: u64,
    pub unconfigured_failures: u64,
}

pub trait Metrics: Send + Sync {
    fn inc_generation_requested(&self);
    fn inc_provider_attempt(&self);
    fn inc_provider_failure(&self);
    fn inc_parse_failure(&self);
    fn inc_provider_success(&self);
    fn inc_fallback_used(&self);
    fn inc_unconfigured_failure(&self);
    fn snapshot(&self) -> MetricsSnapshot;
}

#[derive(Default)]
pub struct InMemoryMetrics {
    generations_requested: AtomicU64,
    provider_attempts: AtomicU64,
    provider_failures: AtomicU64,
    parse_failures: AtomicU64,
    provider_successes: AtomicU64,
    fallbacks_used: AtomicU64,
    unconfigured_failures: AtomicU64,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metrics for InMemoryMetrics {
    fn inc_generation_requested(&self) {
        self.generations_requested.fetch_add(1, Ordering::Relaxed);
    }
    fn inc_provider_attempt(&self) {
        self.provider_attempts.fetch_add(1, Ordering::Relaxed);
    }
    fn inc_provider_failure(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }
    fn inc_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }
    fn inc_provider_success(&self) {
        self.provider_successes.fetch_add(1, Ordering::Relaxed);
    }
    fn inc_fallback_used(&self) {
        self.fallbacks_used.fetch_add(1, Ordering::Relaxed);
    }
    fn inc_unconfigured_failure(&self) {
        self.unconfigured_failures.fetch_add(1, Ordering::Relaxed);
    }
    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            generations_requested: self.generations_requested.load(Ordering::Relaxed),
            provider_attempts: self.provider_attempts.load(Ordering::Relaxed),
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            provider_successes: self.provider_successes.load(Ordering::Relaxed),
            fallbacks_used: self.fallbacks_used.load(Ordering::Relaxed),
            unconfigured_failures: self.unconfigured_failures.load(Ordering::Relaxed),
        }
    }
}
