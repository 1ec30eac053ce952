//! Metrics gateway
//!
//! Read-only access to cumulative usage counters:
//! - MetricsSource: the adapter contract used by settlement and the oracle
//! - PrometheusGateway: HTTP adapter over the Prometheus query API
//! - InMemoryMetricsSource: fixed readings for local runs and tests

pub mod prometheus;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use usageledger_common::{MetricsError, Result, UsageReading};

pub use prometheus::{extract_scalar, PrometheusGateway};

/// Source of cumulative usage counters for a namespace
///
/// `as_of` is advisory: implementations forward it unmodified so a fixed
/// source answers the same window the same way.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Cumulative CPU usage in minutes
    async fn query_cumulative_cpu(&self, namespace: &str, as_of: i64) -> Result<f64>;

    /// Cumulative RAM usage in RAM-minutes
    async fn query_cumulative_ram(&self, namespace: &str, as_of: i64) -> Result<f64>;

    /// Both counters for one window, CPU first
    async fn read_usage(&self, namespace: &str, as_of: i64) -> Result<UsageReading> {
        let cpu = self.query_cumulative_cpu(namespace, as_of).await?;
        let ram = self.query_cumulative_ram(namespace, as_of).await?;
        Ok(UsageReading::new(cpu, ram))
    }
}

/// Metrics source backed by a map of namespace readings
///
/// Unknown namespaces read as zero. A configured failure is returned by every
/// query until cleared.
#[derive(Debug, Default)]
pub struct InMemoryMetricsSource {
    readings: RwLock<HashMap<String, UsageReading>>,
    failure: RwLock<Option<InjectedFailure>>,
    queries: AtomicU64,
}

/// Failure returned by [`InMemoryMetricsSource`] when set
#[derive(Debug, Clone, PartialEq)]
pub enum InjectedFailure {
    Unavailable(String),
    Parse(String),
}

impl InMemoryMetricsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cumulative counters reported for `namespace`
    pub fn set_reading(&self, namespace: &str, reading: UsageReading) {
        self.readings.write().insert(namespace.to_string(), reading);
    }

    pub fn fail_with(&self, failure: Option<InjectedFailure>) {
        *self.failure.write() = failure;
    }

    /// Number of counter queries served so far
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    fn lookup(&self, namespace: &str) -> Result<UsageReading> {
        self.queries.fetch_add(1, Ordering::Relaxed);

        if let Some(failure) = self.failure.read().clone() {
            return Err(match failure {
                InjectedFailure::Unavailable(reason) => MetricsError::Unavailable(reason),
                InjectedFailure::Parse(reason) => MetricsError::Parse(reason),
            }
            .into());
        }

        Ok(self
            .readings
            .read()
            .get(namespace)
            .copied()
            .unwrap_or_else(|| UsageReading::new(0.0, 0.0)))
    }
}

#[async_trait]
impl MetricsSource for InMemoryMetricsSource {
    async fn query_cumulative_cpu(&self, namespace: &str, _as_of: i64) -> Result<f64> {
        Ok(self.lookup(namespace)?.cpu_cumulative_minutes)
    }

    async fn query_cumulative_ram(&self, namespace: &str, _as_of: i64) -> Result<f64> {
        Ok(self.lookup(namespace)?.ram_cumulative_minutes)
    }
}
