//! # UsageLedger Metering
//!
//! Access to cumulative compute usage for settlement.
//!
//! ## Units
//!
//! ```text
//! cpu_minutes = sum(container_cpu_user_seconds_total) / cpu_seconds_per_unit
//! ram_minutes = sum(sum_over_time(container_memory_usage_bytes[history])) / ram_scale_factor
//! ```
//!
//! Both are cumulative over the namespace's observed history; settlement
//! compares them against the last recorded totals.

pub mod config;
pub mod gateway;
pub mod oracle;

pub use config::{GatewayConfig, NamespaceMap, OracleConfig};
pub use gateway::{InMemoryMetricsSource, InjectedFailure, MetricsSource, PrometheusGateway};
pub use oracle::{OracleMetrics, SnapshotOracle};
