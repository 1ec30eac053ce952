//! Prometheus HTTP gateway
//!
//! Issues instant queries against `GET {base}/query` and reads the scalar at
//! `data.result[0].value[1]` of the JSON envelope. Two query shapes are used:
//! - CPU: `sum(container_cpu_user_seconds_total{namespace="<ns>"})`
//! - RAM: `sum(sum_over_time(container_memory_usage_bytes{namespace="<ns>"}[<range>]))`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use usageledger_common::{MetricsError, Result, UsageLedgerError};

use super::MetricsSource;
use crate::config::GatewayConfig;

/// Metrics gateway over the Prometheus query API
#[derive(Debug, Clone)]
pub struct PrometheusGateway {
    client: Client,
    query_endpoint: String,
    config: GatewayConfig,
}

impl PrometheusGateway {
    /// Create a gateway; the timeout in `config` bounds every request
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| UsageLedgerError::Config(e.to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| UsageLedgerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let query_endpoint = format!("{}query", config.normalized_base_uri());

        Ok(Self {
            client,
            query_endpoint,
            config,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// PromQL for cumulative CPU-seconds in a namespace
    pub fn cpu_query(namespace: &str) -> String {
        format!(
            "sum(container_cpu_user_seconds_total{{namespace=\"{}\"}})",
            escape_label_value(namespace)
        )
    }

    /// PromQL for the memory-usage integral over a namespace's history
    pub fn ram_query(namespace: &str, range: &str) -> String {
        format!(
            "sum(sum_over_time(container_memory_usage_bytes{{namespace=\"{}\"}}[{}]))",
            escape_label_value(namespace),
            range
        )
    }

    /// Run an instant query and return the raw scalar
    #[instrument(skip(self))]
    async fn query_scalar(&self, promql: &str, as_of: i64) -> Result<f64> {
        let response = self
            .client
            .get(&self.query_endpoint)
            .query(&[("query", promql.to_string()), ("time", as_of.to_string())])
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint = %self.query_endpoint, "Metrics request failed: {}", e);
                MetricsError::Unavailable(format!("request to {} failed: {}", self.query_endpoint, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint = %self.query_endpoint, %status, "Metrics source returned error status");
            return Err(MetricsError::Unavailable(format!("metrics source returned {}", status)).into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| MetricsError::Unavailable(format!("failed to read response body: {}", e)))?;

        let envelope: Value = serde_json::from_slice(&body)
            .map_err(|e| MetricsError::Parse(format!("response is not JSON: {}", e)))?;

        let value = extract_scalar(&envelope)?;
        debug!(value, "Metrics scalar extracted");
        Ok(value)
    }
}

#[async_trait]
impl MetricsSource for PrometheusGateway {
    async fn query_cumulative_cpu(&self, namespace: &str, as_of: i64) -> Result<f64> {
        let cpu_seconds = self.query_scalar(&Self::cpu_query(namespace), as_of).await?;
        Ok(cpu_seconds / self.config.cpu_seconds_per_unit)
    }

    async fn query_cumulative_ram(&self, namespace: &str, as_of: i64) -> Result<f64> {
        let query = Self::ram_query(namespace, &self.config.ram_history_range);
        let raw = self.query_scalar(&query, as_of).await?;
        Ok(raw / self.config.ram_scale_factor)
    }
}

/// Read the scalar at `data.result[0].value[1]`
///
/// Prometheus encodes sample values as strings; plain numbers are accepted
/// too. Counters must be finite and non-negative.
pub fn extract_scalar(envelope: &Value) -> Result<f64> {
    if let Some(status) = envelope.get("status").and_then(Value::as_str) {
        if status != "success" {
            let reason = envelope
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(MetricsError::Unavailable(format!("query failed: {}", reason)).into());
        }
    }

    let raw = envelope
        .pointer("/data/result/0/value/1")
        .ok_or_else(|| MetricsError::Parse("no sample at data.result[0].value[1]".into()))?;

    let value = match raw {
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| MetricsError::Parse(format!("sample {:?} is not a number", s)))?,
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| MetricsError::Parse(format!("sample {} is not representable", n)))?,
        other => {
            return Err(MetricsError::Parse(format!("unexpected sample type: {}", other)).into())
        }
    };

    if !value.is_finite() || value < 0.0 {
        return Err(MetricsError::Parse(format!("sample {} is not a valid cumulative counter", value)).into());
    }
    Ok(value)
}

/// Escape a PromQL label value for use inside double quotes
fn escape_label_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
