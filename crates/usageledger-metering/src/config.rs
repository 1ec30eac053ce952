//! Metering configuration

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use usageledger_common::DEFAULT_NAMESPACE;

/// Prometheus gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Prometheus HTTP API root, e.g. `http://prometheus:9090/api/v1/`
    pub base_uri: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// CPU-seconds per reported CPU unit (60 = minutes)
    pub cpu_seconds_per_unit: f64,
    /// Divisor turning summed memory samples into RAM-minutes
    pub ram_scale_factor: f64,
    /// Range selector covering the namespace's full history
    pub ram_history_range: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_uri: "http://localhost:9090/api/v1/".to_string(),
            timeout_ms: 5000,
            cpu_seconds_per_unit: 60.0,
            ram_scale_factor: 1_000_000.0,
            ram_history_range: "35y".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from `.env` and `USAGELEDGER_PROMETHEUS_*` variables
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Ok(uri) = std::env::var("USAGELEDGER_PROMETHEUS_URI") {
            cfg.base_uri = uri;
        }
        if let Ok(val) = std::env::var("USAGELEDGER_PROMETHEUS_TIMEOUT_MS") {
            cfg.timeout_ms = val
                .parse()
                .with_context(|| format!("invalid USAGELEDGER_PROMETHEUS_TIMEOUT_MS: {val}"))?;
        }
        if let Ok(val) = std::env::var("USAGELEDGER_PROMETHEUS_CPU_SECONDS_PER_UNIT") {
            cfg.cpu_seconds_per_unit =
                parse_divisor("USAGELEDGER_PROMETHEUS_CPU_SECONDS_PER_UNIT", &val)?;
        }
        if let Ok(val) = std::env::var("USAGELEDGER_PROMETHEUS_RAM_SCALE") {
            cfg.ram_scale_factor = parse_divisor("USAGELEDGER_PROMETHEUS_RAM_SCALE", &val)?;
        }
        if let Ok(range) = std::env::var("USAGELEDGER_PROMETHEUS_RAM_RANGE") {
            cfg.ram_history_range = range;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Check that both unit divisors are finite and positive
    pub fn validate(&self) -> Result<()> {
        check_divisor("cpu_seconds_per_unit", self.cpu_seconds_per_unit)?;
        check_divisor("ram_scale_factor", self.ram_scale_factor)?;
        Ok(())
    }

    /// Base URI with a guaranteed trailing slash
    pub fn normalized_base_uri(&self) -> String {
        if self.base_uri.ends_with('/') {
            self.base_uri.clone()
        } else {
            format!("{}/", self.base_uri)
        }
    }
}

fn parse_divisor(var: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid {var}: {raw}"))?;
    check_divisor(var, value)?;
    Ok(value)
}

fn check_divisor(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        bail!("{name} must be a finite number greater than zero, got {value}");
    }
    Ok(())
}

/// Maps a party to the namespace its workloads run in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceMap {
    pub default_namespace: String,
    pub overrides: HashMap<String, String>,
}

impl Default for NamespaceMap {
    fn default() -> Self {
        Self {
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            overrides: HashMap::new(),
        }
    }
}

impl NamespaceMap {
    pub fn with_override(mut self, party: &str, namespace: &str) -> Self {
        self.overrides.insert(party.to_string(), namespace.to_string());
        self
    }

    pub fn resolve(&self, party: &str) -> &str {
        self.overrides
            .get(party)
            .map(String::as_str)
            .unwrap_or(&self.default_namespace)
    }
}

/// Snapshot oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Interval between snapshot rounds in milliseconds
    pub interval_ms: u64,
    /// (owner, consumer) pairs to observe each round
    pub pairs: Vec<(String, String)>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            pairs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_resolution() {
        let map = NamespaceMap::default().with_override("org1", "tenant-a");
        assert_eq!(map.resolve("org1"), "tenant-a");
        assert_eq!(map.resolve("org9"), DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_divisors_must_be_positive_and_finite() {
        assert_eq!(parse_divisor("USAGELEDGER_PROMETHEUS_RAM_SCALE", "1000000").unwrap(), 1e6);
        assert_eq!(parse_divisor("CPU_SECONDS_PER_UNIT", " 60 ").unwrap(), 60.0);

        for bad in ["0", "-1", "NaN", "inf", "abc"] {
            assert!(parse_divisor("RAM_SCALE", bad).is_err(), "{bad}");
            assert!(parse_divisor("CPU_SECONDS_PER_UNIT", bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_validate_rejects_zero_divisors() {
        assert!(GatewayConfig::default().validate().is_ok());

        let mut cfg = GatewayConfig::default();
        cfg.cpu_seconds_per_unit = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = GatewayConfig::default();
        cfg.ram_scale_factor = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_base_uri_normalization() {
        let mut cfg = GatewayConfig::default();
        cfg.base_uri = "http://prom:9090/api/v1".to_string();
        assert_eq!(cfg.normalized_base_uri(), "http://prom:9090/api/v1/");

        cfg.base_uri = "http://prom:9090/api/v1/".to_string();
        assert_eq!(cfg.normalized_base_uri(), "http://prom:9090/api/v1/");
    }
}
