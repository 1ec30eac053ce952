//! Contract configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use usageledger_metering::NamespaceMap;

/// Settlement contract configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Party to namespace mapping used for metrics queries
    pub namespaces: NamespaceMap,
    /// did:key identities whose snapshots are accepted
    pub trusted_oracles: Vec<String>,
}

impl ContractConfig {
    /// Load configuration from `.env` and `USAGELEDGER_*` variables
    ///
    /// - `USAGELEDGER_DEFAULT_NAMESPACE`: namespace for unmapped parties
    /// - `USAGELEDGER_NAMESPACES`: `party=namespace` pairs, comma separated
    /// - `USAGELEDGER_TRUSTED_ORACLES`: oracle DIDs, comma separated
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Ok(ns) = std::env::var("USAGELEDGER_DEFAULT_NAMESPACE") {
            cfg.namespaces.default_namespace = ns;
        }
        if let Ok(pairs) = std::env::var("USAGELEDGER_NAMESPACES") {
            cfg.namespaces = parse_namespace_pairs(cfg.namespaces, &pairs)?;
        }
        if let Ok(dids) = std::env::var("USAGELEDGER_TRUSTED_ORACLES") {
            cfg.trusted_oracles = split_list(&dids);
        }

        Ok(cfg)
    }
}

fn parse_namespace_pairs(mut map: NamespaceMap, raw: &str) -> Result<NamespaceMap> {
    for pair in split_list(raw) {
        match pair.split_once('=') {
            Some((party, namespace)) if !party.trim().is_empty() && !namespace.trim().is_empty() => {
                map = map.with_override(party.trim(), namespace.trim());
            }
            _ => bail!("invalid USAGELEDGER_NAMESPACES entry: {pair}"),
        }
    }
    Ok(map)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
