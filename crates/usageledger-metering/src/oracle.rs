//! Snapshot oracle
//!
//! Reads cumulative counters off the ledger path and signs them, so that
//! settlement can verify a fixed snapshot instead of querying a live source
//! from inside a replayed transaction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use usageledger_common::crypto::{did_for_signing_key, sign_snapshot};
use usageledger_common::{
    window_timestamp, MetricsError, Result, SignedUsageSnapshot, UsageSnapshot,
};

use crate::config::{NamespaceMap, OracleConfig};
use crate::gateway::MetricsSource;

/// Oracle metrics
#[derive(Debug, Default)]
pub struct OracleMetrics {
    pub snapshots_signed: AtomicU64,
    pub snapshots_failed: AtomicU64,
}

/// Off-ledger process that fetches and signs usage snapshots
pub struct SnapshotOracle<S> {
    source: Arc<S>,
    signing_key: SigningKey,
    namespaces: NamespaceMap,
    metrics: OracleMetrics,
}

impl<S: MetricsSource + 'static> SnapshotOracle<S> {
    pub fn new(source: Arc<S>, signing_key: SigningKey, namespaces: NamespaceMap) -> Self {
        Self {
            source,
            signing_key,
            namespaces,
            metrics: OracleMetrics::default(),
        }
    }

    /// did:key under which this oracle signs
    pub fn did(&self) -> String {
        did_for_signing_key(&self.signing_key)
    }

    pub fn metrics(&self) -> &OracleMetrics {
        &self.metrics
    }

    /// Read and sign the counters of `owner`'s namespace for the minute containing `now`
    #[instrument(skip(self))]
    pub async fn observe(
        &self,
        owner: &str,
        consumer: &str,
        now: DateTime<Utc>,
    ) -> Result<SignedUsageSnapshot> {
        let window = window_timestamp(now);
        let namespace = self.namespaces.resolve(owner);

        let reading = self
            .source
            .read_usage(namespace, window)
            .await
            .inspect_err(|_| {
                self.metrics.snapshots_failed.fetch_add(1, Ordering::Relaxed);
            })?;

        if !reading.is_valid_cumulative() {
            self.metrics.snapshots_failed.fetch_add(1, Ordering::Relaxed);
            return Err(MetricsError::Parse(format!(
                "namespace {} reported invalid cumulative counters cpu={} ram={}",
                namespace, reading.cpu_cumulative_minutes, reading.ram_cumulative_minutes
            ))
            .into());
        }

        let snapshot = UsageSnapshot::new(owner, consumer, namespace, window, reading);
        let signed = sign_snapshot(&self.signing_key, snapshot)?;

        self.metrics.snapshots_signed.fetch_add(1, Ordering::Relaxed);
        debug!(owner, consumer, window, "Signed usage snapshot");
        Ok(signed)
    }

    /// Observe every configured pair on each tick and publish the snapshots
    ///
    /// Stops when the receiving side of `sink` is dropped.
    pub fn start(
        self: Arc<Self>,
        config: OracleConfig,
        sink: mpsc::Sender<SignedUsageSnapshot>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_millis(config.interval_ms));

            loop {
                interval.tick().await;
                let now = Utc::now();

                for (owner, consumer) in &config.pairs {
                    match self.observe(owner, consumer, now).await {
                        Ok(signed) => {
                            if sink.send(signed).await.is_err() {
                                info!("Snapshot receiver closed, oracle exiting");
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(owner = %owner, consumer = %consumer, "Snapshot failed: {}", e);
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{InMemoryMetricsSource, InjectedFailure};
    use chrono::TimeZone;
    use rand::rngs::OsRng;
    use usageledger_common::crypto::verify_snapshot;
    use usageledger_common::UsageReading;

    fn oracle(source: Arc<InMemoryMetricsSource>) -> SnapshotOracle<InMemoryMetricsSource> {
        SnapshotOracle::new(
            source,
            SigningKey::generate(&mut OsRng),
            NamespaceMap::default().with_override("org1", "tenant-a"),
        )
    }

    #[tokio::test]
    async fn test_observe_signs_owner_namespace() {
        let source = Arc::new(InMemoryMetricsSource::new());
        source.set_reading("tenant-a", UsageReading::new(415.24, 145.02));
        let oracle = oracle(source);

        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 34, 56).unwrap();
        let signed = oracle.observe("org1", "org2", now).await.unwrap();

        assert_eq!(signed.snapshot.namespace, "tenant-a");
        assert_eq!(signed.snapshot.window_timestamp, now.timestamp() - 56);
        assert_eq!(signed.snapshot.reading(), UsageReading::new(415.24, 145.02));
        assert_eq!(signed.oracle_did, oracle.did());
        assert!(verify_snapshot(&signed, &[oracle.did()]).is_ok());
        assert_eq!(oracle.metrics().snapshots_signed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_observe_propagates_metrics_failure() {
        let source = Arc::new(InMemoryMetricsSource::new());
        source.fail_with(Some(InjectedFailure::Unavailable("down".into())));
        let oracle = oracle(source);

        assert!(oracle.observe("org1", "org2", Utc::now()).await.is_err());
        assert_eq!(oracle.metrics().snapshots_failed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_observe_refuses_to_sign_invalid_counters() {
        let source = Arc::new(InMemoryMetricsSource::new());
        source.set_reading("tenant-a", UsageReading::new(1.0, f64::INFINITY));
        let oracle = oracle(source);

        assert!(oracle.observe("org1", "org2", Utc::now()).await.is_err());
        assert_eq!(oracle.metrics().snapshots_signed.load(Ordering::Relaxed), 0);
        assert_eq!(oracle.metrics().snapshots_failed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_start_publishes_configured_pairs() {
        let source = Arc::new(InMemoryMetricsSource::new());
        source.set_reading("tenant-a", UsageReading::new(1.0, 2.0));
        let oracle = Arc::new(oracle(source));

        let (tx, mut rx) = mpsc::channel(8);
        let config = OracleConfig {
            interval_ms: 10,
            pairs: vec![
                ("org1".to_string(), "org2".to_string()),
                ("org1".to_string(), "org3".to_string()),
            ],
        };
        let handle = oracle.clone().start(config, tx);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.snapshot.consumer, "org2");
        assert_eq!(second.snapshot.consumer, "org3");

        drop(rx);
        handle.await.unwrap();
    }
}
