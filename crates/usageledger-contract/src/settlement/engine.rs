//! Settlement engine
//!
//! Two entry points share one commit step:
//!
//! ```text
//! settle:           find_unpaid -> metrics source @ window(now) -> valid counters -> commit
//! settle_attested:  verify oracle signature -> valid counters -> find_unpaid -> staleness -> commit
//! ```
//!
//! `commit` declines when neither counter grew and otherwise writes a new
//! unpaid slice carrying the absolute counters, keyed by `(owner, consumer)`
//! so it replaces the previous one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use usageledger_common::crypto::verify_snapshot;
use usageledger_common::{
    window_timestamp, MetricsError, Result, SettlementError, SignedUsageSnapshot, UsageReading,
    UsageSlice,
};
use usageledger_metering::{MetricsSource, NamespaceMap};

use super::SettlementMetrics;
use crate::context::TransactionContext;
use crate::repository::UsageRepository;

/// Validates and records usage settlements
pub struct SettlementEngine<M> {
    metrics_source: Arc<M>,
    namespaces: NamespaceMap,
    trusted_oracles: Vec<String>,
    stats: SettlementMetrics,
}

impl<M: MetricsSource> SettlementEngine<M> {
    pub fn new(
        metrics_source: Arc<M>,
        namespaces: NamespaceMap,
        trusted_oracles: Vec<String>,
    ) -> Self {
        Self {
            metrics_source,
            namespaces,
            trusted_oracles,
            stats: SettlementMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &SettlementMetrics {
        &self.stats
    }

    pub fn namespaces(&self) -> &NamespaceMap {
        &self.namespaces
    }

    /// Settle against the live metrics source at the current minute
    pub async fn settle(
        &self,
        ctx: &dyn TransactionContext,
        owner: &str,
        consumer: &str,
    ) -> Result<UsageSlice> {
        self.settle_at(ctx, owner, consumer, Utc::now()).await
    }

    /// Settle against the live metrics source at the minute containing `now`
    #[instrument(skip(self, ctx), fields(tx_id = %ctx.tx_id()))]
    pub async fn settle_at(
        &self,
        ctx: &dyn TransactionContext,
        owner: &str,
        consumer: &str,
        now: DateTime<Utc>,
    ) -> Result<UsageSlice> {
        let outcome = self.settle_live(ctx, owner, consumer, window_timestamp(now)).await;
        self.stats.record(&outcome, false);
        outcome
    }

    /// Settle from an oracle-signed snapshot
    ///
    /// The snapshot fixes both the counters and the window, so replaying the
    /// same transaction writes the same record.
    #[instrument(
        skip(self, ctx, signed),
        fields(
            tx_id = %ctx.tx_id(),
            oracle = %signed.oracle_did,
            window = signed.snapshot.window_timestamp
        )
    )]
    pub async fn settle_attested(
        &self,
        ctx: &dyn TransactionContext,
        owner: &str,
        consumer: &str,
        signed: &SignedUsageSnapshot,
    ) -> Result<UsageSlice> {
        let outcome = self.apply_snapshot(ctx, owner, consumer, signed).await;
        self.stats.record(&outcome, true);
        outcome
    }

    async fn settle_live(
        &self,
        ctx: &dyn TransactionContext,
        owner: &str,
        consumer: &str,
        window: i64,
    ) -> Result<UsageSlice> {
        let repo = UsageRepository::new(ctx.stub());
        let recorded = repo
            .find_unpaid(owner, consumer)
            .await?
            .unwrap_or_else(|| UsageSlice::baseline(ctx.tx_id(), owner, consumer));

        let namespace = self.namespaces.resolve(owner);
        let reading = self.metrics_source.read_usage(namespace, window).await?;
        if !reading.is_valid_cumulative() {
            warn!(
                namespace,
                cpu = reading.cpu_cumulative_minutes,
                ram = reading.ram_cumulative_minutes,
                "Rejected metrics reading"
            );
            return Err(MetricsError::Parse(format!(
                "namespace {} reported invalid cumulative counters cpu={} ram={}",
                namespace, reading.cpu_cumulative_minutes, reading.ram_cumulative_minutes
            ))
            .into());
        }

        self.commit(&repo, ctx.tx_id(), &recorded, reading, window).await
    }

    async fn apply_snapshot(
        &self,
        ctx: &dyn TransactionContext,
        owner: &str,
        consumer: &str,
        signed: &SignedUsageSnapshot,
    ) -> Result<UsageSlice> {
        verify_snapshot(signed, &self.trusted_oracles)?;

        let snapshot = &signed.snapshot;
        if snapshot.owner != owner || snapshot.consumer != consumer {
            return Err(SettlementError::PartyMismatch {
                owner: owner.to_string(),
                consumer: consumer.to_string(),
                snapshot_owner: snapshot.owner.clone(),
                snapshot_consumer: snapshot.consumer.clone(),
            }
            .into());
        }

        let reading = snapshot.reading();
        if !reading.is_valid_cumulative() {
            return Err(SettlementError::InvalidReading {
                cpu: reading.cpu_cumulative_minutes,
                ram: reading.ram_cumulative_minutes,
            }
            .into());
        }

        let expected = self.namespaces.resolve(owner);
        if snapshot.namespace != expected {
            return Err(SettlementError::NamespaceMismatch {
                expected: expected.to_string(),
                actual: snapshot.namespace.clone(),
            }
            .into());
        }

        let repo = UsageRepository::new(ctx.stub());
        let recorded = repo
            .find_unpaid(owner, consumer)
            .await?
            .unwrap_or_else(|| UsageSlice::baseline(ctx.tx_id(), owner, consumer));

        if snapshot.window_timestamp < recorded.timestamp {
            return Err(SettlementError::StaleSnapshot {
                window: snapshot.window_timestamp,
                recorded: recorded.timestamp,
            }
            .into());
        }

        self.commit(&repo, ctx.tx_id(), &recorded, reading, snapshot.window_timestamp)
            .await
    }

    async fn commit(
        &self,
        repo: &UsageRepository<'_>,
        tx_id: &str,
        recorded: &UsageSlice,
        reading: UsageReading,
        window: i64,
    ) -> Result<UsageSlice> {
        let delta = reading.delta_from(recorded);
        if !delta.has_usage() {
            warn!(
                owner = %recorded.owner,
                consumer = %recorded.consumer,
                delta_cpu = delta.cpu,
                delta_ram = delta.ram,
                "No new usage since last settlement"
            );
            return Err(SettlementError::NoUsageToSettle {
                owner: recorded.owner.clone(),
                consumer: recorded.consumer.clone(),
                delta_cpu: delta.cpu,
                delta_ram: delta.ram,
            }
            .into());
        }

        let slice =
            UsageSlice::settled(tx_id, &recorded.owner, &recorded.consumer, reading, window);
        repo.put(&slice).await?;

        info!(
            owner = %slice.owner,
            consumer = %slice.consumer,
            cpu_minutes = slice.cpu_cumulative_minutes,
            ram_minutes = slice.ram_cumulative_minutes,
            delta_cpu = delta.cpu,
            delta_ram = delta.ram,
            window,
            "Usage settled"
        );
        Ok(slice)
    }
}
