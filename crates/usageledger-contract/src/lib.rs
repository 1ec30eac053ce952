//! # UsageLedger Contract
//!
//! Settlement contract recording compute usage between an owner and a
//! consumer on a key-value ledger.
//!
//! ## Components
//!
//! - **Ledger**: [`LedgerStub`] abstraction, composite keys, in-memory store
//! - **Repository**: typed usage slice access and the unpaid-slice lookup
//! - **Settlement**: live and oracle-attested settlement
//! - **Query**: ledger-wide listings
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        UsageContract                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │ SettlementEngine │──│  Repository  │──│   LedgerStub   │  │
//! │  │                  │  │ (composite   │  │ (per-tx view)  │  │
//! │  └────────┬─────────┘  │    keys)     │  └────────────────┘  │
//! │           │            └──────────────┘                      │
//! │  ┌────────┴─────────┐                                        │
//! │  │  MetricsSource   │  live Prometheus or signed snapshots   │
//! │  └──────────────────┘                                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod context;
pub mod ledger;
pub mod query;
pub mod repository;
pub mod settlement;

pub use config::ContractConfig;
pub use context::{LedgerTransaction, TransactionContext};
pub use ledger::{InMemoryLedger, LedgerEntry, LedgerStub, UsageSliceKey};
pub use query::UsageQueryService;
pub use repository::UsageRepository;
pub use settlement::{SettlementEngine, SettlementMetrics, SettlementStats};

use std::sync::Arc;

use tracing::info;
use usageledger_common::{Result, SignedUsageSnapshot, UsageSlice};
use usageledger_metering::MetricsSource;

/// Usage settlement contract
///
/// Stateless between invocations: every call receives the ledger view of its
/// transaction through a [`TransactionContext`].
pub struct UsageContract<M> {
    engine: SettlementEngine<M>,
}

impl<M: MetricsSource> UsageContract<M> {
    /// Create a contract reading live counters from `metrics_source`
    pub fn new(metrics_source: Arc<M>, config: ContractConfig) -> Self {
        info!(
            default_namespace = %config.namespaces.default_namespace,
            overrides = config.namespaces.overrides.len(),
            trusted_oracles = config.trusted_oracles.len(),
            "Usage contract initialized"
        );
        Self {
            engine: SettlementEngine::new(
                metrics_source,
                config.namespaces,
                config.trusted_oracles,
            ),
        }
    }

    /// Record the consumer's current cumulative usage of the owner's namespace
    ///
    /// Declines with `NoUsageToSettle` when neither counter grew. Any failure
    /// leaves the ledger unchanged.
    pub async fn settle(
        &self,
        ctx: &dyn TransactionContext,
        owner: &str,
        consumer: &str,
    ) -> Result<()> {
        self.engine.settle(ctx, owner, consumer).await.map(|_| ())
    }

    /// Record usage from an oracle-signed snapshot
    pub async fn settle_attested(
        &self,
        ctx: &dyn TransactionContext,
        owner: &str,
        consumer: &str,
        snapshot: &SignedUsageSnapshot,
    ) -> Result<()> {
        self.engine
            .settle_attested(ctx, owner, consumer, snapshot)
            .await
            .map(|_| ())
    }

    /// The unpaid usage slice of a pair, if one has been recorded
    pub async fn read_unpaid(
        &self,
        ctx: &dyn TransactionContext,
        owner: &str,
        consumer: &str,
    ) -> Result<Option<UsageSlice>> {
        UsageRepository::new(ctx.stub()).find_unpaid(owner, consumer).await
    }

    /// Every usage slice on the ledger
    pub async fn list_all(&self, ctx: &dyn TransactionContext) -> Result<Vec<UsageSlice>> {
        UsageQueryService::list_all(ctx).await
    }

    /// Get the settlement engine
    pub fn engine(&self) -> &SettlementEngine<M> {
        &self.engine
    }

    /// Get settlement counters
    pub fn stats(&self) -> SettlementStats {
        self.engine.metrics().snapshot()
    }
}
