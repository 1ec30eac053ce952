//! Read-only usage queries

use futures::stream::BoxStream;
use futures::TryStreamExt;
use tracing::{debug, instrument};
use usageledger_common::{Result, UsageSlice};

use crate::context::TransactionContext;
use crate::repository::UsageRepository;

/// Ledger-wide usage listings
pub struct UsageQueryService;

impl UsageQueryService {
    /// Stream every usage slice, paid or not, in key order
    pub fn stream_all(ctx: &dyn TransactionContext) -> BoxStream<'_, Result<UsageSlice>> {
        UsageRepository::new(ctx.stub()).scan_all()
    }

    /// Collect every usage slice
    ///
    /// Fails on the first record that cannot be read or decoded.
    #[instrument(skip(ctx), fields(tx_id = %ctx.tx_id()))]
    pub async fn list_all(ctx: &dyn TransactionContext) -> Result<Vec<UsageSlice>> {
        let slices: Vec<UsageSlice> = Self::stream_all(ctx).try_collect().await?;
        debug!(count = slices.len(), "Listed usage slices");
        Ok(slices)
    }
}
