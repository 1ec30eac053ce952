//! Usage slice repository
//!
//! Typed access to usage slices over a [`LedgerStub`]. Slices live under the
//! composite key `(UsageSlice, owner, consumer, paid)`, so the unpaid slice of
//! a pair is found with a partial-key scan on `(owner, consumer, "false")`.

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, error, instrument};
use usageledger_common::{LedgerError, Result, UsageSlice};

use crate::ledger::{LedgerStub, UsageSliceKey};

/// Usage slice reads and writes within one transaction
pub struct UsageRepository<'a> {
    stub: &'a dyn LedgerStub,
}

impl<'a> UsageRepository<'a> {
    pub fn new(stub: &'a dyn LedgerStub) -> Self {
        Self { stub }
    }

    /// The unique unpaid slice of a pair, if any
    ///
    /// Fails with [`LedgerError::MultipleUnpaidRecords`] when the scan yields
    /// more than one record. Stops reading after the second match unless it
    /// has to count the rest for the error.
    #[instrument(skip(self))]
    pub async fn find_unpaid(&self, owner: &str, consumer: &str) -> Result<Option<UsageSlice>> {
        let prefix = UsageSliceKey::unpaid_prefix(owner, consumer)?;
        let mut entries = self.stub.scan_prefix(&prefix);

        let first = match entries.next().await {
            Some(entry) => entry?,
            None => {
                debug!("No unpaid usage slice");
                return Ok(None);
            }
        };

        if let Some(second) = entries.next().await {
            second?;
            let count = 2 + entries.count().await;
            error!(count, "Ledger holds more than one unpaid usage slice");
            return Err(LedgerError::MultipleUnpaidRecords {
                owner: owner.to_string(),
                consumer: consumer.to_string(),
                count,
            }
            .into());
        }

        let slice = UsageSlice::from_json_bytes(&first.value)?;
        debug!(id = %slice.id, "Found unpaid usage slice");
        Ok(Some(slice))
    }

    /// Write a slice under its composite key
    #[instrument(skip(self, slice), fields(owner = %slice.owner, consumer = %slice.consumer))]
    pub async fn put(&self, slice: &UsageSlice) -> Result<()> {
        let key = UsageSliceKey::for_slice(slice).to_ledger_key()?;
        let value = slice.to_json_bytes()?;
        self.stub.put_state(&key, value).await
    }

    /// Every usage slice on the ledger, in key order
    pub fn scan_all(&self) -> BoxStream<'a, Result<UsageSlice>> {
        let prefix = match UsageSliceKey::namespace_prefix() {
            Ok(prefix) => prefix,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        let stub: &'a dyn LedgerStub = self.stub;
        stub.scan_prefix(&prefix)
            .map(|entry| entry.and_then(|entry| UsageSlice::from_json_bytes(&entry.value)))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{create_composite_key, InMemoryLedger};
    use futures::TryStreamExt;
    use usageledger_common::{UsageLedgerError, UsageReading, USAGE_SLICE_OBJECT_TYPE};

    fn slice(owner: &str, consumer: &str, cpu: f64) -> UsageSlice {
        UsageSlice::settled("tx", owner, consumer, UsageReading::new(cpu, 1.0), 60)
    }

    #[tokio::test]
    async fn test_find_unpaid_empty() {
        let ledger = InMemoryLedger::new();
        let repo = UsageRepository::new(&ledger);
        assert!(repo.find_unpaid("org1", "org2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_then_find() {
        let ledger = InMemoryLedger::new();
        let repo = UsageRepository::new(&ledger);

        repo.put(&slice("org1", "org2", 5.0)).await.unwrap();
        repo.put(&slice("org1", "org3", 7.0)).await.unwrap();

        let found = repo.find_unpaid("org1", "org2").await.unwrap().unwrap();
        assert_eq!(found.cpu_cumulative_minutes, 5.0);
        assert!(repo.find_unpaid("org2", "org1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paid_slice_is_not_unpaid() {
        let ledger = InMemoryLedger::new();
        let repo = UsageRepository::new(&ledger);

        let mut paid = slice("org1", "org2", 5.0);
        paid.paid = true;
        repo.put(&paid).await.unwrap();

        assert!(repo.find_unpaid("org1", "org2").await.unwrap().is_none());
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_find_unpaid_detects_duplicates() {
        let ledger = InMemoryLedger::new();
        let repo = UsageRepository::new(&ledger);
        repo.put(&slice("org1", "org2", 5.0)).await.unwrap();

        let stray = create_composite_key(
            USAGE_SLICE_OBJECT_TYPE,
            &["org1", "org2", "false", "legacy"],
        )
        .unwrap();
        ledger
            .put_state(&stray, slice("org1", "org2", 3.0).to_json_bytes().unwrap())
            .await
            .unwrap();

        let err = repo.find_unpaid("org1", "org2").await.unwrap_err();
        assert!(matches!(
            err,
            UsageLedgerError::Ledger(LedgerError::MultipleUnpaidRecords { count: 2, .. })
        ));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_find_unpaid_rejects_undecodable_value() {
        let ledger = InMemoryLedger::new();
        let key = UsageSliceKey::new("org1", "org2", false).to_ledger_key().unwrap();
        ledger.put_state(&key, b"not json".to_vec()).await.unwrap();

        let err = UsageRepository::new(&ledger)
            .find_unpaid("org1", "org2")
            .await
            .unwrap_err();
        assert!(matches!(err, UsageLedgerError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_scan_all_ignores_other_object_types() {
        let ledger = InMemoryLedger::new();
        let repo = UsageRepository::new(&ledger);
        repo.put(&slice("org1", "org2", 1.0)).await.unwrap();
        repo.put(&slice("org2", "org1", 2.0)).await.unwrap();

        let other = create_composite_key("Invoice", &["org1"]).unwrap();
        ledger.put_state(&other, b"{}".to_vec()).await.unwrap();

        let all: Vec<UsageSlice> = repo.scan_all().try_collect().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].owner, "org1");
        assert_eq!(all[1].owner, "org2");
    }
}
