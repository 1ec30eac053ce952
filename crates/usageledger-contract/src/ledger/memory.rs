//! In-memory ledger
//!
//! Ordered key-value store backing tests and single-process deployments.
//! Scans walk the map one entry at a time, taking the read lock per step, so
//! a consumer that stops early never reads further than it asked for.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use tracing::{debug, instrument};
use usageledger_common::{LedgerError, Result};

use super::{LedgerEntry, LedgerStub};

/// BTreeMap-backed [`LedgerStub`]
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    writes: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with an I/O error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful puts and deletes
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Io("ledger unavailable".to_string()).into());
        }
        Ok(())
    }

    fn next_entry(&self, prefix: &str, lower: Bound<String>) -> Option<LedgerEntry> {
        let entries = self.entries.read();
        entries
            .range((lower, Bound::Unbounded))
            .next()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| LedgerEntry {
                key: key.clone(),
                value: value.clone(),
            })
    }
}

#[async_trait]
impl LedgerStub for InMemoryLedger {
    async fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_available()?;
        Ok(self.entries.read().get(key).cloned())
    }

    #[instrument(skip(self, value), fields(len = value.len()))]
    async fn put_state(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.check_available()?;
        self.entries.write().insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!("State written");
        Ok(())
    }

    async fn delete_state(&self, key: &str) -> Result<()> {
        self.check_available()?;
        if self.entries.write().remove(key).is_some() {
            self.writes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> BoxStream<'_, Result<LedgerEntry>> {
        if let Err(e) = self.check_available() {
            return stream::once(async move { Err(e) }).boxed();
        }

        let prefix = prefix.to_string();
        let start = Bound::Included(prefix.clone());

        stream::unfold(start, move |lower| {
            let next = self.next_entry(&prefix, lower).map(|entry| {
                let cursor = Bound::Excluded(entry.key.clone());
                (Ok(entry), cursor)
            });
            futures::future::ready(next)
        })
        .boxed()
    }
}
