//! Ledger storage
//!
//! The settlement contract sees the ledger only through [`LedgerStub`]: a
//! key-value store with point reads and writes plus ordered prefix scans.

pub mod composite_key;
pub mod memory;

pub use composite_key::{create_composite_key, split_composite_key, UsageSliceKey};
pub use memory::InMemoryLedger;

use async_trait::async_trait;
use futures::stream::BoxStream;
use usageledger_common::Result;

/// One key-value pair yielded by a prefix scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub key: String,
    pub value: Vec<u8>,
}

/// Transactional key-value view of the ledger
#[async_trait]
pub trait LedgerStub: Send + Sync {
    /// Read a single key
    async fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a single key, replacing any previous value
    async fn put_state(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove a single key
    async fn delete_state(&self, key: &str) -> Result<()>;

    /// Iterate entries whose key starts with `prefix`, in key order
    ///
    /// Entries are produced lazily; dropping the stream ends the scan.
    fn scan_prefix(&self, prefix: &str) -> BoxStream<'_, Result<LedgerEntry>>;
}
