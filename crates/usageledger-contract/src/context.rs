//! Transaction context
//!
//! Each contract invocation runs inside a context that supplies the
//! transaction id and the ledger view for that transaction.

use std::sync::Arc;

use uuid::Uuid;

use crate::ledger::LedgerStub;

/// Per-invocation handle handed to the contract by the host
pub trait TransactionContext: Send + Sync {
    /// Id of the current transaction
    fn tx_id(&self) -> &str;

    /// Ledger view of the current transaction
    fn stub(&self) -> &dyn LedgerStub;
}

/// Context over a shared ledger, used by in-process hosts and tests
#[derive(Clone)]
pub struct LedgerTransaction {
    tx_id: String,
    stub: Arc<dyn LedgerStub>,
}

impl LedgerTransaction {
    pub fn new(tx_id: impl Into<String>, stub: Arc<dyn LedgerStub>) -> Self {
        Self {
            tx_id: tx_id.into(),
            stub,
        }
    }

    /// Context with a fresh time-ordered transaction id
    pub fn begin(stub: Arc<dyn LedgerStub>) -> Self {
        Self::new(Uuid::now_v7().to_string(), stub)
    }
}

impl TransactionContext for LedgerTransaction {
    fn tx_id(&self) -> &str {
        &self.tx_id
    }

    fn stub(&self) -> &dyn LedgerStub {
        self.stub.as_ref()
    }
}

impl std::fmt::Debug for LedgerTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerTransaction")
            .field("tx_id", &self.tx_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;

    #[test]
    fn test_begin_assigns_distinct_ids() {
        let ledger: Arc<dyn LedgerStub> = Arc::new(InMemoryLedger::new());
        let a = LedgerTransaction::begin(ledger.clone());
        let b = LedgerTransaction::begin(ledger);
        assert_ne!(a.tx_id(), b.tx_id());
        assert!(Uuid::parse_str(a.tx_id()).is_ok());
    }
}
