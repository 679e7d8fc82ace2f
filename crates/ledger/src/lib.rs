//! ledger: Append-only log of executed trades
//!
//! Entries are keyed by transaction id and kept in append order. A `pending`
//! entry may be recorded before the transfer is confirmed and then moved to
//! `completed` or `failed` exactly once. Positions are never cached; every
//! query folds the log.

pub mod store;
pub mod transaction;

use std::collections::HashMap;

use epo_core::{Address, Direction, LedgerError, TxId};

pub use store::{JsonlStore, LedgerStore, MemoryStore};
pub use transaction::{Transaction, TxStatus, UserPosition};

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// The trade log and its in-memory index
pub struct TransactionLedger {
    store: Box<dyn LedgerStore>,
    entries: Vec<Transaction>,
    index: HashMap<TxId, usize>,
}

impl TransactionLedger {
    /// Open a ledger, replaying everything the store holds
    pub fn open(mut store: Box<dyn LedgerStore>) -> Result<Self> {
        let entries = store.load()?;
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, tx)| (tx.id.clone(), i))
            .collect();
        tracing::info!(entries = entries.len(), "Ledger opened");
        Ok(Self {
            store,
            entries,
            index,
        })
    }

    /// Ledger backed by a [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self {
            store: Box::new(MemoryStore::new()),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Record a new trade. Ids are unique for the life of the ledger.
    pub fn append(&mut self, tx: Transaction) -> Result<()> {
        if self.index.contains_key(&tx.id) {
            return Err(LedgerError::DuplicateId { id: tx.id });
        }
        self.store.write(&tx)?;
        tracing::debug!(id = %tx.id, status = tx.status.as_str(), "ledger append");
        self.index.insert(tx.id.clone(), self.entries.len());
        self.entries.push(tx);
        Ok(())
    }

    /// Record the chain reference of a submitted transfer on a pending entry
    pub fn attach_reference(&mut self, id: &TxId, chain_tx_ref: String) -> Result<()> {
        let i = self.pending_index(id)?;
        self.entries[i].chain_tx_ref = Some(chain_tx_ref);
        self.store.write(&self.entries[i])?;
        tracing::debug!(id = %id, "ledger reference attached");
        Ok(())
    }

    fn pending_index(&self, id: &TxId) -> Result<usize> {
        let &i = self
            .index
            .get(id)
            .ok_or_else(|| LedgerError::NotFound { id: id.clone() })?;
        if self.entries[i].status.is_final() {
            return Err(LedgerError::AlreadyFinal { id: id.clone() });
        }
        Ok(i)
    }

    /// Move a pending entry to its terminal status.
    ///
    /// The in-memory transition stands even when the store write fails; the
    /// error then only reports that the record was not persisted.
    pub fn finalize(
        &mut self,
        id: &TxId,
        status: TxStatus,
        chain_tx_ref: Option<String>,
        failure_reason: Option<String>,
    ) -> Result<&Transaction> {
        let i = self.pending_index(id)?;
        if !status.is_final() {
            return Err(LedgerError::AlreadyFinal { id: id.clone() });
        }

        let entry = &mut self.entries[i];
        entry.status = status;
        if chain_tx_ref.is_some() {
            entry.chain_tx_ref = chain_tx_ref;
        }
        entry.failure_reason = failure_reason;

        if let Err(e) = self.store.write(&self.entries[i]) {
            tracing::error!(
                id = %id,
                status = status.as_str(),
                "Ledger write failed, entry kept in memory only: {}",
                e
            );
            return Err(e);
        }
        tracing::debug!(id = %id, status = status.as_str(), "ledger finalize");
        Ok(&self.entries[i])
    }

    pub fn get(&self, id: &TxId) -> Option<&Transaction> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    /// All entries in append order
    pub fn all(&self) -> &[Transaction] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// An account's entries in append order
    pub fn transactions_for(&self, account: &Address) -> Vec<&Transaction> {
        let key = account.normalized();
        self.entries
            .iter()
            .filter(|tx| tx.account.normalized() == key)
            .collect()
    }

    /// Fresh fold of an account's history
    pub fn position_for(&self, account: &Address) -> UserPosition {
        UserPosition::fold(&account.normalized(), self.transactions_for(account))
    }

    /// Whether the account has an entry still awaiting confirmation
    pub fn has_pending(&self, account: &Address) -> bool {
        self.transactions_for(account)
            .iter()
            .any(|tx| tx.status == TxStatus::Pending)
    }

    /// Net tokens issued by completed trades (buys minus sells)
    pub fn net_issued(&self) -> f64 {
        self.entries
            .iter()
            .filter(|tx| tx.status == TxStatus::Completed)
            .map(|tx| match tx.direction {
                Direction::Buy => tx.output_amount,
                Direction::Sell => -tx.input_amount,
            })
            .sum()
    }
}
