//! Scripted wallet and ledger store for router and executor tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chain_gateway::{ChainGateway, Result, TransferRef, TransferStatus};
use epo_core::{Address, ChainId, GatewayError, LedgerError, NetworkParams, TokenSymbol};
use ledger::{LedgerStore, MemoryStore, Transaction};

#[derive(Debug, Clone)]
pub(crate) enum Settlement {
    Confirm,
    Revert,
    SubmitError(GatewayError),
    ConfirmError(GatewayError),
    Never,
}

pub(crate) struct ScriptedGateway {
    active: Mutex<ChainId>,
    known: Mutex<HashSet<ChainId>>,
    pub reject_switch: AtomicBool,
    /// Accept switch requests without actually moving
    pub ignore_switch: AtomicBool,
    pub switch_delay: Mutex<Option<Duration>>,
    pub settlement: Mutex<Settlement>,
    pub switch_calls: AtomicUsize,
    pub add_calls: AtomicUsize,
    pub transfers: Mutex<Vec<(Address, f64, TokenSymbol)>>,
}

impl ScriptedGateway {
    pub fn on_chain(active: ChainId, known: &[ChainId]) -> Self {
        Self {
            active: Mutex::new(active),
            known: Mutex::new(known.iter().copied().collect()),
            reject_switch: AtomicBool::new(false),
            ignore_switch: AtomicBool::new(false),
            switch_delay: Mutex::new(None),
            settlement: Mutex::new(Settlement::Confirm),
            switch_calls: AtomicUsize::new(0),
            add_calls: AtomicUsize::new(0),
            transfers: Mutex::new(Vec::new()),
        }
    }

    pub fn active(&self) -> ChainId {
        *self.active.lock().unwrap()
    }

    pub fn settle_with(&self, settlement: Settlement) {
        *self.settlement.lock().unwrap() = settlement;
    }

    pub fn switch_count(&self) -> usize {
        self.switch_calls.load(Ordering::SeqCst)
    }

    pub fn add_count(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainGateway for ScriptedGateway {
    async fn active_network(&self) -> Result<ChainId> {
        Ok(self.active())
    }

    async fn request_network_switch(&self, chain_id: ChainId) -> Result<()> {
        self.switch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.switch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject_switch.load(Ordering::SeqCst) {
            return Err(GatewayError::UserRejected);
        }
        if !self.known.lock().unwrap().contains(&chain_id) {
            return Err(GatewayError::NetworkUnknown);
        }
        if !self.ignore_switch.load(Ordering::SeqCst) {
            *self.active.lock().unwrap() = chain_id;
        }
        Ok(())
    }

    async fn request_add_network(&self, params: &NetworkParams) -> Result<()> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.known.lock().unwrap().insert(params.chain_id);
        Ok(())
    }

    async fn submit_transfer(
        &self,
        to: &Address,
        amount: f64,
        token: &TokenSymbol,
    ) -> Result<TransferRef> {
        let settlement = self.settlement.lock().unwrap().clone();
        if let Settlement::SubmitError(e) = settlement {
            return Err(e);
        }
        let mut transfers = self.transfers.lock().unwrap();
        transfers.push((to.clone(), amount, token.clone()));
        Ok(TransferRef::new(format!("0x{:064x}", transfers.len())))
    }

    async fn await_confirmation(&self, _transfer: &TransferRef) -> Result<TransferStatus> {
        let settlement = self.settlement.lock().unwrap().clone();
        match settlement {
            Settlement::Confirm => Ok(TransferStatus::Confirmed),
            Settlement::Revert => Ok(TransferStatus::Failed),
            Settlement::ConfirmError(e) | Settlement::SubmitError(e) => Err(e),
            Settlement::Never => std::future::pending().await,
        }
    }
}

/// In-memory store whose `n`-th write (1-based) fails
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    writes: usize,
    fail_on: usize,
}

impl FlakyStore {
    pub fn failing_on(fail_on: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            writes: 0,
            fail_on,
        }
    }
}

impl LedgerStore for FlakyStore {
    fn load(&mut self) -> std::result::Result<Vec<Transaction>, LedgerError> {
        self.inner.load()
    }

    fn write(&mut self, record: &Transaction) -> std::result::Result<(), LedgerError> {
        self.writes += 1;
        if self.writes == self.fail_on {
            return Err(LedgerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.write(record)
    }
}
