//! Durable storage for ledger records
//!
//! Every append and every status change writes a full record. Replaying the
//! records and keeping the last one per id (in first-seen order) restores the
//! ledger exactly.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use epo_core::{LedgerError, TxId};

use crate::Transaction;

/// Append-only record sink
pub trait LedgerStore: Send {
    /// Replay all records, folded to one entry per id in first-append order
    fn load(&mut self) -> Result<Vec<Transaction>, LedgerError>;

    /// Durably write one record. Must be atomic: either the whole record lands or none of it.
    fn write(&mut self, record: &Transaction) -> Result<(), LedgerError>;
}

fn fold_records(records: impl IntoIterator<Item = Transaction>) -> Vec<Transaction> {
    let mut order: Vec<Transaction> = Vec::new();
    let mut index: HashMap<TxId, usize> = HashMap::new();
    for record in records {
        match index.get(&record.id) {
            Some(&i) => order[i] = record,
            None => {
                index.insert(record.id.clone(), order.len());
                order.push(record);
            }
        }
    }
    order
}

/// Volatile store, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<Transaction>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of raw records written (appends plus updates)
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

impl LedgerStore for MemoryStore {
    fn load(&mut self) -> Result<Vec<Transaction>, LedgerError> {
        Ok(fold_records(self.records.iter().cloned()))
    }

    fn write(&mut self, record: &Transaction) -> Result<(), LedgerError> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// JSON-lines file store. One record per line, fsynced per write.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    file: File,
}

impl JsonlStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonlStore {
    /// Replay the file. An unterminated, unparseable last line is an append
    /// torn by a crash: it is cut off and the rest of the log is kept. Any
    /// other unparseable line is corruption.
    fn load(&mut self) -> Result<Vec<Transaction>, LedgerError> {
        let raw = std::fs::read(&self.path)?;
        let mut records = Vec::new();
        let mut offset = 0;
        let mut line_no = 0;
        while offset < raw.len() {
            line_no += 1;
            let newline = raw[offset..].iter().position(|&b| b == b'\n');
            let end = newline.map_or(raw.len(), |p| offset + p);
            let line = &raw[offset..end];
            let next = newline.map_or(raw.len(), |_| end + 1);

            if line.iter().all(u8::is_ascii_whitespace) {
                offset = next;
                continue;
            }
            match serde_json::from_slice::<Transaction>(line) {
                Ok(record) => {
                    if newline.is_none() {
                        // Record landed but its newline did not
                        self.file.write_all(b"\n")?;
                        self.file.sync_data()?;
                    }
                    records.push(record);
                }
                Err(e) if newline.is_none() => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = line_no,
                        "Dropping torn ledger record: {}",
                        e
                    );
                    self.file.set_len(offset as u64)?;
                    self.file.sync_data()?;
                }
                Err(e) => {
                    return Err(LedgerError::Corrupt {
                        line: line_no,
                        message: e.to_string(),
                    })
                }
            }
            offset = next;
        }
        Ok(fold_records(records))
    }

    fn write(&mut self, record: &Transaction) -> Result<(), LedgerError> {
        let mut line = serde_json::to_vec(record).map_err(|e| {
            LedgerError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        line.push(b'\n');
        // Single write of the whole line keeps appends from interleaving
        self.file.write_all(&line)?;
        self.file.sync_data()?;
        Ok(())
    }
}
