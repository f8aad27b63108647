use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::config::ProofPolicy;
use crate::errors::{LedgerError, Result};
use crate::ledger::LedgerSnapshot;
use crate::statement::Statement;
use crate::types::ContractId;

/// persistence for contracts and their rows
///
/// `commit` replaces the whole snapshot for one contract and must be atomic:
/// lock state is only monotonic if every save is a read-modify-write that
/// no other save can interleave with.
pub trait LedgerStore {
    /// rows ordered by sequence number, children by line number
    fn load(&self, contract_id: ContractId) -> Result<LedgerSnapshot>;

    fn commit(&self, snapshot: LedgerSnapshot) -> Result<()>;
}

/// a ledger store held in memory, one mutex for the whole store
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    ledgers: Mutex<HashMap<ContractId, LedgerSnapshot>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// register a contract and return its id
    pub fn insert(&self, snapshot: LedgerSnapshot) -> Result<ContractId> {
        let id = snapshot.contract.id;
        self.commit(snapshot)?;
        Ok(id)
    }

    pub fn contains(&self, contract_id: ContractId) -> bool {
        self.guard().map(|m| m.contains_key(&contract_id)).unwrap_or(false)
    }

    fn guard(&self) -> Result<MutexGuard<'_, HashMap<ContractId, LedgerSnapshot>>> {
        self.ledgers.lock().map_err(|_| LedgerError::Storage {
            message: "ledger store lock poisoned".to_string(),
        })
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load(&self, contract_id: ContractId) -> Result<LedgerSnapshot> {
        let ledgers = self.guard()?;
        let mut snapshot = ledgers
            .get(&contract_id)
            .cloned()
            .ok_or(LedgerError::ContractNotFound { id: contract_id })?;
        snapshot.sort();
        Ok(snapshot)
    }

    fn commit(&self, mut snapshot: LedgerSnapshot) -> Result<()> {
        snapshot.sort();
        let mut ledgers = self.guard()?;
        debug!(contract = %snapshot.contract.id, rows = snapshot.rows.len(), "ledger committed");
        ledgers.insert(snapshot.contract.id, snapshot);
        Ok(())
    }
}

/// a payment proof as received from the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ProofUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// binary storage for payment proofs; the ledger only keeps the reference
pub trait FileStore {
    /// store the upload and return its public reference
    fn put(&self, contract_id: ContractId, upload: &ProofUpload) -> Result<String>;

    fn remove(&self, reference: &str) -> Result<()>;
}

/// file store held in memory
#[derive(Debug)]
pub struct InMemoryFileStore {
    policy: ProofPolicy,
    files: Mutex<HashMap<String, Vec<u8>>>,
    stamp: AtomicU64,
}

impl InMemoryFileStore {
    pub fn new(policy: ProofPolicy) -> Self {
        Self {
            policy,
            files: Mutex::new(HashMap::new()),
            stamp: AtomicU64::new(1),
        }
    }

    pub fn get(&self, reference: &str) -> Option<Vec<u8>> {
        self.files.lock().ok().and_then(|f| f.get(reference).cloned())
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.get(reference).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn guard(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.files.lock().map_err(|_| LedgerError::FileStore {
            message: "file store lock poisoned".to_string(),
        })
    }
}

impl Default for InMemoryFileStore {
    fn default() -> Self {
        Self::new(ProofPolicy::default())
    }
}

impl FileStore for InMemoryFileStore {
    fn put(&self, contract_id: ContractId, upload: &ProofUpload) -> Result<String> {
        let stamp = self.stamp.fetch_add(1, Ordering::SeqCst);
        let ext = self.policy.extension_for(&upload.file_name, &upload.content_type);
        let reference = format!(
            "{}/contract-{}-{}{}",
            self.policy.public_prefix.trim_end_matches('/'),
            contract_id,
            stamp,
            ext
        );
        self.guard()?.insert(reference.clone(), upload.bytes.clone());
        Ok(reference)
    }

    fn remove(&self, reference: &str) -> Result<()> {
        match self.guard()?.remove(reference) {
            Some(_) => Ok(()),
            None => Err(LedgerError::FileStore {
                message: format!("no stored file at {}", reference),
            }),
        }
    }
}

/// turns a finished statement into a printable document
pub trait StatementRenderer {
    fn render(&self, statement: &Statement) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::DateOnly;
    use crate::decimal::Money;
    use crate::ledger::{BillingRow, Contract};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn snapshot() -> LedgerSnapshot {
        let contract = Contract::new(Money::from_major(1_000), Money::ZERO, dec!(0), 2, None).unwrap();
        let due = DateOnly::from_ymd(2025, 1, 1).unwrap();
        let mut second = BillingRow::new(2, "2nd INSTALLMENT".to_string(), Money::from_major(500), due);
        second.add_child(Money::from_major(10), due);
        second.add_child(Money::from_major(20), due);
        second.children.reverse();
        let first = BillingRow::new(1, "1st INSTALLMENT".to_string(), Money::from_major(500), due);
        LedgerSnapshot {
            contract,
            rows: vec![second, first],
        }
    }

    #[test]
    fn test_load_returns_ordered_rows() {
        let store = InMemoryLedgerStore::new();
        let id = store.insert(snapshot()).unwrap();

        let loaded = store.load(id).unwrap();

        assert_eq!(loaded.rows[0].sequence, 1);
        assert_eq!(loaded.rows[1].sequence, 2);
        assert_eq!(loaded.rows[1].children[0].line, 1);
        assert_eq!(loaded.rows[1].children[1].line, 2);
    }

    #[test]
    fn test_unknown_contract() {
        let store = InMemoryLedgerStore::new();
        let err = store.load(Uuid::new_v4()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_commit_replaces_snapshot() {
        let store = InMemoryLedgerStore::new();
        let mut snap = snapshot();
        let id = store.insert(snap.clone()).unwrap();

        snap.rows.pop();
        store.commit(snap).unwrap();

        assert_eq!(store.load(id).unwrap().rows.len(), 1);
    }

    #[test]
    fn test_file_store_naming() {
        let files = InMemoryFileStore::default();
        let contract_id = Uuid::new_v4();

        let first = files
            .put(contract_id, &ProofUpload::new("Receipt.JPEG", "image/jpeg", vec![1, 2, 3]))
            .unwrap();
        let second = files
            .put(contract_id, &ProofUpload::new("scan", "application/pdf", vec![4]))
            .unwrap();

        assert_eq!(first, format!("/uploads/payment-proofs/contract-{}-1.jpeg", contract_id));
        assert_eq!(second, format!("/uploads/payment-proofs/contract-{}-2.pdf", contract_id));
        assert_eq!(files.get(&first), Some(vec![1, 2, 3]));
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_file_store_remove() {
        let files = InMemoryFileStore::default();
        let reference = files
            .put(Uuid::new_v4(), &ProofUpload::new("a.png", "image/png", vec![0]))
            .unwrap();

        files.remove(&reference).unwrap();

        assert!(files.is_empty());
        assert!(files.remove(&reference).is_err());
    }
}
