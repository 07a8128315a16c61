use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Cid;
use crate::transaction::collection::TransactionCollection;

/// Transaction id generator
static TRANSACTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Undefined,
    Created,
    Running,
    Committed,
    Aborted,
}

/// Hints given to the outermost transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionHints {
    /// keep every lock until the outermost transaction finishes; `unlock` is ignored
    pub lock_entirely: bool,
    /// take no locks in `begin`; each operation locks for itself
    pub lock_never: bool,
    /// the transaction wraps exactly one operation
    pub single_operation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    pub hints: TransactionHints,
    /// lock timeout, the configured one when unset
    pub timeout: Option<Duration>,
    pub wait_for_sync: bool,
    /// a logical transaction never takes locks
    pub is_real: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        TransactionOptions {
            hints: TransactionHints::default(),
            timeout: None,
            wait_for_sync: false,
            is_real: true,
        }
    }
}

/// The state shared by a transaction and every scope embedded in it
pub(crate) struct TransactionState {
    pub id: u64,
    pub status: TransactionStatus,
    /// number of open embedded scopes
    pub nesting: usize,
    pub hints: TransactionHints,
    pub timeout: Duration,
    pub wait_for_sync: bool,
    pub is_real: bool,
    /// sorted by collection id, the order locks are taken in
    pub collections: Vec<TransactionCollection>,
}

impl TransactionState {
    pub fn new(options: TransactionOptions, default_timeout: Duration) -> Self {
        TransactionState {
            id: TRANSACTION_ID_COUNTER.fetch_add(1, Ordering::SeqCst),
            status: TransactionStatus::Undefined,
            nesting: 0,
            hints: options.hints,
            timeout: options.timeout.unwrap_or(default_timeout),
            wait_for_sync: options.wait_for_sync,
            is_real: options.is_real,
            collections: Vec::new(),
        }
    }

    pub fn position(&self, cid: Cid) -> std::result::Result<usize, usize> {
        self.collections.binary_search_by_key(&cid, TransactionCollection::cid)
    }

    pub fn collection_mut(&mut self, cid: Cid) -> Result<&mut TransactionCollection> {
        match self.position(cid) {
            Ok(i) => Ok(&mut self.collections[i]),
            Err(_) => Err(Error::new(
                ErrorKind::TransactionUnregisteredCollection,
                format!("collection {} is not part of transaction {}", cid, self.id),
            )),
        }
    }

    pub fn expect_running(&self) -> Result<()> {
        if self.status == TransactionStatus::Running {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::TransactionInternal,
                format!("transaction {} is {:?}, not running", self.id, self.status),
            ))
        }
    }

    pub fn unlock_all(&mut self) {
        self.collections.iter_mut().for_each(TransactionCollection::unlock_all);
    }
}
