use std::time::Duration;

use parking_lot::RawRwLock;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use tracing::{trace, warn};

use crate::collection::document::DocumentCollection;
use crate::collection::vocbase::CollectionHandle;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, DocumentRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessType {
    Read,
    Write,
}

/// A collection lock held across calls
pub(crate) enum CollectionLock {
    Read(ArcRwLockReadGuard<RawRwLock, DocumentCollection>),
    Write(ArcRwLockWriteGuard<RawRwLock, DocumentCollection>),
}

impl CollectionLock {
    fn access(&self) -> AccessType {
        match self {
            CollectionLock::Read(_) => AccessType::Read,
            CollectionLock::Write(_) => AccessType::Write,
        }
    }
}

/// One write, recorded so the outermost abort can reverse it
#[derive(Debug, Clone)]
pub(crate) enum Undo {
    Insert(DocumentRef),
    Update { new: DocumentRef, old: DocumentRef },
    Remove(DocumentRef),
}

/// A collection taking part in a transaction
pub(crate) struct TransactionCollection {
    pub handle: CollectionHandle,
    pub access: AccessType,
    pub lock: Option<CollectionLock>,
    /// nesting level of the scope that took `lock`
    pub locked_at: Option<usize>,
    pub undo: Vec<Undo>,
}

impl TransactionCollection {
    pub fn new(handle: CollectionHandle, access: AccessType) -> Self {
        TransactionCollection {
            handle,
            access,
            lock: None,
            locked_at: None,
            undo: Vec::new(),
        }
    }

    pub fn cid(&self) -> Cid {
        self.handle.cid
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    /// Takes the collection lock for `access` unless one is held already. A held
    /// lock is reused by inner scopes.
    pub fn lock(&mut self, access: AccessType, timeout: Duration, level: usize) -> Result<()> {
        if let Some(held) = &self.lock {
            if held.access() < access {
                return Err(Error::new(
                    ErrorKind::TransactionInternal,
                    format!("collection '{}' is read-locked, cannot write", self.handle.name),
                ));
            }
            return Ok(());
        }

        let collection = &self.handle.collection;
        let lock = match access {
            AccessType::Read => collection.try_read_arc_for(timeout).map(CollectionLock::Read),
            AccessType::Write => collection.try_write_arc_for(timeout).map(CollectionLock::Write),
        };
        let Some(lock) = lock else {
            warn!(target: "trx.lock", collection = %self.handle.name, ?access, ?timeout, "lock timeout");
            return Err(Error::new(
                ErrorKind::LockTimeout,
                format!("timed out locking collection '{}'", self.handle.name),
            ));
        };
        trace!(target: "trx.lock", collection = %self.handle.name, ?access, level, "locked");
        self.lock = Some(lock);
        self.locked_at = Some(level);
        Ok(())
    }

    /// Releases the lock if the scope at `level` took it.
    pub fn unlock(&mut self, level: usize) -> bool {
        if self.locked_at != Some(level) {
            return false;
        }
        self.lock = None;
        self.locked_at = None;
        trace!(target: "trx.lock", collection = %self.handle.name, level, "unlocked");
        true
    }

    pub fn unlock_all(&mut self) {
        self.lock = None;
        self.locked_at = None;
    }

    /// Reverses every recorded write, newest first.
    pub fn rollback(&mut self, timeout: Duration) -> Result<()> {
        if self.undo.is_empty() {
            return Ok(());
        }
        let undo = std::mem::take(&mut self.undo);
        if !matches!(self.lock, Some(CollectionLock::Write(_))) {
            self.unlock_all();
            self.lock(AccessType::Write, timeout, 0)?;
        }
        let Some(CollectionLock::Write(collection)) = &mut self.lock else {
            return Err(Error::new(ErrorKind::TransactionInternal, "write lock lost during rollback"));
        };

        let mut first_error = None;
        for entry in undo.iter().rev() {
            let result = match entry {
                Undo::Insert(doc) => collection.rollback_insert(doc),
                Undo::Update { new, old } => collection.rollback_update(new, old),
                Undo::Remove(doc) => collection.rollback_remove(doc),
            };
            if let Err(err) = result {
                warn!(target: "trx.abort", collection = %self.handle.name, %err, "cannot undo write");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
