use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::collection::document::{DocumentCollection, UpdatePolicy, Written};
use crate::collection::vocbase::Vocbase;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, CollectionType, DocumentRef, EdgeEndpoints};
use crate::transaction::collection::{AccessType, CollectionLock, TransactionCollection, Undo};
use crate::transaction::context::TransactionContext;
use crate::transaction::state::{TransactionHints, TransactionOptions, TransactionState, TransactionStatus};

/// A unit of work over one or more collections.
///
/// A transaction created while another one is registered in the same context
/// becomes an embedded scope of it: it shares the outer state, its `commit` and
/// `abort` only check the status, and locks it takes are released by the scope
/// that took them. Only the outermost transaction releases locks and undoes
/// writes. Dropping a running outermost transaction aborts it.
pub struct Transaction {
    vocbase: Arc<Vocbase>,
    context: Rc<TransactionContext>,
    state: Rc<RefCell<TransactionState>>,
    nesting_level: usize,
    error_data: Option<String>,
}

impl Transaction {
    pub fn new(vocbase: Arc<Vocbase>, context: Rc<TransactionContext>) -> Result<Self> {
        Self::with_options(vocbase, context, TransactionOptions::default())
    }

    /// Options of an embedded scope are ignored; the outermost transaction's apply.
    pub fn with_options(
        vocbase: Arc<Vocbase>,
        context: Rc<TransactionContext>,
        options: TransactionOptions,
    ) -> Result<Self> {
        if let Some(parent) = context.parent() {
            if !context.is_embeddable() {
                warn!(target: "trx.nested", id = parent.borrow().id, "context does not allow nested transactions");
                return Err(Error::new(
                    ErrorKind::TransactionNested,
                    "a transaction is already running in this context",
                ));
            }
            let level = {
                let mut state = parent.borrow_mut();
                state.nesting += 1;
                trace!(target: "trx.nested", id = state.id, level = state.nesting, "embedded transaction");
                state.nesting
            };
            return Ok(Transaction {
                vocbase,
                context,
                state: parent,
                nesting_level: level,
                error_data: None,
            });
        }

        let mut state = TransactionState::new(options, vocbase.config().lock_timeout());
        state.status = TransactionStatus::Created;
        trace!(target: "trx.create", id = state.id, ?options, "transaction created");
        let state = Rc::new(RefCell::new(state));
        context.register(&state);
        Ok(Transaction {
            vocbase,
            context,
            state,
            nesting_level: 0,
            error_data: None,
        })
    }

    pub fn id(&self) -> u64 {
        self.state.borrow().id
    }

    pub fn status(&self) -> TransactionStatus {
        self.state.borrow().status
    }

    pub fn nesting_level(&self) -> usize {
        self.nesting_level
    }

    pub fn is_embedded(&self) -> bool {
        self.nesting_level > 0
    }

    pub fn hints(&self) -> TransactionHints {
        self.state.borrow().hints
    }

    pub fn wait_for_sync(&self) -> bool {
        self.state.borrow().wait_for_sync
    }

    /// Context of the error passed to the last failed `finish`.
    pub fn error_data(&self) -> Option<&str> {
        self.error_data.as_deref()
    }

    pub fn vocbase(&self) -> &Arc<Vocbase> {
        &self.vocbase
    }

    /// Registers a collection by name or id.
    ///
    /// Before the outermost `begin` any scope may register collections or raise
    /// their access to write. Once running, an embedded scope may only use
    /// collections already registered with sufficient access.
    pub fn add_collection(&mut self, name: &str, access: AccessType) -> Result<Cid> {
        let handle = self.vocbase.resolve_collection(name)?;
        let cid = handle.cid;
        let mut state = self.state.borrow_mut();

        match state.status {
            TransactionStatus::Created => {}
            TransactionStatus::Running if self.nesting_level > 0 => {
                let registered = state.position(cid).ok().map(|i| state.collections[i].access);
                return match registered {
                    Some(held) if held >= access => Ok(cid),
                    _ => Err(Error::new(
                        ErrorKind::TransactionUnregisteredCollection,
                        format!("collection '{}' was not registered for {:?} access", handle.name, access),
                    )),
                };
            }
            status => {
                return Err(Error::new(
                    ErrorKind::TransactionInternal,
                    format!("cannot add collection '{}' to a {:?} transaction", handle.name, status),
                ));
            }
        }

        // one collection waiting for sync makes the whole transaction wait
        state.wait_for_sync |= handle.wait_for_sync;
        match state.position(cid) {
            Ok(i) => {
                let collection = &mut state.collections[i];
                collection.access = collection.access.max(access);
            }
            Err(i) => {
                trace!(target: "trx.collection", id = state.id, collection = %handle.name, ?access, "added");
                state
                    .collections
                    .insert(i, TransactionCollection::new(handle, access));
            }
        }
        Ok(cid)
    }

    /// Starts the transaction. The outermost scope locks every registered
    /// collection in id order unless the transaction is logical or hinted
    /// `lock_never`; embedded scopes require the outer one to be running.
    pub fn begin(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if self.nesting_level > 0 {
            return state.expect_running();
        }
        if state.status != TransactionStatus::Created {
            warn!(target: "trx.begin", id = state.id, status = ?state.status, "begin on a used transaction");
            return Err(Error::new(
                ErrorKind::TransactionInternal,
                format!("transaction {} is {:?}, cannot begin", state.id, state.status),
            ));
        }

        if state.is_real && !state.hints.lock_never {
            let timeout = state.timeout;
            let locked = state.collections.iter_mut().try_for_each(|collection| {
                let access = collection.access;
                collection.lock(access, timeout, 0)
            });
            if let Err(err) = locked {
                state.unlock_all();
                return Err(err);
            }
        }
        state.status = TransactionStatus::Running;
        debug!(target: "trx.begin", id = state.id, collections = state.collections.len(), "transaction running");
        Ok(())
    }

    /// Makes the writes permanent. Only the outermost scope releases anything.
    pub fn commit(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if let Err(err) = state.expect_running() {
            warn!(target: "trx.commit", id = state.id, status = ?state.status, "commit on a transaction not running");
            return Err(err);
        }
        if self.nesting_level > 0 {
            trace!(target: "trx.commit", id = state.id, level = self.nesting_level, "embedded commit");
            return Ok(());
        }
        for collection in &mut state.collections {
            collection.undo.clear();
            collection.unlock_all();
        }
        state.status = TransactionStatus::Committed;
        debug!(
            target: "trx.commit",
            id = state.id,
            wait_for_sync = state.wait_for_sync,
            single_operation = state.hints.single_operation,
            "transaction committed"
        );
        Ok(())
    }

    /// Undoes every write of the transaction, including those of embedded scopes
    /// that committed. Embedded scopes only check the status.
    pub fn abort(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if let Err(err) = state.expect_running() {
            warn!(target: "trx.abort", id = state.id, status = ?state.status, "abort on a transaction not running");
            return Err(err);
        }
        if self.nesting_level > 0 {
            trace!(target: "trx.abort", id = state.id, level = self.nesting_level, "embedded abort");
            return Ok(());
        }

        let timeout = state.timeout;
        let mut first_error = None;
        for collection in state.collections.iter_mut().rev() {
            if let Err(err) = collection.rollback(timeout) {
                first_error.get_or_insert(err);
            }
            collection.unlock_all();
        }
        state.status = TransactionStatus::Aborted;
        debug!(target: "trx.abort", id = state.id, "transaction aborted");
        first_error.map_or(Ok(()), Err)
    }

    /// Commits on success, aborts and keeps the error otherwise.
    pub fn finish(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => self.commit(),
            Err(err) => {
                self.error_data = Some(err.context.clone());
                if let Err(abort) = self.abort() {
                    warn!(target: "trx.abort", %abort, "abort after failed operation failed");
                }
                Err(err)
            }
        }
    }

    /// Locks a registered collection for the current scope. A lock held already
    /// by this or an outer scope is reused.
    pub fn lock(&mut self, cid: Cid, access: AccessType) -> Result<()> {
        let level = self.nesting_level;
        let mut state = self.state.borrow_mut();
        let timeout = state.timeout;
        let collection = state.collection_mut(cid)?;
        if access > collection.access {
            return Err(Error::new(
                ErrorKind::TransactionUnregisteredCollection,
                format!("collection '{}' was not registered for {:?} access", collection.handle.name, access),
            ));
        }
        collection.lock(access, timeout, level)
    }

    pub fn is_locked(&self, cid: Cid) -> bool {
        let mut state = self.state.borrow_mut();
        state.collection_mut(cid).is_ok_and(|collection| collection.is_locked())
    }

    /// Releases a lock taken by this scope. Locks of outer scopes stay.
    pub fn unlock(&mut self, cid: Cid) -> Result<()> {
        let level = self.nesting_level;
        let mut state = self.state.borrow_mut();
        if state.hints.lock_entirely {
            return Ok(());
        }
        state.collection_mut(cid)?.unlock(level);
        Ok(())
    }

    // ----- reads -----

    /// Runs `f` under the held lock or, with `lock` set, a temporary read lock.
    fn read<R>(&self, cid: Cid, lock: bool, f: impl FnOnce(&DocumentCollection) -> Result<R>) -> Result<R> {
        let mut state = self.state.borrow_mut();
        state.expect_running()?;
        let timeout = state.timeout;
        let collection = state.collection_mut(cid)?;
        match &collection.lock {
            Some(CollectionLock::Read(guard)) => f(&**guard),
            Some(CollectionLock::Write(guard)) => f(&**guard),
            None if lock => {
                let guard = collection.handle.collection.try_read_for(timeout).ok_or_else(|| {
                    warn!(target: "trx.lock", collection = %collection.handle.name, ?timeout, "lock timeout");
                    Error::new(ErrorKind::LockTimeout, format!("timed out locking '{}'", collection.handle.name))
                })?;
                f(&*guard)
            }
            None => Err(Error::new(
                ErrorKind::TransactionInternal,
                format!("collection '{}' is not locked", collection.handle.name),
            )),
        }
    }

    /// Any document of the collection, picked at random.
    pub fn read_any(&self, cid: Cid) -> Result<Option<DocumentRef>> {
        self.read(cid, true, |collection| Ok(collection.random_document().cloned()))
    }

    pub fn read_single(&self, cid: Cid, key: &str, lock: bool) -> Result<DocumentRef> {
        self.read(cid, lock, |collection| {
            collection
                .lookup(key)
                .cloned()
                .ok_or_else(|| Error::new(ErrorKind::DocumentNotFound, format!("document '{}' not found", key)))
        })
    }

    pub fn read_all(&self, cid: Cid, lock: bool) -> Result<Vec<DocumentRef>> {
        self.read(cid, lock, |collection| Ok(collection.primary().iter().cloned().collect()))
    }

    /// `count` documents in insertion order starting at `offset`. A negative
    /// offset counts from the end.
    pub fn read_ordered(&self, cid: Cid, offset: i64, count: usize) -> Result<Vec<DocumentRef>> {
        self.read(cid, true, |collection| {
            let start = start_position(offset, collection.count());
            Ok(collection.ordered().skip(start).take(count).cloned().collect())
        })
    }

    /// Up to `limit` documents in table order after skipping `skip`, which counts
    /// from the end when negative. Also returns the total document count.
    pub fn read_slice(&self, cid: Cid, skip: i64, limit: usize) -> Result<(Vec<DocumentRef>, usize)> {
        self.read(cid, true, |collection| {
            let total = collection.count();
            let start = start_position(skip, total);
            let docs = collection.primary().iter().skip(start).take(limit).cloned().collect();
            Ok((docs, total))
        })
    }

    /// The next batch of a table scan. `position` is the table slot to resume at
    /// and is advanced past the batch; a scan is complete once a batch comes back
    /// empty. Also returns the total document count.
    pub fn read_incremental(
        &self,
        cid: Cid,
        position: &mut usize,
        batch_size: usize,
    ) -> Result<(Vec<DocumentRef>, usize)> {
        self.read(cid, true, |collection| {
            let primary = collection.primary();
            let mut docs = Vec::with_capacity(batch_size.min(primary.len()));
            let mut slot = *position;
            while slot < primary.capacity() && docs.len() < batch_size {
                if let Some(doc) = primary.slot(slot) {
                    docs.push(Arc::clone(doc));
                }
                slot += 1;
            }
            *position = slot;
            Ok((docs, collection.count()))
        })
    }

    // ----- writes -----

    /// Runs `f` under the held write lock or a temporary one. Every write orders a
    /// barrier before touching documents.
    fn write<R>(&mut self, cid: Cid, f: impl FnOnce(&mut DocumentCollection, &mut Vec<Undo>) -> Result<R>) -> Result<R> {
        let mut state = self.state.borrow_mut();
        state.expect_running()?;
        let timeout = state.timeout;
        let TransactionCollection { handle, access, lock, undo, .. } = state.collection_mut(cid)?;
        if *access != AccessType::Write {
            return Err(Error::new(
                ErrorKind::TransactionUnregisteredCollection,
                format!("collection '{}' was not registered for writing", handle.name),
            ));
        }
        match lock {
            Some(CollectionLock::Write(guard)) => {
                let _barrier = guard.barriers().order()?;
                f(&mut **guard, undo)
            }
            Some(CollectionLock::Read(_)) => Err(Error::new(
                ErrorKind::TransactionInternal,
                format!("collection '{}' is read-locked, cannot write", handle.name),
            )),
            None => {
                let mut guard = handle.collection.try_write_for(timeout).ok_or_else(|| {
                    warn!(target: "trx.lock", collection = %handle.name, ?timeout, "lock timeout");
                    Error::new(ErrorKind::LockTimeout, format!("timed out locking '{}'", handle.name))
                })?;
                let _barrier = guard.barriers().order()?;
                f(&mut *guard, undo)
            }
        }
    }

    fn record(undo: &mut Vec<Undo>, written: &Written) {
        match &written.previous {
            Some(old) => undo.push(Undo::Update {
                new: Arc::clone(&written.document),
                old: Arc::clone(old),
            }),
            None => undo.push(Undo::Insert(Arc::clone(&written.document))),
        }
        undo.extend(written.evicted.iter().cloned().map(Undo::Remove));
    }

    fn edge_endpoints(&self, body: &Value) -> Result<EdgeEndpoints> {
        let endpoint = |name: &str| match body.get(name) {
            Some(Value::String(handle)) => self.vocbase.parse_document_handle(handle),
            _ => Err(Error::new(ErrorKind::BadParameter, format!("edge needs a '{}' document handle", name))),
        };
        let (from_cid, from_key) = endpoint("_from")?;
        let (to_cid, to_key) = endpoint("_to")?;
        Ok(EdgeEndpoints { from_cid, from_key, to_cid, to_key })
    }

    /// Creates a document. Edge collections take `_from` and `_to` handles from the body.
    pub fn create(&mut self, cid: Cid, body: &Value) -> Result<DocumentRef> {
        let kind = {
            let mut state = self.state.borrow_mut();
            state.collection_mut(cid)?.handle.kind
        };
        let edge = match kind {
            CollectionType::Edge => Some(self.edge_endpoints(body)?),
            CollectionType::Document => None,
        };
        self.write(cid, |collection, undo| {
            let written = collection.insert(body, edge)?;
            Self::record(undo, &written);
            Ok(written.document)
        })
    }

    pub fn update(&mut self, cid: Cid, key: &str, body: &Value, policy: UpdatePolicy) -> Result<DocumentRef> {
        self.write(cid, |collection, undo| {
            let written = collection.update(key, body, policy)?;
            Self::record(undo, &written);
            Ok(written.document)
        })
    }

    pub fn patch(
        &mut self,
        cid: Cid,
        key: &str,
        patch: &Value,
        policy: UpdatePolicy,
        keep_null: bool,
    ) -> Result<DocumentRef> {
        self.write(cid, |collection, undo| {
            let written = collection.patch(key, patch, policy, keep_null)?;
            Self::record(undo, &written);
            Ok(written.document)
        })
    }

    pub fn remove(&mut self, cid: Cid, key: &str, policy: UpdatePolicy) -> Result<()> {
        self.write(cid, |collection, undo| {
            let removed = collection.remove(key, policy)?;
            undo.push(Undo::Remove(removed));
            Ok(())
        })
    }

    /// Removes every document, stopping at the first failure. Documents removed
    /// before a failure stay removed until the transaction aborts.
    pub fn remove_all(&mut self, cid: Cid) -> Result<usize> {
        self.write(cid, |collection, undo| {
            let keys: Vec<String> = collection.primary().iter().map(|doc| doc.key.clone()).collect();
            for key in &keys {
                let removed = collection.remove(key, UpdatePolicy::LastWrite)?;
                undo.push(Undo::Remove(removed));
            }
            Ok(keys.len())
        })
    }
}

fn start_position(offset: i64, total: usize) -> usize {
    if offset < 0 {
        total.saturating_sub(offset.unsigned_abs() as usize)
    } else {
        (offset as usize).min(total)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.nesting_level > 0 {
            let mut state = self.state.borrow_mut();
            state.nesting = state.nesting.saturating_sub(1);
            return;
        }
        let running = self.state.borrow().status == TransactionStatus::Running;
        if running {
            debug!(target: "trx.abort", id = self.id(), "aborting unfinished transaction");
            if let Err(err) = self.abort() {
                warn!(target: "trx.abort", %err, "abort on drop failed");
            }
        }
        self.context.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use serde_json::json;
    use std::time::Duration;

    fn setup() -> (tempfile::TempDir, Arc<Vocbase>, Cid) {
        let dir = tempfile::tempdir().unwrap();
        let vocbase = Arc::new(Vocbase::open(Config::with_storage_path(dir.path())).unwrap());
        let cid = vocbase.create_collection("c", CollectionType::Document).unwrap().cid;
        (dir, vocbase, cid)
    }

    fn count(vocbase: &Vocbase, cid: Cid) -> usize {
        vocbase.lookup_collection_by_id(cid).unwrap().collection.read().count()
    }

    fn value(vocbase: &Vocbase, cid: Cid, key: &str) -> Value {
        let handle = vocbase.lookup_collection_by_id(cid).unwrap();
        let collection = handle.collection.read();
        let doc = collection.lookup(key).cloned().unwrap();
        collection.document_json(&doc).unwrap()["v"].clone()
    }

    fn running(vocbase: &Arc<Vocbase>, context: &Rc<TransactionContext>, access: AccessType) -> Transaction {
        let mut trx = Transaction::new(Arc::clone(vocbase), Rc::clone(context)).unwrap();
        trx.add_collection("c", access).unwrap();
        trx.begin().unwrap();
        trx
    }

    #[test]
    fn commit_keeps_writes_and_releases_locks() {
        let (_dir, vocbase, cid) = setup();
        let context = TransactionContext::standalone();
        let mut trx = running(&vocbase, &context, AccessType::Write);
        trx.create(cid, &json!({"_key": "a", "v": 1})).unwrap();
        trx.create(cid, &json!({"_key": "b", "v": 2})).unwrap();
        assert_eq!(trx.read_single(cid, "a", false).unwrap().key, "a");
        trx.commit().unwrap();
        assert_eq!(trx.status(), TransactionStatus::Committed);

        assert_eq!(count(&vocbase, cid), 2);
        assert_eq!(trx.commit().unwrap_err().kind, ErrorKind::TransactionInternal);
        assert_eq!(trx.abort().unwrap_err().kind, ErrorKind::TransactionInternal);
    }

    #[test]
    fn abort_restores_every_write() {
        let (_dir, vocbase, cid) = setup();
        let handle = vocbase.lookup_collection_by_id(cid).unwrap();
        handle.collection.write().insert(&json!({"_key": "x", "v": 1}), None).unwrap();
        handle.collection.write().insert(&json!({"_key": "y", "v": 1}), None).unwrap();

        let context = TransactionContext::standalone();
        let mut trx = running(&vocbase, &context, AccessType::Write);
        trx.create(cid, &json!({"_key": "n", "v": 3})).unwrap();
        trx.update(cid, "x", &json!({"v": 2}), UpdatePolicy::LastWrite).unwrap();
        trx.patch(cid, "x", &json!({"w": 5}), UpdatePolicy::LastWrite, false).unwrap();
        trx.remove(cid, "y", UpdatePolicy::LastWrite).unwrap();
        trx.abort().unwrap();

        assert_eq!(count(&vocbase, cid), 2);
        assert_eq!(value(&vocbase, cid, "x"), json!(1));
        assert_eq!(value(&vocbase, cid, "y"), json!(1));
        assert!(handle.collection.read().lookup("n").is_none());
    }

    #[test]
    fn outer_abort_undoes_committed_inner_scope() {
        let (_dir, vocbase, cid) = setup();
        let context = TransactionContext::embeddable();
        let mut outer = running(&vocbase, &context, AccessType::Write);
        {
            let mut inner = Transaction::new(Arc::clone(&vocbase), Rc::clone(&context)).unwrap();
            assert_eq!(inner.nesting_level(), 1);
            assert_eq!(inner.id(), outer.id());
            inner.add_collection("c", AccessType::Write).unwrap();
            inner.begin().unwrap();
            inner.create(cid, &json!({"_key": "inner"})).unwrap();
            inner.commit().unwrap();
            assert_eq!(inner.status(), TransactionStatus::Running);
        }
        outer.create(cid, &json!({"_key": "outer"})).unwrap();
        outer.abort().unwrap();
        assert_eq!(count(&vocbase, cid), 0);
    }

    #[test]
    fn nesting_needs_an_embeddable_context() {
        let (_dir, vocbase, _) = setup();
        let context = TransactionContext::standalone();
        let _outer = running(&vocbase, &context, AccessType::Read);
        let err = Transaction::new(Arc::clone(&vocbase), Rc::clone(&context)).err().unwrap();
        assert_eq!(err.kind, ErrorKind::TransactionNested);
    }

    #[test]
    fn embedded_scope_cannot_widen_a_running_transaction() {
        let (_dir, vocbase, _) = setup();
        vocbase.create_collection("other", CollectionType::Document).unwrap();
        let context = TransactionContext::embeddable();
        let _outer = running(&vocbase, &context, AccessType::Read);

        let mut inner = Transaction::new(Arc::clone(&vocbase), Rc::clone(&context)).unwrap();
        inner.add_collection("c", AccessType::Read).unwrap();
        let kinds = [
            inner.add_collection("c", AccessType::Write).unwrap_err().kind,
            inner.add_collection("other", AccessType::Read).unwrap_err().kind,
        ];
        assert_eq!(kinds, [ErrorKind::TransactionUnregisteredCollection; 2]);
    }

    #[test]
    fn writes_need_write_access() {
        let (_dir, vocbase, cid) = setup();
        let context = TransactionContext::standalone();
        let mut trx = running(&vocbase, &context, AccessType::Read);
        let err = trx.create(cid, &json!({})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransactionUnregisteredCollection);
    }

    #[test]
    fn dropping_a_running_transaction_aborts_it() {
        let (_dir, vocbase, cid) = setup();
        let context = TransactionContext::standalone();
        {
            let mut trx = running(&vocbase, &context, AccessType::Write);
            trx.create(cid, &json!({"_key": "gone"})).unwrap();
        }
        assert_eq!(count(&vocbase, cid), 0);
        assert!(!context.has_parent());
        // the context is free again
        running(&vocbase, &context, AccessType::Read).commit().unwrap();
    }

    #[test]
    fn begin_times_out_on_a_held_lock() {
        let (_dir, vocbase, _) = setup();
        let handle = vocbase.lookup_collection_by_name("c").unwrap();
        let _held = handle.collection.write();

        let options = TransactionOptions {
            timeout: Some(Duration::from_millis(10)),
            ..TransactionOptions::default()
        };
        let mut trx = Transaction::with_options(Arc::clone(&vocbase), TransactionContext::standalone(), options).unwrap();
        trx.add_collection("c", AccessType::Read).unwrap();
        assert_eq!(trx.begin().unwrap_err().kind, ErrorKind::LockTimeout);
        assert_eq!(trx.status(), TransactionStatus::Created);
    }

    #[test]
    fn lock_never_locks_per_operation() {
        let (_dir, vocbase, cid) = setup();
        let options = TransactionOptions {
            hints: TransactionHints { lock_never: true, ..TransactionHints::default() },
            ..TransactionOptions::default()
        };
        let mut trx = Transaction::with_options(Arc::clone(&vocbase), TransactionContext::standalone(), options).unwrap();
        trx.add_collection("c", AccessType::Write).unwrap();
        trx.begin().unwrap();
        trx.create(cid, &json!({"_key": "k"})).unwrap();

        // nobody holds the lock between operations
        assert_eq!(vocbase.lookup_collection_by_id(cid).unwrap().collection.read().count(), 1);
        assert_eq!(trx.read_single(cid, "k", false).unwrap_err().kind, ErrorKind::TransactionInternal);
        trx.lock(cid, AccessType::Read).unwrap();
        assert_eq!(trx.read_single(cid, "k", false).unwrap().key, "k");
        assert!(trx.is_locked(cid));
        trx.unlock(cid).unwrap();
        assert!(!trx.is_locked(cid));
        trx.commit().unwrap();
    }

    #[test]
    fn scans() {
        let (_dir, vocbase, cid) = setup();
        let handle = vocbase.lookup_collection_by_id(cid).unwrap();
        for i in 0..10 {
            handle.collection.write().insert(&json!({"_key": format!("k{}", i)}), None).unwrap();
        }
        let context = TransactionContext::standalone();
        let trx = running(&vocbase, &context, AccessType::Read);

        let keys = |docs: Vec<DocumentRef>| docs.iter().map(|d| d.key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(trx.read_ordered(cid, 2, 3).unwrap()), ["k2", "k3", "k4"]);
        assert_eq!(keys(trx.read_ordered(cid, -2, 5).unwrap()), ["k8", "k9"]);
        assert_eq!(trx.read_all(cid, false).unwrap().len(), 10);
        assert!(trx.read_any(cid).unwrap().is_some());

        let (slice, total) = trx.read_slice(cid, -4, 3).unwrap();
        assert_eq!((slice.len(), total), (3, 10));

        let mut position = 0;
        let mut seen = 0;
        loop {
            let (batch, total) = trx.read_incremental(cid, &mut position, 4).unwrap();
            assert_eq!(total, 10);
            if batch.is_empty() {
                break;
            }
            seen += batch.len();
        }
        assert_eq!(seen, 10);
    }

    #[test]
    fn remove_all_and_finish_with_error() {
        let (_dir, vocbase, cid) = setup();
        let handle = vocbase.lookup_collection_by_id(cid).unwrap();
        for i in 0..5 {
            handle.collection.write().insert(&json!({"v": i}), None).unwrap();
        }
        let context = TransactionContext::standalone();
        let mut trx = running(&vocbase, &context, AccessType::Write);
        assert_eq!(trx.remove_all(cid).unwrap(), 5);
        let failed = trx.remove(cid, "missing", UpdatePolicy::LastWrite);
        let err = trx.finish(failed).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DocumentNotFound);
        assert_eq!(trx.error_data(), Some(err.context.as_str()));
        assert_eq!(trx.status(), TransactionStatus::Aborted);
        assert_eq!(count(&vocbase, cid), 5);
    }

    #[test]
    fn edges_resolve_document_handles() {
        let (_dir, vocbase, cid) = setup();
        let edges = vocbase.create_collection("e", CollectionType::Edge).unwrap();
        let context = TransactionContext::standalone();
        let mut trx = Transaction::new(Arc::clone(&vocbase), Rc::clone(&context)).unwrap();
        trx.add_collection("c", AccessType::Write).unwrap();
        trx.add_collection("e", AccessType::Write).unwrap();
        trx.begin().unwrap();
        trx.create(cid, &json!({"_key": "a"})).unwrap();
        trx.create(cid, &json!({"_key": "b"})).unwrap();

        let edge = trx.create(edges.cid, &json!({"_from": "c/a", "_to": "c/b"})).unwrap();
        let endpoints = edge.edge.clone().unwrap();
        assert_eq!((endpoints.from_cid, endpoints.to_key.as_str()), (cid, "b"));

        let err = trx.create(edges.cid, &json!({"_from": "c/a"})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadParameter);
        trx.commit().unwrap();
    }
}
