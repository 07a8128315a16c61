use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

use crate::collection::document::UpdatePolicy;
use crate::collection::vocbase::Vocbase;
use crate::core::error::Result;
use crate::core::types::{Cid, DocumentRef};
use crate::transaction::collection::AccessType;
use crate::transaction::context::TransactionContext;
use crate::transaction::state::TransactionOptions;
use crate::transaction::trx::Transaction;

/// A transaction over exactly one collection, registered on construction.
pub struct SingleCollectionTransaction {
    trx: Transaction,
    cid: Cid,
}

impl SingleCollectionTransaction {
    pub fn new(
        vocbase: Arc<Vocbase>,
        context: Rc<TransactionContext>,
        collection: &str,
        access: AccessType,
    ) -> Result<Self> {
        Self::with_options(vocbase, context, collection, access, TransactionOptions::default())
    }

    pub fn with_options(
        vocbase: Arc<Vocbase>,
        context: Rc<TransactionContext>,
        collection: &str,
        access: AccessType,
        options: TransactionOptions,
    ) -> Result<Self> {
        let mut trx = Transaction::with_options(vocbase, context, options)?;
        let cid = trx.add_collection(collection, access)?;
        Ok(SingleCollectionTransaction { trx, cid })
    }

    pub fn cid(&self) -> Cid {
        self.cid
    }

    pub fn transaction(&mut self) -> &mut Transaction {
        &mut self.trx
    }

    pub fn begin(&mut self) -> Result<()> {
        self.trx.begin()
    }

    pub fn commit(&mut self) -> Result<()> {
        self.trx.commit()
    }

    pub fn abort(&mut self) -> Result<()> {
        self.trx.abort()
    }

    pub fn finish(&mut self, result: Result<()>) -> Result<()> {
        self.trx.finish(result)
    }

    pub fn lock_read(&mut self) -> Result<()> {
        self.trx.lock(self.cid, AccessType::Read)
    }

    pub fn lock_write(&mut self) -> Result<()> {
        self.trx.lock(self.cid, AccessType::Write)
    }

    pub fn unlock(&mut self) -> Result<()> {
        self.trx.unlock(self.cid)
    }

    pub fn read_any(&self) -> Result<Option<DocumentRef>> {
        self.trx.read_any(self.cid)
    }

    pub fn read(&self, key: &str) -> Result<DocumentRef> {
        self.trx.read_single(self.cid, key, true)
    }

    pub fn read_all(&self) -> Result<Vec<DocumentRef>> {
        self.trx.read_all(self.cid, true)
    }

    pub fn read_ordered(&self, offset: i64, count: usize) -> Result<Vec<DocumentRef>> {
        self.trx.read_ordered(self.cid, offset, count)
    }

    pub fn read_slice(&self, skip: i64, limit: usize) -> Result<(Vec<DocumentRef>, usize)> {
        self.trx.read_slice(self.cid, skip, limit)
    }

    pub fn read_incremental(&self, position: &mut usize, batch_size: usize) -> Result<(Vec<DocumentRef>, usize)> {
        self.trx.read_incremental(self.cid, position, batch_size)
    }

    pub fn create(&mut self, body: &Value) -> Result<DocumentRef> {
        self.trx.create(self.cid, body)
    }

    pub fn update(&mut self, key: &str, body: &Value, policy: UpdatePolicy) -> Result<DocumentRef> {
        self.trx.update(self.cid, key, body, policy)
    }

    pub fn patch(&mut self, key: &str, patch: &Value, policy: UpdatePolicy, keep_null: bool) -> Result<DocumentRef> {
        self.trx.patch(self.cid, key, patch, policy, keep_null)
    }

    pub fn remove(&mut self, key: &str, policy: UpdatePolicy) -> Result<()> {
        self.trx.remove(self.cid, key, policy)
    }

    pub fn remove_all(&mut self) -> Result<usize> {
        self.trx.remove_all(self.cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::error::ErrorKind;
    use crate::core::types::CollectionType;
    use crate::transaction::state::{TransactionHints, TransactionStatus};
    use serde_json::json;

    #[test]
    fn single_operation_round() {
        let dir = tempfile::tempdir().unwrap();
        let vocbase = Arc::new(Vocbase::open(Config::with_storage_path(dir.path())).unwrap());
        vocbase.create_collection("notes", CollectionType::Document).unwrap();
        let context = TransactionContext::standalone();

        let options = TransactionOptions {
            hints: TransactionHints { single_operation: true, ..TransactionHints::default() },
            ..TransactionOptions::default()
        };
        let mut trx = SingleCollectionTransaction::with_options(
            Arc::clone(&vocbase),
            Rc::clone(&context),
            "notes",
            AccessType::Write,
            options,
        )
        .unwrap();
        trx.begin().unwrap();
        let doc = trx.create(&json!({"text": "hi"})).unwrap();
        let stale = UpdatePolicy::Error(doc.rid);
        trx.update(&doc.key, &json!({"text": "there"}), stale).unwrap();
        assert_eq!(trx.update(&doc.key, &json!({}), stale).unwrap_err().kind, ErrorKind::Conflict);
        trx.commit().unwrap();
        assert_eq!(trx.transaction().status(), TransactionStatus::Committed);
        drop(trx);

        let mut reader = SingleCollectionTransaction::new(vocbase, context, "notes", AccessType::Read).unwrap();
        reader.begin().unwrap();
        assert_eq!(reader.read_all().unwrap().len(), 1);
        assert_eq!(reader.read("nope").unwrap_err().kind, ErrorKind::DocumentNotFound);
        reader.commit().unwrap();
    }

    #[test]
    fn unknown_collection() {
        let dir = tempfile::tempdir().unwrap();
        let vocbase = Arc::new(Vocbase::open(Config::with_storage_path(dir.path())).unwrap());
        let err = SingleCollectionTransaction::new(vocbase, TransactionContext::standalone(), "none", AccessType::Read)
            .err()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::CollectionNotFound);
    }
}
