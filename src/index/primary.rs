use std::any::Any;
use std::sync::Arc;

use rand::Rng;
use serde_json::Value;
use xxhash_rust::xxh64::xxh64;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, DocMptr, DocumentRef, Iid};
use crate::hash::HashPolicy;
use crate::hash::array::HashArray;
use crate::index::base::{Index, IndexBase, IndexType};
use crate::memory::zone::MemoryZone;

pub(crate) fn hash_key(key: &str) -> u64 {
    xxh64(key.as_bytes(), 0)
}

/// Document key to master pointer
pub struct PrimaryPolicy;

impl HashPolicy for PrimaryPolicy {
    type Key = str;
    type Element = DocumentRef;

    fn hash_key(&self, key: &str) -> u64 {
        hash_key(key)
    }

    fn hash_element(&self, element: &DocumentRef) -> u64 {
        hash_key(&element.key)
    }

    fn is_equal_key_element(&self, key: &str, element: &DocumentRef) -> bool {
        element.key == key
    }

    fn is_equal_element_element(&self, left: &DocumentRef, right: &DocumentRef) -> bool {
        left.key == right.key
    }
}

/// The canonical store of a collection: every live document by `_key`.
pub struct PrimaryIndex {
    base: IndexBase,
    table: HashArray<PrimaryPolicy>,
}

impl PrimaryIndex {
    pub fn new(cid: Cid, zone: &Arc<MemoryZone>, initial_size: usize) -> Result<Self> {
        Ok(PrimaryIndex {
            base: IndexBase::new(Iid::PRIMARY, IndexType::Primary, cid, true, vec!["_id".to_string()]),
            table: HashArray::with_capacity(PrimaryPolicy, zone, initial_size)?,
        })
    }

    pub fn lookup(&self, key: &str) -> Option<&DocumentRef> {
        self.table.lookup_by_key(key)
    }

    /// Swaps in the new revision of a document already stored under the same key.
    pub fn replace(&mut self, doc: &DocumentRef) -> Result<DocumentRef> {
        let old = self.table.lookup_by_key(&doc.key).cloned().ok_or_else(|| {
            Error::new(ErrorKind::DocumentNotFound, format!("document '{}' not found", doc.key))
        })?;
        self.table.insert_key(&doc.key, Arc::clone(doc), true)?;
        Ok(old)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn slot(&self, i: usize) -> Option<&DocumentRef> {
        self.table.slot(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentRef> {
        self.table.iter()
    }

    /// Picks a random occupied bucket directly from the table.
    pub fn random_document(&self) -> Option<&DocumentRef> {
        if self.table.is_empty() {
            return None;
        }
        let capacity = self.table.capacity();
        let mut rng = rand::thread_rng();
        let mut i = rng.gen_range(0..capacity);
        loop {
            if let Some(doc) = self.table.slot(i) {
                return Some(doc);
            }
            i += 1;
            if i == capacity {
                i = 0;
            }
        }
    }
}

impl Index for PrimaryIndex {
    fn base(&self) -> &IndexBase {
        &self.base
    }

    fn insert(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        self.table
            .insert_key(&doc.key, Arc::clone(doc), false)
            .map_err(|err| match err.kind {
                ErrorKind::KeyExists => Error::new(
                    ErrorKind::UniqueConstraintViolated,
                    format!("unique constraint violated for key '{}'", doc.key),
                ),
                _ => err,
            })
    }

    fn remove(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        match self.table.lookup_by_key(&doc.key) {
            Some(found) if DocMptr::same(found, doc) => {
                self.table.remove_key(&doc.key)?;
                Ok(())
            }
            _ => Err(Error::new(
                ErrorKind::DocumentNotFound,
                format!("document '{}' not found", doc.key),
            )),
        }
    }

    fn json(&self) -> Value {
        Value::Object(self.base.json())
    }

    fn memory(&self) -> usize {
        self.table.memory_usage()
    }

    fn size_hint(&mut self, size: usize) -> Result<()> {
        self.table.resize(size)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
