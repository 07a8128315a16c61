use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, DocMptr, DocumentRef, Iid};
use crate::index::base::{Index, IndexBase, IndexType};

/// Smallest accepted byte limit
pub const MIN_BYTE_SIZE: usize = 16 * 1024;

/// Caps a collection by document count and/or total document bytes, evicting the
/// oldest documents first.
///
/// The constraint only tracks insertion order. Evictions are reported from
/// `post_insert` and carried out by the collection like any other removal, which
/// then calls back into `remove` here.
pub struct CapConstraint {
    base: IndexBase,
    size: usize,
    byte_size: usize,
    documents: VecDeque<DocumentRef>,
    bytes: usize,
}

impl CapConstraint {
    /// A limit of 0 disables that dimension; at least one must be set.
    pub fn new(iid: Iid, cid: Cid, size: usize, byte_size: usize) -> Result<Self> {
        if size == 0 && byte_size == 0 {
            return Err(Error::new(ErrorKind::BadParameter, "cap constraint needs size or byteSize"));
        }
        if byte_size > 0 && byte_size < MIN_BYTE_SIZE {
            return Err(Error::new(
                ErrorKind::BadParameter,
                format!("byteSize must be at least {}", MIN_BYTE_SIZE),
            ));
        }
        trace!(target: "index.cap", iid = iid.0, size, byte_size, "created cap constraint");
        Ok(CapConstraint {
            base: IndexBase::new(iid, IndexType::Cap, cid, false, Vec::new()),
            size,
            byte_size,
            documents: VecDeque::new(),
            bytes: 0,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.bytes
    }

    fn over_limit(&self, count: usize, bytes: usize) -> bool {
        (self.size > 0 && count > self.size) || (self.byte_size > 0 && bytes > self.byte_size)
    }
}

impl Index for CapConstraint {
    fn base(&self) -> &IndexBase {
        &self.base
    }

    /// New documents go to the back. A rolled back removal goes back to its place in
    /// revision order, which is the front for an undone eviction.
    fn insert(&mut self, doc: &DocumentRef, is_rollback: bool) -> Result<()> {
        self.bytes += doc.byte_size();
        if is_rollback {
            let position = self.documents.partition_point(|d| d.rid < doc.rid);
            self.documents.insert(position, Arc::clone(doc));
        } else {
            self.documents.push_back(Arc::clone(doc));
        }
        Ok(())
    }

    fn remove(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        let position = self
            .documents
            .iter()
            .position(|d| DocMptr::same(d, doc))
            .ok_or_else(|| Error::new(ErrorKind::DocumentNotFound, format!("'{}' not capped", doc.key)))?;
        if let Some(removed) = self.documents.remove(position) {
            self.bytes -= removed.byte_size();
        }
        Ok(())
    }

    /// Oldest documents to evict so the limits hold again, never `doc` itself.
    fn post_insert(&mut self, doc: &DocumentRef) -> Vec<DocumentRef> {
        let mut count = self.documents.len();
        let mut bytes = self.bytes;
        let mut evict = Vec::new();
        for candidate in &self.documents {
            if !self.over_limit(count, bytes) {
                break;
            }
            if DocMptr::same(candidate, doc) {
                continue;
            }
            count -= 1;
            bytes -= candidate.byte_size();
            evict.push(Arc::clone(candidate));
        }
        if !evict.is_empty() {
            debug!(target: "index.cap", iid = self.base.iid.0, evicted = evict.len(), "cap constraint evicting");
        }
        evict
    }

    fn json(&self) -> Value {
        let mut map = self.base.json();
        map.insert("size".to_string(), json!(self.size));
        map.insert("byteSize".to_string(), json!(self.byte_size));
        Value::Object(map)
    }

    fn memory(&self) -> usize {
        self.documents.len() * std::mem::size_of::<DocumentRef>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
