use std::any::Any;
use std::sync::Arc;

use serde_json::Value;
use xxhash_rust::xxh64::Xxh64;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, DocMptr, DocumentRef, EdgeEndpoints, Iid};
use crate::hash::HashPolicy;
use crate::hash::multi::MultiHashArray;
use crate::index::base::{Index, IndexBase, IndexType};
use crate::memory::zone::MemoryZone;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    /// edges whose `_from` is the vertex
    Out,
    /// edges whose `_to` is the vertex
    In,
    Any,
}

/// A vertex reference: collection id plus document key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeKey {
    pub cid: Cid,
    pub key: String,
}

fn hash_vertex(cid: Cid, key: &str) -> u64 {
    let mut hasher = Xxh64::new(0);
    hasher.update(&cid.0.to_le_bytes());
    hasher.update(key.as_bytes());
    hasher.digest()
}

fn endpoint(doc: &DocumentRef, from: bool) -> Option<(Cid, &str)> {
    let edge: &EdgeEndpoints = doc.edge.as_ref()?;
    Some(if from {
        (edge.from_cid, edge.from_key.as_str())
    } else {
        (edge.to_cid, edge.to_key.as_str())
    })
}

/// One direction of the edge index
pub struct EdgePolicy {
    from: bool,
}

impl HashPolicy for EdgePolicy {
    type Key = EdgeKey;
    type Element = DocumentRef;

    fn hash_key(&self, key: &EdgeKey) -> u64 {
        hash_vertex(key.cid, &key.key)
    }

    fn hash_element(&self, element: &DocumentRef) -> u64 {
        endpoint(element, self.from).map_or(0, |(cid, key)| hash_vertex(cid, key))
    }

    fn is_equal_key_element(&self, key: &EdgeKey, element: &DocumentRef) -> bool {
        endpoint(element, self.from).is_some_and(|(cid, k)| cid == key.cid && k == key.key)
    }

    fn is_equal_element_element(&self, left: &DocumentRef, right: &DocumentRef) -> bool {
        endpoint(left, self.from) == endpoint(right, self.from)
    }

    fn is_same_element(&self, left: &DocumentRef, right: &DocumentRef) -> bool {
        DocMptr::same(left, right)
    }
}

/// `_from` and `_to` lookups for edge collections. Every edge sits in exactly one
/// slot of each direction table, or in neither.
pub struct EdgeIndex {
    base: IndexBase,
    from: MultiHashArray<EdgePolicy>,
    to: MultiHashArray<EdgePolicy>,
}

impl EdgeIndex {
    pub fn new(iid: Iid, cid: Cid, zone: &Arc<MemoryZone>, initial_size: usize) -> Result<Self> {
        Ok(EdgeIndex {
            base: IndexBase::new(
                iid,
                IndexType::Edge,
                cid,
                false,
                vec!["_from".to_string(), "_to".to_string()],
            ),
            from: MultiHashArray::with_capacity(EdgePolicy { from: true }, zone, initial_size)?,
            to: MultiHashArray::with_capacity(EdgePolicy { from: false }, zone, initial_size)?,
        })
    }

    pub fn lookup(&self, direction: EdgeDirection, cid: Cid, key: &str) -> Vec<DocumentRef> {
        let vertex = EdgeKey { cid, key: key.to_string() };
        match direction {
            EdgeDirection::Out => self.from.lookup_by_key(&vertex).into_iter().cloned().collect(),
            EdgeDirection::In => self.to.lookup_by_key(&vertex).into_iter().cloned().collect(),
            EdgeDirection::Any => {
                let mut result: Vec<DocumentRef> =
                    self.from.lookup_by_key(&vertex).into_iter().cloned().collect();
                for edge in self.to.lookup_by_key(&vertex) {
                    // self loops are already in the list
                    if !result.iter().any(|e| DocMptr::same(e, edge)) {
                        result.push(Arc::clone(edge));
                    }
                }
                result
            }
        }
    }

    pub fn len(&self) -> usize {
        self.from.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_empty()
    }
}

impl Index for EdgeIndex {
    fn base(&self) -> &IndexBase {
        &self.base
    }

    fn insert(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        if doc.edge.is_none() {
            return Err(Error::new(
                ErrorKind::DocumentAttributeMissing,
                format!("document '{}' is not an edge", doc.key),
            ));
        }
        self.from.insert_element(Arc::clone(doc), false)?;
        if let Err(err) = self.to.insert_element(Arc::clone(doc), false) {
            self.from.remove_element(doc)?;
            return Err(err);
        }
        Ok(())
    }

    fn remove(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        if doc.edge.is_none() {
            return Err(Error::new(
                ErrorKind::DocumentAttributeMissing,
                format!("document '{}' is not an edge", doc.key),
            ));
        }
        let from = self.from.remove_element(doc);
        let to = self.to.remove_element(doc);
        from.and(to).map(|_| ())
    }

    fn json(&self) -> Value {
        Value::Object(self.base.json())
    }

    fn memory(&self) -> usize {
        self.from.memory_usage() + self.to.memory_usage()
    }

    fn size_hint(&mut self, size: usize) -> Result<()> {
        self.from.resize(size)?;
        self.to.resize(size)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
