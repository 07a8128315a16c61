use std::any::Any;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;
use xxhash_rust::xxh64::Xxh64;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, DocMptr, DocumentRef, Iid};
use crate::hash::HashPolicy;
use crate::hash::array::HashArray;
use crate::hash::multi::MultiHashArray;
use crate::index::base::{Index, IndexBase, IndexType, PathList};
use crate::memory::zone::MemoryZone;
use crate::shape::shaped::{ShapedJson, ShapedSub};
use crate::shape::shaper::Shaper;

/// Hash index entry: the document plus one sub-object per indexed attribute
#[derive(Debug, Clone)]
pub struct HashIndexElement {
    pub doc: DocumentRef,
    pub subs: Vec<ShapedSub>,
}

impl HashIndexElement {
    fn values(&self) -> impl Iterator<Item = &[u8]> {
        self.subs.iter().map(|sub| self.doc.shaped.sub_bytes(sub))
    }
}

/// Only value bytes are hashed. Equal bytes imply an equal shape, so hash and
/// equality agree across documents of different overall structure.
fn hash_values<'a>(values: impl Iterator<Item = &'a [u8]>) -> u64 {
    let mut hasher = Xxh64::new(0);
    for bytes in values {
        hasher.update(bytes);
    }
    hasher.digest()
}

pub struct HashIndexPolicy;

impl HashPolicy for HashIndexPolicy {
    type Key = [ShapedJson];
    type Element = HashIndexElement;

    fn hash_key(&self, key: &[ShapedJson]) -> u64 {
        hash_values(key.iter().map(ShapedJson::bytes))
    }

    fn hash_element(&self, element: &HashIndexElement) -> u64 {
        hash_values(element.values())
    }

    fn is_equal_key_element(&self, key: &[ShapedJson], element: &HashIndexElement) -> bool {
        key.len() == element.subs.len() && key.iter().map(ShapedJson::bytes).eq(element.values())
    }

    fn is_equal_element_element(&self, left: &HashIndexElement, right: &HashIndexElement) -> bool {
        left.subs.len() == right.subs.len() && left.values().eq(right.values())
    }

    fn is_same_element(&self, left: &HashIndexElement, right: &HashIndexElement) -> bool {
        DocMptr::same(&left.doc, &right.doc)
    }
}

enum HashTable {
    Unique(HashArray<HashIndexPolicy>),
    Multi(MultiHashArray<HashIndexPolicy>),
}

/// Equality index over one or more attributes, unique or not.
pub struct HashIndex {
    base: IndexBase,
    shaper: Arc<dyn Shaper>,
    paths: PathList,
    table: HashTable,
}

impl HashIndex {
    pub fn new(
        iid: Iid,
        cid: Cid,
        shaper: Arc<dyn Shaper>,
        fields: &[String],
        unique: bool,
        zone: &Arc<MemoryZone>,
        initial_size: usize,
    ) -> Result<Self> {
        let paths = PathList::new(shaper.as_ref(), fields)?;
        let table = if unique {
            HashTable::Unique(HashArray::with_capacity(HashIndexPolicy, zone, initial_size)?)
        } else {
            HashTable::Multi(MultiHashArray::with_capacity(HashIndexPolicy, zone, initial_size)?)
        };
        trace!(target: "index.hash", iid = iid.0, unique, "created hash index");
        Ok(HashIndex {
            base: IndexBase::new(iid, IndexType::Hash, cid, unique, fields.to_vec()),
            shaper,
            paths,
            table,
        })
    }

    fn element(&self, doc: &DocumentRef) -> Result<HashIndexElement> {
        let subs = self.paths.extract(self.shaper.as_ref(), doc)?;
        Ok(HashIndexElement {
            doc: Arc::clone(doc),
            subs,
        })
    }

    pub fn len(&self) -> usize {
        match &self.table {
            HashTable::Unique(t) => t.len(),
            HashTable::Multi(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Documents whose indexed attributes equal `values`, one per field.
    pub fn lookup(&self, values: &[Value]) -> Result<Vec<DocumentRef>> {
        if values.len() != self.paths.len() {
            return Err(Error::new(
                ErrorKind::BadParameter,
                format!("hash lookup needs {} values, got {}", self.paths.len(), values.len()),
            ));
        }
        let key = values
            .iter()
            .map(|v| self.shaper.shape_json(v))
            .collect::<Result<Vec<_>>>()?;

        Ok(match &self.table {
            HashTable::Unique(t) => t.lookup_by_key(&key).map(|e| Arc::clone(&e.doc)).into_iter().collect(),
            HashTable::Multi(t) => t.lookup_by_key(&key).into_iter().map(|e| Arc::clone(&e.doc)).collect(),
        })
    }
}

impl Index for HashIndex {
    fn base(&self) -> &IndexBase {
        &self.base
    }

    fn insert(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        let element = self.element(doc)?;
        let res = match &mut self.table {
            HashTable::Unique(t) => t.insert_element(element, false),
            HashTable::Multi(t) => t.insert_element(element, false),
        };
        res.map_err(|err| match (&self.table, err.kind) {
            (HashTable::Unique(_), ErrorKind::ElementExists) => Error::new(
                ErrorKind::UniqueConstraintViolated,
                format!("unique constraint of index {} violated by '{}'", self.base.iid, doc.key),
            ),
            _ => err,
        })
    }

    fn remove(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        let element = self.element(doc)?;
        match &mut self.table {
            HashTable::Unique(t) => {
                // another document may hold these values
                match t.lookup_by_element(&element) {
                    Some(found) if DocMptr::same(&found.doc, doc) => t.remove_element(&element).map(|_| ()),
                    _ => Err(Error::new(ErrorKind::ElementNotFound, "document not in hash index")),
                }
            }
            HashTable::Multi(t) => t.remove_element(&element).map(|_| ()),
        }
    }

    fn json(&self) -> Value {
        Value::Object(self.base.json())
    }

    fn memory(&self) -> usize {
        let per_element = self.paths.len() * std::mem::size_of::<ShapedSub>();
        match &self.table {
            HashTable::Unique(t) => t.memory_usage() + t.len() * per_element,
            HashTable::Multi(t) => t.memory_usage() + t.len() * per_element,
        }
    }

    fn size_hint(&mut self, size: usize) -> Result<()> {
        match &mut self.table {
            HashTable::Unique(t) => t.resize(size),
            HashTable::Multi(t) => t.resize(size),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::zone::ZoneId;
    use crate::shape::shaper::VocShaper;
    use crate::test_support::make_doc;
    use serde_json::json;

    fn index(shaper: &Arc<VocShaper>, fields: &[&str], unique: bool) -> HashIndex {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let shaper: Arc<dyn Shaper> = shaper.clone();
        HashIndex::new(Iid(5), Cid(1), shaper, &fields, unique, &MemoryZone::unbounded(ZoneId::Unknown), 11)
            .unwrap()
    }

    #[test]
    fn unique_index_rejects_equal_values() {
        let shaper = Arc::new(VocShaper::new());
        let mut idx = index(&shaper, &["x"], true);
        let a = make_doc(shaper.as_ref(), "a", json!({"x": 1}));
        let b = make_doc(shaper.as_ref(), "b", json!({"x": 1}));
        idx.insert(&a, false).unwrap();
        let err = idx.insert(&b, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UniqueConstraintViolated);

        // b was never stored, removing it must not take a with it
        assert!(idx.remove(&b, true).is_err());
        let found = idx.lookup(&[json!(1)]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, "a");
    }

    #[test]
    fn non_unique_index_returns_all_matches() {
        let shaper = Arc::new(VocShaper::new());
        let mut idx = index(&shaper, &["x", "y"], false);
        for (key, y) in [("a", "p"), ("b", "p"), ("c", "q")] {
            idx.insert(&make_doc(shaper.as_ref(), key, json!({"x": 1, "y": y})), false).unwrap();
        }
        assert_eq!(idx.lookup(&[json!(1), json!("p")]).unwrap().len(), 2);
        assert_eq!(idx.lookup(&[json!(1), json!("q")]).unwrap().len(), 1);
        assert!(idx.lookup(&[json!("1"), json!("q")]).unwrap().is_empty());
        assert_eq!(idx.lookup(&[json!(1)]).unwrap_err().kind, ErrorKind::BadParameter);
    }

    #[test]
    fn values_match_across_document_shapes() {
        let shaper = Arc::new(VocShaper::new());
        let mut idx = index(&shaper, &["x"], false);
        idx.insert(&make_doc(shaper.as_ref(), "a", json!({"x": "v", "extra": [1]})), false).unwrap();
        idx.insert(&make_doc(shaper.as_ref(), "b", json!({"x": "v"})), false).unwrap();
        assert_eq!(idx.lookup(&[json!("v")]).unwrap().len(), 2);
    }

    #[test]
    fn missing_attribute_is_reported_for_soft_skip() {
        let shaper = Arc::new(VocShaper::new());
        let mut idx = index(&shaper, &["x"], true);
        let err = idx.insert(&make_doc(shaper.as_ref(), "a", json!({"y": 1})), false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DocumentAttributeMissing);
        assert!(idx.is_empty());
    }
}
