mod iterator;
mod list;

use std::any::Any;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::core::error::Result;
use crate::core::types::{Cid, DocumentRef, Iid};
use crate::index::base::{Index, IndexBase, IndexType, PathList};
use crate::index::operator::IndexOperator;
use crate::shape::shaper::Shaper;

pub use iterator::SkiplistIterator;
pub use list::{Skiplist, SkiplistElement};

/// Ordered index over one or more attributes with range lookups.
pub struct SkiplistIndex {
    base: IndexBase,
    shaper: Arc<dyn Shaper>,
    paths: PathList,
    list: Skiplist,
}

impl SkiplistIndex {
    pub fn new(iid: Iid, cid: Cid, shaper: Arc<dyn Shaper>, fields: &[String], unique: bool) -> Result<Self> {
        let paths = PathList::new(shaper.as_ref(), fields)?;
        trace!(target: "index.skiplist", iid = iid.0, unique, "created skiplist index");
        Ok(SkiplistIndex {
            base: IndexBase::new(iid, IndexType::Skiplist, cid, unique, fields.to_vec()),
            shaper,
            paths,
            list: Skiplist::new(unique),
        })
    }

    fn element(&self, doc: &DocumentRef) -> Result<SkiplistElement> {
        Ok(SkiplistElement {
            doc: Arc::clone(doc),
            subs: self.paths.extract(self.shaper.as_ref(), doc)?,
        })
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Evaluates `op` against the list. The operator is consumed.
    pub fn lookup(&self, op: IndexOperator) -> Result<SkiplistIterator<'_>> {
        let filled = op.fill(self.shaper.as_ref(), self.paths.len())?;
        let intervals = iterator::evaluate(&self.list, &filled);
        Ok(SkiplistIterator::new(&self.list, intervals))
    }
}

impl Index for SkiplistIndex {
    fn base(&self) -> &IndexBase {
        &self.base
    }

    fn insert(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        let element = self.element(doc)?;
        self.list.insert(element)
    }

    fn remove(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        let element = self.element(doc)?;
        self.list.remove(&element)
    }

    fn json(&self) -> Value {
        Value::Object(self.base.json())
    }

    fn memory(&self) -> usize {
        self.list.memory_usage()
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
    use crate::core::error::ErrorKind;
    use crate::shape::shaper::VocShaper;
    use crate::test_support::make_doc;
    use serde_json::json;

    fn index_with(values: &[i64], unique: bool) -> SkiplistIndex {
        let shaper: Arc<dyn Shaper> = Arc::new(VocShaper::new());
        let mut idx = SkiplistIndex::new(Iid(3), Cid(1), Arc::clone(&shaper), &["x".to_string()], unique).unwrap();
        for (i, v) in values.iter().enumerate() {
            let doc = make_doc(shaper.as_ref(), &format!("k{}", i), json!({"x": v}));
            idx.insert(&doc, false).unwrap();
        }
        idx
    }

    fn xs(idx: &SkiplistIndex, op: IndexOperator) -> Vec<i64> {
        idx.lookup(op)
            .unwrap()
            .map(|doc| {
                let pid = idx.shaper.find_or_create_attribute_path_by_name("x").unwrap();
                let sub = idx.shaper.extract_shaped_json(&doc.shaped, pid).unwrap().unwrap();
                idx.shaper.sub_to_json(&doc.shaped, &sub).unwrap().as_i64().unwrap()
            })
            .collect()
    }

    #[test]
    fn range_and_returns_inner_values() {
        let idx = index_with(&[7, 1, 5, 3], false);
        let op = IndexOperator::and(IndexOperator::ge(vec![json!(3)]), IndexOperator::le(vec![json!(5)]));
        assert_eq!(xs(&idx, op), vec![3, 5]);
    }

    #[test]
    fn relational_operators() {
        let idx = index_with(&[1, 3, 3, 5, 7], false);
        assert_eq!(xs(&idx, IndexOperator::eq(vec![json!(3)])), vec![3, 3]);
        assert_eq!(xs(&idx, IndexOperator::lt(vec![json!(3)])), vec![1]);
        assert_eq!(xs(&idx, IndexOperator::le(vec![json!(3)])), vec![1, 3, 3]);
        assert_eq!(xs(&idx, IndexOperator::gt(vec![json!(3)])), vec![5, 7]);
        assert_eq!(xs(&idx, IndexOperator::ge(vec![json!(6)])), vec![7]);
        assert_eq!(xs(&idx, IndexOperator::ne(vec![json!(3)])), vec![1, 5, 7]);
        assert!(xs(&idx, IndexOperator::eq(vec![json!(4)])).is_empty());
    }

    #[test]
    fn logical_or_and_not() {
        let idx = index_with(&[1, 3, 5, 7, 9], false);
        let op = IndexOperator::or(IndexOperator::lt(vec![json!(3)]), IndexOperator::gt(vec![json!(7)]));
        assert_eq!(xs(&idx, op), vec![1, 9]);

        let op = IndexOperator::not(IndexOperator::and(
            IndexOperator::ge(vec![json!(3)]),
            IndexOperator::le(vec![json!(7)]),
        ));
        assert_eq!(xs(&idx, op), vec![1, 9]);

        let op = IndexOperator::or(IndexOperator::le(vec![json!(5)]), IndexOperator::ge(vec![json!(3)]));
        assert_eq!(xs(&idx, op), vec![1, 3, 5, 7, 9]);

        let op = IndexOperator::not(IndexOperator::eq(vec![json!(1)]));
        assert_eq!(xs(&idx, op), vec![3, 5, 7, 9]);
    }

    #[test]
    fn iterator_restarts() {
        let idx = index_with(&[2, 4], false);
        let mut it = idx.lookup(IndexOperator::ge(vec![json!(0)])).unwrap();
        assert!(it.has_next());
        assert_eq!(it.by_ref().count(), 2);
        assert!(!it.has_next());
        it.reset();
        assert_eq!(it.count(), 2);
    }

    #[test]
    fn unique_list_rejects_equal_values_and_orders_types() {
        let shaper: Arc<dyn Shaper> = Arc::new(VocShaper::new());
        let mut idx = SkiplistIndex::new(Iid(3), Cid(1), Arc::clone(&shaper), &["x".to_string()], true).unwrap();
        idx.insert(&make_doc(shaper.as_ref(), "a", json!({"x": 1})), false).unwrap();
        let dup = make_doc(shaper.as_ref(), "b", json!({"x": 1}));
        assert_eq!(idx.insert(&dup, false).unwrap_err().kind, ErrorKind::UniqueConstraintViolated);
        assert_eq!(idx.remove(&dup, true).unwrap_err().kind, ErrorKind::ElementNotFound);

        idx.insert(&make_doc(shaper.as_ref(), "c", json!({"x": "1"})), false).unwrap();
        idx.insert(&make_doc(shaper.as_ref(), "d", json!({"x": null})), false).unwrap();
        let keys: Vec<String> = idx
            .lookup(IndexOperator::ge(vec![json!(null)]))
            .unwrap()
            .map(|d| d.key.clone())
            .collect();
        assert_eq!(keys, vec!["d", "a", "c"]);
    }

    #[test]
    fn remove_keeps_order_and_neighbours() {
        let shaper: Arc<dyn Shaper> = Arc::new(VocShaper::new());
        let mut idx = SkiplistIndex::new(Iid(3), Cid(1), Arc::clone(&shaper), &["x".to_string()], false).unwrap();
        let docs: Vec<DocumentRef> = (0..50)
            .map(|i| make_doc(shaper.as_ref(), &format!("k{}", i), json!({"x": i % 10})))
            .collect();
        for d in &docs {
            idx.insert(d, false).unwrap();
        }
        for d in docs.iter().step_by(2) {
            idx.remove(d, false).unwrap();
        }
        assert_eq!(idx.len(), 25);
        let all: Vec<&DocumentRef> = idx.lookup(IndexOperator::ge(vec![json!(0)])).unwrap().collect();
        assert_eq!(all.len(), 25);
        assert_eq!(idx.lookup(IndexOperator::eq(vec![json!(3)])).unwrap().count(), 5);
        assert_eq!(idx.lookup(IndexOperator::eq(vec![json!(4)])).unwrap().count(), 0);
    }
}
