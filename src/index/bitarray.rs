use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use roaring::RoaringBitmap;
use serde_json::{Value, json};
use tracing::{trace, warn};

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, DocumentRef, Iid, Rid};
use crate::index::base::{Index, IndexBase, IndexType, PathList};
use crate::index::operator::{FilledOperator, IndexOperator, LogicalOp, RelationOp};
use crate::shape::compare::compare_shaped;
use crate::shape::shaped::ShapedJson;
use crate::shape::shaper::Shaper;

/// Membership of one document is a single machine word.
pub const MAX_CARDINALITY: usize = u64::BITS as usize;

/// One indexed attribute with its declared value domain
#[derive(Debug, Clone)]
pub struct BitarrayAttribute {
    pub name: String,
    pub values: Vec<Value>,
}

struct Column {
    /// position of the first value of this attribute in the combined bitmask
    offset: usize,
    values: Vec<ShapedJson>,
}

/// Index over a small enumerated value space.
///
/// Every declared value of every attribute owns one bit position. A document is
/// stored as the mask of the positions its attribute values map to, and each
/// position keeps a bitmap of the documents that have it set.
pub struct BitarrayIndex {
    base: IndexBase,
    shaper: Arc<dyn Shaper>,
    paths: PathList,
    attributes: Vec<BitarrayAttribute>,
    columns: Vec<Column>,
    supports_undefined: bool,

    positions: Vec<RoaringBitmap>,
    undefined: RoaringBitmap,
    masks: HashMap<u32, u64>,
    ids: HashMap<Rid, u32>,
    handles: HashMap<u32, DocumentRef>,
    next_id: u32,
}

impl BitarrayIndex {
    pub fn new(
        iid: Iid,
        cid: Cid,
        shaper: Arc<dyn Shaper>,
        attributes: Vec<BitarrayAttribute>,
        supports_undefined: bool,
        max_cardinality: usize,
    ) -> Result<Self> {
        let max_cardinality = max_cardinality.min(MAX_CARDINALITY);
        let names: Vec<String> = attributes.iter().map(|a| a.name.clone()).collect();

        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                warn!(target: "index.bitarray", attribute = %name, "duplicate bitarray attribute");
                return Err(Error::new(
                    ErrorKind::BitarrayCreationFailureDuplicateAttributes,
                    format!("attribute '{}' is indexed twice", name),
                ));
            }
        }

        let mut columns = Vec::with_capacity(attributes.len());
        let mut cardinality = 0;
        for attribute in &attributes {
            let values = attribute
                .values
                .iter()
                .map(|v| shaper.shape_json(v))
                .collect::<Result<Vec<_>>>()?;
            for (i, value) in values.iter().enumerate() {
                if values[..i].iter().any(|v| compare_shaped(v.bytes(), value.bytes()) == Ordering::Equal) {
                    warn!(target: "index.bitarray", attribute = %attribute.name, "duplicate bitarray value");
                    return Err(Error::new(
                        ErrorKind::BitarrayCreationFailureDuplicateValues,
                        format!("attribute '{}' declares a value twice", attribute.name),
                    ));
                }
            }
            columns.push(Column { offset: cardinality, values });
            cardinality += attribute.values.len();
        }

        if cardinality == 0 || cardinality > max_cardinality {
            warn!(target: "index.bitarray", cardinality, max_cardinality, "bitarray cardinality out of range");
            return Err(Error::new(
                ErrorKind::BitarrayCreationFailureCardinality,
                format!("combined cardinality {} not in 1..={}", cardinality, max_cardinality),
            ));
        }

        let paths = PathList::new(shaper.as_ref(), &names)?;
        trace!(target: "index.bitarray", iid = iid.0, cardinality, supports_undefined, "created bitarray index");
        Ok(BitarrayIndex {
            base: IndexBase::new(iid, IndexType::Bitarray, cid, false, names),
            shaper,
            paths,
            attributes,
            columns,
            supports_undefined,
            positions: vec![RoaringBitmap::new(); cardinality],
            undefined: RoaringBitmap::new(),
            masks: HashMap::new(),
            ids: HashMap::new(),
            handles: HashMap::new(),
            next_id: 0,
        })
    }

    pub fn cardinality(&self) -> usize {
        self.positions.len()
    }

    pub fn supports_undefined(&self) -> bool {
        self.supports_undefined
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Bitmask of a document, or `None` when an attribute is missing.
    fn mask(&self, doc: &DocumentRef) -> Result<Option<u64>> {
        let subs = match self.paths.extract(self.shaper.as_ref(), doc) {
            Ok(subs) => subs,
            Err(err) if err.kind == ErrorKind::DocumentAttributeMissing => return Ok(None),
            Err(err) => return Err(err),
        };

        let mut mask = 0u64;
        for ((sub, column), attribute) in subs.iter().zip(&self.columns).zip(&self.attributes) {
            let bytes = doc.shaped.sub_bytes(sub);
            let position = column
                .values
                .iter()
                .position(|v| compare_shaped(bytes, v.bytes()) == Ordering::Equal)
                .ok_or_else(|| {
                    Error::new(
                        ErrorKind::BitarrayInsertUnsupportedValue,
                        format!(
                            "document '{}' has a value for '{}' outside the declared domain",
                            doc.key, attribute.name
                        ),
                    )
                })?;
            mask |= 1u64 << (column.offset + position);
        }
        Ok(Some(mask))
    }

    fn allocate_id(&mut self, doc: &DocumentRef) -> Result<u32> {
        let id = self.next_id;
        self.next_id = self.next_id.checked_add(1).ok_or_else(|| {
            Error::new(ErrorKind::OutOfMemory, "bitarray document ids exhausted")
        })?;
        self.ids.insert(doc.rid, id);
        self.handles.insert(id, Arc::clone(doc));
        Ok(id)
    }

    /// Documents stored in the undefined bucket.
    pub fn lookup_undefined(&self) -> Vec<DocumentRef> {
        self.collect(&self.undefined)
    }

    /// Evaluates `op` over the documents with defined values. The operator is consumed.
    pub fn lookup(&self, op: IndexOperator) -> Result<Vec<DocumentRef>> {
        let filled = op.fill(self.shaper.as_ref(), self.paths.len())?;
        let result = self.evaluate(&filled);
        Ok(self.collect(&result))
    }

    fn collect(&self, ids: &RoaringBitmap) -> Vec<DocumentRef> {
        ids.iter().filter_map(|id| self.handles.get(&id).cloned()).collect()
    }

    fn defined(&self) -> RoaringBitmap {
        self.masks.keys().copied().collect()
    }

    fn evaluate(&self, op: &FilledOperator) -> RoaringBitmap {
        match op {
            FilledOperator::Relation { op: RelationOp::Ne, values } => {
                self.defined() - self.relation(RelationOp::Eq, values)
            }
            FilledOperator::Relation { op, values } => self.relation(*op, values),
            FilledOperator::Logical { op: LogicalOp::Not, left, .. } => {
                self.defined() - self.evaluate(left)
            }
            FilledOperator::Logical { op, left, right } => {
                let left = self.evaluate(left);
                let right = match right {
                    Some(right) => self.evaluate(right),
                    None => RoaringBitmap::new(),
                };
                match op {
                    LogicalOp::And => left & right,
                    _ => left | right,
                }
            }
        }
    }

    /// Each literal selects the positions of its attribute satisfying `op`. Documents
    /// must match on every attribute a literal is given for.
    fn relation(&self, op: RelationOp, values: &[ShapedJson]) -> RoaringBitmap {
        let mut result: Option<RoaringBitmap> = None;
        for (literal, column) in values.iter().zip(&self.columns) {
            let matching = column
                .values
                .iter()
                .enumerate()
                .filter(|(_, v)| {
                    let ord = compare_shaped(v.bytes(), literal.bytes());
                    match op {
                        RelationOp::Eq => ord == Ordering::Equal,
                        RelationOp::Ne => ord != Ordering::Equal,
                        RelationOp::Lt => ord == Ordering::Less,
                        RelationOp::Le => ord != Ordering::Greater,
                        RelationOp::Gt => ord == Ordering::Greater,
                        RelationOp::Ge => ord != Ordering::Less,
                    }
                })
                .fold(RoaringBitmap::new(), |acc, (i, _)| acc | &self.positions[column.offset + i]);
            result = Some(match result {
                Some(acc) => acc & matching,
                None => matching,
            });
        }
        result.unwrap_or_default()
    }
}

impl Index for BitarrayIndex {
    fn base(&self) -> &IndexBase {
        &self.base
    }

    fn insert(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        if self.ids.contains_key(&doc.rid) {
            return Ok(());
        }
        match self.mask(doc)? {
            Some(mask) => {
                let id = self.allocate_id(doc)?;
                for bit in 0..self.positions.len() {
                    if mask & (1u64 << bit) != 0 {
                        self.positions[bit].insert(id);
                    }
                }
                self.masks.insert(id, mask);
                Ok(())
            }
            None if self.supports_undefined => {
                let id = self.allocate_id(doc)?;
                self.undefined.insert(id);
                Ok(())
            }
            None => Err(Error::new(
                ErrorKind::DocumentAttributeMissing,
                format!("document '{}' lacks bitarray attributes", doc.key),
            )),
        }
    }

    /// Documents never stored here are ignored.
    fn remove(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        let Some(id) = self.ids.remove(&doc.rid) else {
            return Ok(());
        };
        self.handles.remove(&id);
        self.undefined.remove(id);
        if let Some(mask) = self.masks.remove(&id) {
            for bit in 0..self.positions.len() {
                if mask & (1u64 << bit) != 0 {
                    self.positions[bit].remove(id);
                }
            }
        }
        Ok(())
    }

    fn json(&self) -> Value {
        let mut map = self.base.json();
        let fields: Vec<Value> = self
            .attributes
            .iter()
            .map(|a| json!([a.name, a.values]))
            .collect();
        map.insert("fields".to_string(), Value::Array(fields));
        map.insert("undefined".to_string(), json!(self.supports_undefined));
        Value::Object(map)
    }

    fn memory(&self) -> usize {
        let bitmaps: usize = self.positions.iter().map(RoaringBitmap::serialized_size).sum();
        bitmaps
            + self.undefined.serialized_size()
            + self.handles.len() * (std::mem::size_of::<DocumentRef>() + 3 * std::mem::size_of::<u64>())
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
    use crate::shape::shaper::VocShaper;
    use crate::test_support::make_doc;

    fn attribute(name: &str, values: Vec<Value>) -> BitarrayAttribute {
        BitarrayAttribute { name: name.to_string(), values }
    }

    fn colours_and_sizes(undefined: bool) -> (Arc<dyn Shaper>, BitarrayIndex) {
        let shaper: Arc<dyn Shaper> = Arc::new(VocShaper::new());
        let idx = BitarrayIndex::new(
            Iid(5),
            Cid(1),
            Arc::clone(&shaper),
            vec![
                attribute("colour", vec![json!("red"), json!("green"), json!("blue")]),
                attribute("size", vec![json!(1), json!(2), json!(3)]),
            ],
            undefined,
            MAX_CARDINALITY,
        )
        .unwrap();
        (shaper, idx)
    }

    fn keys(docs: Vec<DocumentRef>) -> Vec<String> {
        let mut keys: Vec<String> = docs.into_iter().map(|d| d.key.clone()).collect();
        keys.sort();
        keys
    }

    #[test]
    fn cardinality_bound_is_one_word() {
        let shaper: Arc<dyn Shaper> = Arc::new(VocShaper::new());
        let domain = |n: usize| (0..n).map(|i| json!(i)).collect::<Vec<_>>();

        let ok = BitarrayIndex::new(
            Iid(1),
            Cid(1),
            Arc::clone(&shaper),
            vec![attribute("a", domain(40)), attribute("b", domain(24))],
            false,
            MAX_CARDINALITY,
        );
        assert_eq!(ok.unwrap().cardinality(), 64);

        let err = BitarrayIndex::new(
            Iid(1),
            Cid(1),
            Arc::clone(&shaper),
            vec![attribute("a", domain(40)), attribute("b", domain(25))],
            false,
            MAX_CARDINALITY,
        )
        .err()
        .unwrap();
        assert_eq!(err.kind, ErrorKind::BitarrayCreationFailureCardinality);
        assert!(err.kind.is_bitarray_creation_failure());

        let err = BitarrayIndex::new(Iid(1), Cid(1), shaper, vec![attribute("a", vec![])], false, 64)
            .err()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::BitarrayCreationFailureCardinality);
    }

    #[test]
    fn duplicates_are_rejected() {
        let shaper: Arc<dyn Shaper> = Arc::new(VocShaper::new());
        let err = BitarrayIndex::new(
            Iid(1),
            Cid(1),
            Arc::clone(&shaper),
            vec![attribute("a", vec![json!(1)]), attribute("a", vec![json!(2)])],
            false,
            64,
        )
        .err()
        .unwrap();
        assert_eq!(err.kind, ErrorKind::BitarrayCreationFailureDuplicateAttributes);

        let err = BitarrayIndex::new(
            Iid(1),
            Cid(1),
            shaper,
            vec![attribute("a", vec![json!(1), json!("x"), json!(1.0)])],
            false,
            64,
        )
        .err()
        .unwrap();
        assert_eq!(err.kind, ErrorKind::BitarrayCreationFailureDuplicateValues);
    }

    #[test]
    fn missing_attributes_use_the_undefined_bucket() {
        let (shaper, mut idx) = colours_and_sizes(true);
        let doc = make_doc(shaper.as_ref(), "u", json!({"colour": "red"}));
        idx.insert(&doc, false).unwrap();
        assert_eq!(keys(idx.lookup_undefined()), vec!["u"]);
        assert!(idx.lookup(IndexOperator::eq(vec![json!("red")])).unwrap().is_empty());

        idx.remove(&doc, false).unwrap();
        assert!(idx.lookup_undefined().is_empty());

        let (shaper, mut idx) = colours_and_sizes(false);
        let doc = make_doc(shaper.as_ref(), "u", json!({"colour": "red"}));
        let err = idx.insert(&doc, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DocumentAttributeMissing);
        idx.remove(&doc, false).unwrap();
    }

    #[test]
    fn values_outside_the_domain_are_rejected() {
        let (shaper, mut idx) = colours_and_sizes(true);
        let doc = make_doc(shaper.as_ref(), "x", json!({"colour": "pink", "size": 1}));
        let err = idx.insert(&doc, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BitarrayInsertUnsupportedValue);
        assert!(idx.is_empty());
    }

    #[test]
    fn operator_lookups() {
        let (shaper, mut idx) = colours_and_sizes(false);
        for (key, colour, size) in [("a", "red", 1), ("b", "red", 3), ("c", "blue", 2), ("d", "green", 3)] {
            let doc = make_doc(shaper.as_ref(), key, json!({"colour": colour, "size": size}));
            idx.insert(&doc, false).unwrap();
        }

        let eq = idx.lookup(IndexOperator::eq(vec![json!("red")])).unwrap();
        assert_eq!(keys(eq), vec!["a", "b"]);

        let both = idx.lookup(IndexOperator::eq(vec![json!("red"), json!(3)])).unwrap();
        assert_eq!(keys(both), vec!["b"]);

        let ne = idx.lookup(IndexOperator::ne(vec![json!("red")])).unwrap();
        assert_eq!(keys(ne), vec!["c", "d"]);

        let ge = IndexOperator::and(
            IndexOperator::ge(vec![json!("blue"), json!(2)]),
            IndexOperator::not(IndexOperator::eq(vec![json!("green")])),
        );
        assert_eq!(keys(idx.lookup(ge).unwrap()), vec!["b", "c"]);

        let or = IndexOperator::or(
            IndexOperator::eq(vec![json!("blue")]),
            IndexOperator::eq(vec![json!("green")]),
        );
        assert_eq!(keys(idx.lookup(or).unwrap()), vec!["c", "d"]);

        let err = idx.lookup(IndexOperator::lt(vec![json!(["red"])])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadParameter);
    }

    #[test]
    fn description_lists_value_domains() {
        let (_, idx) = colours_and_sizes(true);
        let json = idx.json();
        assert_eq!(json["type"], "bitarray");
        assert_eq!(json["fields"][0], json!(["colour", ["red", "green", "blue"]]));
        assert_eq!(json["undefined"], true);
    }
}
