use std::any::Any;

use serde_json::{Map, Value, json};

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, DocumentRef, Iid};
use crate::shape::shaped::ShapedSub;
use crate::shape::shaper::{Pid, Shaper};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    Primary,
    Edge,
    Hash,
    Skiplist,
    Fulltext,
    Bitarray,
    Cap,
    Geo1,
    Geo2,
}

impl IndexType {
    pub const ALL: [IndexType; 9] = [
        IndexType::Primary,
        IndexType::Edge,
        IndexType::Hash,
        IndexType::Skiplist,
        IndexType::Fulltext,
        IndexType::Bitarray,
        IndexType::Cap,
        IndexType::Geo1,
        IndexType::Geo2,
    ];

    /// External name used in index descriptions
    pub fn name(self) -> &'static str {
        match self {
            IndexType::Primary => "primary",
            IndexType::Edge => "edge",
            IndexType::Hash => "hash",
            IndexType::Skiplist => "skiplist",
            IndexType::Fulltext => "fulltext",
            IndexType::Bitarray => "bitarray",
            IndexType::Cap => "cap",
            IndexType::Geo1 => "geo1",
            IndexType::Geo2 => "geo2",
        }
    }

    pub fn from_name(name: &str) -> Option<IndexType> {
        IndexType::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Whether a query must bind every indexed attribute to use the index.
    pub fn needs_full_coverage(self) -> bool {
        matches!(
            self,
            IndexType::Primary | IndexType::Edge | IndexType::Hash | IndexType::Cap
        )
    }
}

/// Attributes and flags shared by every index
#[derive(Debug, Clone)]
pub struct IndexBase {
    pub iid: Iid,
    pub kind: IndexType,
    pub cid: Cid,
    pub unique: bool,
    pub fields: Vec<String>,
}

impl IndexBase {
    pub fn new(iid: Iid, kind: IndexType, cid: Cid, unique: bool, fields: Vec<String>) -> Self {
        IndexBase { iid, kind, cid, unique, fields }
    }

    /// `{id, type, unique, fields}`. Index types append their own attributes.
    pub fn json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("id".to_string(), json!(self.iid.0.to_string()));
        map.insert("type".to_string(), json!(self.kind.name()));
        map.insert("unique".to_string(), json!(self.unique));
        map.insert("fields".to_string(), json!(self.fields));
        map
    }
}

/// Contract every index implements. The collection drives each document through all
/// of its indexes with these calls while holding the collection write lock.
pub trait Index: Send + Sync {
    fn base(&self) -> &IndexBase;

    /// Adds a document. `DocumentAttributeMissing` means "not indexed here" and is
    /// not treated as a failure by the caller.
    fn insert(&mut self, doc: &DocumentRef, is_rollback: bool) -> Result<()>;

    fn remove(&mut self, doc: &DocumentRef, is_rollback: bool) -> Result<()>;

    fn json(&self) -> Value;

    fn memory(&self) -> usize;

    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }

    /// Hint about the number of documents about to be inserted.
    fn size_hint(&mut self, _size: usize) -> Result<()> {
        Ok(())
    }

    /// Documents to evict after `doc` was inserted into every index.
    fn post_insert(&mut self, _doc: &DocumentRef) -> Vec<DocumentRef> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn iid(&self) -> Iid {
        self.base().iid
    }

    fn kind(&self) -> IndexType {
        self.base().kind
    }
}

/// Interned attribute paths of an index, in field order.
#[derive(Debug, Clone)]
pub struct PathList {
    pub names: Vec<String>,
    pub pids: Vec<Pid>,
}

impl PathList {
    pub fn new(shaper: &dyn Shaper, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::new(ErrorKind::BadParameter, "index needs at least one attribute"));
        }
        let pids = names
            .iter()
            .map(|name| shaper.find_or_create_attribute_path_by_name(name))
            .collect::<Result<Vec<_>>>()?;
        Ok(PathList { names: names.to_vec(), pids })
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    /// One sub-object per path, or `DocumentAttributeMissing` if any is absent.
    pub fn extract(&self, shaper: &dyn Shaper, doc: &DocumentRef) -> Result<Vec<ShapedSub>> {
        let mut subs = Vec::with_capacity(self.pids.len());
        for (pid, name) in self.pids.iter().zip(&self.names) {
            match shaper.extract_shaped_json(&doc.shaped, *pid)? {
                Some(sub) => subs.push(sub),
                None => {
                    return Err(Error::new(
                        ErrorKind::DocumentAttributeMissing,
                        format!("document '{}' lacks attribute '{}'", doc.key, name),
                    ));
                }
            }
        }
        Ok(subs)
    }
}

/// A numeric index id as found in `"id"` attributes and handles.
pub fn validate_index_id(id: &str) -> Option<Iid> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok().map(Iid)
}

/// Splits `"collection/123"` into its parts.
pub fn validate_index_handle(handle: &str) -> Result<(&str, Iid)> {
    let bad = || Error::new(ErrorKind::IndexHandleBad, format!("invalid index handle '{}'", handle));
    let (collection, id) = handle.split_once('/').ok_or_else(bad)?;
    if !crate::core::utils::is_valid_collection_name(collection, true) {
        return Err(bad());
    }
    let iid = validate_index_id(id).ok_or_else(bad)?;
    Ok((collection, iid))
}

/// Reads the `"id"` attribute of a description, given as string or number.
pub fn iid_from_json(json: &Value) -> Option<Iid> {
    match json.get("id")? {
        Value::String(s) => validate_index_id(s),
        Value::Number(n) => n.as_u64().map(Iid),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_round_trip() {
        for kind in IndexType::ALL {
            assert_eq!(IndexType::from_name(kind.name()), Some(kind));
        }
        assert_eq!(IndexType::from_name("btree"), None);
    }

    #[test]
    fn handles_are_validated() {
        let (coll, iid) = validate_index_handle("users/123").unwrap();
        assert_eq!(coll, "users");
        assert_eq!(iid, Iid(123));
        assert_eq!(validate_index_handle("users").unwrap_err().kind, ErrorKind::IndexHandleBad);
        assert!(validate_index_handle("users/12a").is_err());
        assert!(validate_index_handle("1users/12").is_err());
        assert!(validate_index_id("").is_none());
    }

    #[test]
    fn id_is_read_from_string_or_number() {
        assert_eq!(iid_from_json(&json!({"id": "17"})), Some(Iid(17)));
        assert_eq!(iid_from_json(&json!({"id": 18})), Some(Iid(18)));
        assert_eq!(iid_from_json(&json!({"id": true})), None);
    }
}
