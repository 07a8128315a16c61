use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::memory::zone::ZoneReservation;
use crate::shape::shaped::ShapedJson;

/// Collection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cid(pub u64);

/// Index identifier, unique within a collection. The primary index is always 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Iid(pub u64);

/// Revision identifier, assigned from the tick generator on every write
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rid(pub u64);

impl Iid {
    pub const PRIMARY: Iid = Iid(0);
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Iid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    Document,
    Edge,
}

/// `_from` / `_to` of an edge document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeEndpoints {
    pub from_cid: Cid,
    pub from_key: String,
    pub to_cid: Cid,
    pub to_key: String,
}

/// Master pointer of a stored document. Indexes hold clones of the `Arc`, never
/// copies of the data, so identity is pointer identity.
#[derive(Debug)]
pub struct DocMptr {
    pub key: String,
    pub rid: Rid,
    pub shaped: ShapedJson,
    pub edge: Option<EdgeEndpoints>,
    _memory: Option<ZoneReservation>,
}

pub type DocumentRef = Arc<DocMptr>;

impl DocMptr {
    pub fn new(
        key: String,
        rid: Rid,
        shaped: ShapedJson,
        edge: Option<EdgeEndpoints>,
        memory: Option<ZoneReservation>,
    ) -> Self {
        DocMptr {
            key,
            rid,
            shaped,
            edge,
            _memory: memory,
        }
    }

    pub fn byte_size(&self) -> usize {
        self.shaped.data.len() + self.key.len()
    }

    pub fn same(a: &DocumentRef, b: &DocumentRef) -> bool {
        Arc::ptr_eq(a, b)
    }
}
