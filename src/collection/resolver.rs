use std::collections::HashMap;

use parking_lot::RwLock;

use crate::core::types::Cid;

/// Collection id to name lookup shared by all collections of a database.
///
/// Edges store their endpoints by collection id; rendering them needs the
/// name so that `_from` and `_to` parse back as document handles.
#[derive(Debug, Default)]
pub struct CollectionNameResolver {
    names: RwLock<HashMap<Cid, String>>,
}

impl CollectionNameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, cid: Cid, name: &str) {
        self.names.write().insert(cid, name.to_string());
    }

    pub fn unregister(&self, cid: Cid) {
        self.names.write().remove(&cid);
    }

    pub fn name(&self, cid: Cid) -> Option<String> {
        self.names.read().get(&cid).cloned()
    }

    /// `"name/key"`, or `"cid/key"` for a collection that is not registered.
    pub fn document_handle(&self, cid: Cid, key: &str) -> String {
        match self.names.read().get(&cid) {
            Some(name) => format!("{}/{}", name, key),
            None => format!("{}/{}", cid, key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ids_fall_back_to_the_number() {
        let resolver = CollectionNameResolver::new();
        resolver.register(Cid(7), "people");
        assert_eq!(resolver.document_handle(Cid(7), "a"), "people/a");
        assert_eq!(resolver.document_handle(Cid(8), "a"), "8/a");

        resolver.unregister(Cid(7));
        assert_eq!(resolver.name(Cid(7)), None);
        assert_eq!(resolver.document_handle(Cid(7), "a"), "7/a");
    }
}
