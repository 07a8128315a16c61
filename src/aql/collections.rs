use std::collections::BTreeSet;

use tracing::debug;

use crate::collection::vocbase::{CollectionHandle, Vocbase};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::utils::is_valid_collection_name;

/// Collections a query uses, by name
#[derive(Default)]
pub struct CollectionRegistry {
    names: BTreeSet<String>,
    handles: Vec<CollectionHandle>,
}

impl CollectionRegistry {
    /// Registers a collection name. Registering a name twice is a no-op.
    pub fn add(&mut self, name: &str) -> Result<()> {
        if !is_valid_collection_name(name, true) {
            return Err(Error::new(ErrorKind::IllegalName, format!("illegal collection name '{}'", name)));
        }
        self.names.insert(name.to_string());
        Ok(())
    }

    /// Names in ascending order, the order collections are locked in.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Resolves every name against the database.
    pub fn setup(&mut self, vocbase: &Vocbase) -> Result<&[CollectionHandle]> {
        let mut handles = Vec::with_capacity(self.names.len());
        for name in &self.names {
            let handle = vocbase.lookup_collection_by_name(name).ok_or_else(|| {
                Error::new(ErrorKind::CollectionNotFound, format!("collection '{}' not found", name))
            })?;
            debug!(target: "aql.collections", collection = %name, cid = handle.cid.0, "using collection");
            handles.push(handle);
        }
        self.handles = handles;
        Ok(&self.handles)
    }

    /// Handles resolved by the last `setup`.
    pub fn handles(&self) -> &[CollectionHandle] {
        &self.handles
    }
}
