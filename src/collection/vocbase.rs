use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::collection::document::{CollectionEnv, CollectionInfo, DocumentCollection, SharedCollection};
use crate::collection::resolver::CollectionNameResolver;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, CollectionType};
use crate::core::utils::{is_valid_collection_name, new_tick, update_tick};
use crate::index::persist::load_index_files;
use crate::memory::zone::MemoryZones;
use crate::replication::{ReplicationLogger, TracingReplicationLogger};
use crate::shape::shaper::{Shaper, VocShaper};
use crate::storage::file_lock::FileLock;
use crate::storage::layout::{StorageLayout, load_json};

/// A registered collection. Cloning shares the collection.
#[derive(Clone)]
pub struct CollectionHandle {
    pub cid: Cid,
    pub name: String,
    pub kind: CollectionType,
    pub wait_for_sync: bool,
    pub collection: SharedCollection,
}

struct Registry {
    by_id: BTreeMap<Cid, CollectionHandle>,
    names: HashMap<String, Cid>,
    resolver: Arc<CollectionNameResolver>,
}

impl Registry {
    fn new(resolver: Arc<CollectionNameResolver>) -> Self {
        Registry {
            by_id: BTreeMap::new(),
            names: HashMap::new(),
            resolver,
        }
    }

    fn add(&mut self, handle: CollectionHandle) {
        self.resolver.register(handle.cid, &handle.name);
        self.names.insert(handle.name.clone(), handle.cid);
        self.by_id.insert(handle.cid, handle);
    }

    fn remove(&mut self, name: &str) -> Option<CollectionHandle> {
        let cid = self.names.remove(name)?;
        self.resolver.unregister(cid);
        self.by_id.remove(&cid)
    }
}

/// A database directory and its collections
pub struct Vocbase {
    env: CollectionEnv,
    layout: StorageLayout,
    collections: RwLock<Registry>,
    _lock: FileLock,
}

impl Vocbase {
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with(config, Arc::new(TracingReplicationLogger))
    }

    /// Opens or creates the database directory and loads every collection in it.
    pub fn open_with(config: Config, replication: Arc<dyn ReplicationLogger>) -> Result<Self> {
        let layout = StorageLayout::new(config.storage_path.clone())?;
        let lock = FileLock::acquire(&layout)?;
        let env = CollectionEnv {
            zones: MemoryZones::from_config(&config),
            config: Arc::new(config),
            shaper: Arc::new(VocShaper::new()),
            layout: Some(layout.clone()),
            replication,
            resolver: Arc::new(CollectionNameResolver::new()),
        };

        let vocbase = Vocbase {
            collections: RwLock::new(Registry::new(Arc::clone(&env.resolver))),
            env,
            layout,
            _lock: lock,
        };
        vocbase.load_collections()?;
        info!(
            target: "vocbase.open",
            path = %vocbase.layout.base_dir.display(),
            collections = vocbase.collections.read().by_id.len(),
            "database opened"
        );
        Ok(vocbase)
    }

    fn load_collections(&self) -> Result<()> {
        let mut registry = self.collections.write();
        for cid in self.layout.collection_ids()? {
            update_tick(cid.0);
            let path = self.layout.parameter_path(cid);
            if !path.exists() {
                warn!(target: "vocbase.open", cid = cid.0, "collection directory without parameter.json");
                continue;
            }
            let info: CollectionInfo = serde_json::from_value(load_json(&path)?)?;
            if info.deleted {
                debug!(target: "vocbase.open", cid = cid.0, "skipping deleted collection");
                continue;
            }
            let mut collection = DocumentCollection::new(info.clone(), self.env.clone())?;
            for description in load_index_files(&self.layout, cid)? {
                collection.load_index(&description)?;
            }
            registry.add(CollectionHandle {
                cid,
                name: info.name,
                kind: info.kind,
                wait_for_sync: info.wait_for_sync,
                collection: Arc::new(RwLock::new(collection)),
            });
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.env.config
    }

    pub fn shaper(&self) -> &Arc<dyn Shaper> {
        &self.env.shaper
    }

    pub fn zones(&self) -> &MemoryZones {
        &self.env.zones
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn create_collection(&self, name: &str, kind: CollectionType) -> Result<CollectionHandle> {
        if !is_valid_collection_name(name, true) {
            return Err(Error::new(ErrorKind::IllegalName, format!("illegal collection name '{}'", name)));
        }
        let mut registry = self.collections.write();
        if registry.names.contains_key(name) {
            return Err(Error::new(ErrorKind::DuplicateName, format!("collection '{}' exists", name)));
        }

        let cid = Cid(new_tick());
        let mut info = CollectionInfo::new(cid, name, kind);
        info.wait_for_sync = self.env.config.wait_for_sync;
        let wait_for_sync = info.wait_for_sync;
        let collection = DocumentCollection::new(info, self.env.clone())?;
        collection.persist_parameters()?;

        let handle = CollectionHandle {
            cid,
            name: name.to_string(),
            kind,
            wait_for_sync,
            collection: Arc::new(RwLock::new(collection)),
        };
        registry.add(handle.clone());
        info!(target: "vocbase.create", cid = cid.0, name, "collection created");
        Ok(handle)
    }

    /// Unregisters the collection and removes its directory.
    pub fn drop_collection(&self, name: &str) -> Result<()> {
        let handle = self
            .collections
            .write()
            .remove(name)
            .ok_or_else(|| Error::new(ErrorKind::CollectionNotFound, format!("collection '{}' not found", name)))?;

        handle.collection.write().mark_deleted()?;
        let dir = self.layout.collection_dir(handle.cid);
        if let Err(err) = fs::remove_dir_all(&dir) {
            warn!(target: "vocbase.drop", path = %dir.display(), %err, "cannot remove collection directory");
        }
        info!(target: "vocbase.drop", cid = handle.cid.0, name, "collection dropped");
        Ok(())
    }

    pub fn lookup_collection_by_name(&self, name: &str) -> Option<CollectionHandle> {
        let registry = self.collections.read();
        let cid = registry.names.get(name)?;
        registry.by_id.get(cid).cloned()
    }

    pub fn lookup_collection_by_id(&self, cid: Cid) -> Option<CollectionHandle> {
        self.collections.read().by_id.get(&cid).cloned()
    }

    /// By name, or by numeric id given as a string.
    pub fn resolve_collection(&self, name_or_id: &str) -> Result<CollectionHandle> {
        self.lookup_collection_by_name(name_or_id)
            .or_else(|| name_or_id.parse().ok().and_then(|id| self.lookup_collection_by_id(Cid(id))))
            .ok_or_else(|| {
                Error::new(ErrorKind::CollectionNotFound, format!("collection '{}' not found", name_or_id))
            })
    }

    /// Splits a document handle `"collection/key"` into collection id and key.
    pub fn parse_document_handle(&self, handle: &str) -> Result<(Cid, String)> {
        let (collection, key) = handle
            .split_once('/')
            .ok_or_else(|| Error::new(ErrorKind::DocumentKeyBad, format!("invalid document handle '{}'", handle)))?;
        if key.is_empty() {
            return Err(Error::new(ErrorKind::DocumentKeyBad, format!("invalid document handle '{}'", handle)));
        }
        let handle = self.resolve_collection(collection)?;
        Ok((handle.cid, key.to_string()))
    }

    /// All collections sorted by name.
    pub fn collections(&self) -> Vec<CollectionHandle> {
        let mut all: Vec<CollectionHandle> = self.collections.read().by_id.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
