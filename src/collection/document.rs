use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, trace, warn};

use crate::collection::key::{KeyGenerator, KeyOptions};
use crate::collection::resolver::CollectionNameResolver;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, CollectionType, DocMptr, DocumentRef, EdgeEndpoints, Iid, Rid};
use crate::core::utils::{new_tick, update_tick};
use crate::index::base::{Index, IndexType, iid_from_json};
use crate::index::comparator::index_comparator;
use crate::index::edge::EdgeIndex;
use crate::index::factory::{IndexSettings, create_index_from_json};
use crate::index::persist::{remove_index_file, save_index};
use crate::index::primary::PrimaryIndex;
use crate::memory::barrier::BarrierList;
use crate::memory::zone::MemoryZones;
use crate::replication::{ReplicationLogger, TracingReplicationLogger};
use crate::shape::shaper::{Shaper, VocShaper};
use crate::storage::layout::{StorageLayout, save_json};

/// Attributes managed by the collection rather than stored in the body
pub const SYSTEM_ATTRIBUTES: [&str; 5] = ["_key", "_id", "_rev", "_from", "_to"];

pub type SharedCollection = Arc<RwLock<DocumentCollection>>;

/// Contents of `parameter.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    pub cid: Cid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CollectionType,
    #[serde(default)]
    pub wait_for_sync: bool,
    #[serde(default)]
    pub key_options: KeyOptions,
    #[serde(default)]
    pub deleted: bool,
}

impl CollectionInfo {
    pub fn new(cid: Cid, name: &str, kind: CollectionType) -> Self {
        CollectionInfo {
            cid,
            name: name.to_string(),
            kind,
            wait_for_sync: false,
            key_options: KeyOptions::default(),
            deleted: false,
        }
    }
}

/// Services shared by every collection of a database
#[derive(Clone)]
pub struct CollectionEnv {
    pub config: Arc<Config>,
    pub shaper: Arc<dyn Shaper>,
    pub zones: MemoryZones,
    pub layout: Option<StorageLayout>,
    pub replication: Arc<dyn ReplicationLogger>,
    pub resolver: Arc<CollectionNameResolver>,
}

impl CollectionEnv {
    /// Environment without a database directory; nothing is persisted.
    pub fn in_memory(config: Config) -> Self {
        CollectionEnv {
            zones: MemoryZones::from_config(&config),
            config: Arc::new(config),
            shaper: Arc::new(VocShaper::new()),
            layout: None,
            replication: Arc::new(TracingReplicationLogger),
            resolver: Arc::new(CollectionNameResolver::new()),
        }
    }
}

/// Expected revision check applied by updates and removals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    #[default]
    LastWrite,
    /// fail with `Conflict` unless the stored revision is the given one
    Error(Rid),
}

impl UpdatePolicy {
    pub fn check(&self, doc: &DocumentRef) -> Result<()> {
        match self {
            UpdatePolicy::Error(expected) if *expected != doc.rid => Err(Error::new(
                ErrorKind::Conflict,
                format!("document '{}' has revision {}, expected {}", doc.key, doc.rid, expected),
            )),
            _ => Ok(()),
        }
    }
}

/// Outcome of a write
#[derive(Debug, Clone)]
pub struct Written {
    pub document: DocumentRef,
    /// the revision replaced by an update
    pub previous: Option<DocumentRef>,
    /// documents removed by a cap constraint afterwards
    pub evicted: Vec<DocumentRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionFigures {
    pub count: usize,
    pub index_count: usize,
    pub index_memory: usize,
    pub barriers: usize,
    pub pending_release: usize,
}

/// `DocumentAttributeMissing` only means the index does not cover the document.
fn soft(result: Result<()>) -> Result<()> {
    match result {
        Err(err) if err.kind == ErrorKind::DocumentAttributeMissing => Ok(()),
        other => other,
    }
}

fn merge_objects(target: &mut Map<String, Value>, patch: &Map<String, Value>, keep_null: bool) {
    for (name, value) in patch {
        match (target.get_mut(name), value) {
            (Some(Value::Object(old)), Value::Object(new)) => merge_objects(old, new, keep_null),
            (_, Value::Null) if !keep_null => {
                target.remove(name);
            }
            _ => {
                target.insert(name.clone(), value.clone());
            }
        }
    }
}

/// A collection of documents with its primary index and secondary indexes.
///
/// Every method expects the caller to hold the collection lock: a read lock for
/// lookups and a write lock for anything taking `&mut self`. A write touches the
/// primary index first and then each secondary index in creation order. A hard
/// failure in any index removes the document again from every index that already
/// took it, newest first, so a failed write leaves no trace.
pub struct DocumentCollection {
    info: CollectionInfo,
    env: CollectionEnv,
    settings: IndexSettings,
    keys: KeyGenerator,
    primary: PrimaryIndex,
    indexes: Vec<Box<dyn Index>>,
    headers: BTreeMap<Rid, DocumentRef>,
    barriers: Arc<BarrierList>,
}

impl DocumentCollection {
    pub fn new(info: CollectionInfo, env: CollectionEnv) -> Result<Self> {
        let settings = IndexSettings::new(
            info.cid,
            Arc::clone(&env.shaper),
            Arc::clone(&env.zones.unknown),
            &env.config,
        );
        let primary = PrimaryIndex::new(info.cid, &settings.zone, settings.hash_initial_size)?;
        let mut indexes: Vec<Box<dyn Index>> = Vec::new();
        if info.kind == CollectionType::Edge {
            let iid = Iid(new_tick());
            indexes.push(Box::new(EdgeIndex::new(iid, info.cid, &settings.zone, settings.hash_initial_size)?));
        }
        trace!(target: "collection.open", cid = info.cid.0, name = %info.name, "collection initialised");
        Ok(DocumentCollection {
            keys: KeyGenerator::new(&info.key_options)?,
            barriers: BarrierList::new(Arc::clone(&env.zones.unknown)),
            info,
            env,
            settings,
            primary,
            indexes,
            headers: BTreeMap::new(),
        })
    }

    pub fn info(&self) -> &CollectionInfo {
        &self.info
    }

    pub fn cid(&self) -> Cid {
        self.info.cid
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn kind(&self) -> CollectionType {
        self.info.kind
    }

    pub fn shaper(&self) -> &Arc<dyn Shaper> {
        &self.env.shaper
    }

    pub fn barriers(&self) -> &Arc<BarrierList> {
        &self.barriers
    }

    pub fn count(&self) -> usize {
        self.primary.len()
    }

    pub fn primary(&self) -> &PrimaryIndex {
        &self.primary
    }

    /// Writes `parameter.json` when the collection lives in a database directory.
    pub fn persist_parameters(&self) -> Result<()> {
        let Some(layout) = &self.env.layout else {
            return Ok(());
        };
        fs::create_dir_all(layout.collection_dir(self.info.cid))?;
        let value = serde_json::to_value(&self.info)?;
        let sync = self.env.config.force_sync_properties || self.info.wait_for_sync;
        save_json(&layout.parameter_path(self.info.cid), &value, sync)
    }

    pub(crate) fn mark_deleted(&mut self) -> Result<()> {
        self.info.deleted = true;
        self.persist_parameters()
    }

    // ----- documents -----

    pub fn lookup(&self, key: &str) -> Option<&DocumentRef> {
        self.primary.lookup(key)
    }

    pub fn random_document(&self) -> Option<&DocumentRef> {
        self.primary.random_document()
    }

    /// Documents in revision order, oldest first.
    pub fn ordered(&self) -> impl DoubleEndedIterator<Item = &DocumentRef> + ExactSizeIterator {
        self.headers.values()
    }

    /// The stored body plus `_key`, `_id`, `_rev` and, for edges, `_from` and `_to`.
    pub fn document_json(&self, doc: &DocumentRef) -> Result<Value> {
        let mut body = match self.env.shaper.to_json(&doc.shaped)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        body.insert("_key".to_string(), json!(doc.key));
        body.insert("_id".to_string(), json!(format!("{}/{}", self.info.name, doc.key)));
        body.insert("_rev".to_string(), json!(doc.rid.to_string()));
        if let Some(edge) = &doc.edge {
            let resolver = &self.env.resolver;
            body.insert("_from".to_string(), json!(resolver.document_handle(edge.from_cid, &edge.from_key)));
            body.insert("_to".to_string(), json!(resolver.document_handle(edge.to_cid, &edge.to_key)));
        }
        Ok(Value::Object(body))
    }

    fn make_document(
        &self,
        key: String,
        body: Map<String, Value>,
        edge: Option<EdgeEndpoints>,
    ) -> Result<DocumentRef> {
        let mut body = body;
        for name in SYSTEM_ATTRIBUTES {
            body.remove(name);
        }
        let shaped = self.env.shaper.shape_json(&Value::Object(body))?;
        let memory = self.env.zones.unknown.allocate(shaped.bytes().len() + key.len())?;
        Ok(Arc::new(DocMptr::new(key, Rid(new_tick()), shaped, edge, Some(memory))))
    }

    fn check_edge(&self, edge: &Option<EdgeEndpoints>) -> Result<()> {
        match (self.info.kind, edge) {
            (CollectionType::Edge, None) => Err(Error::new(
                ErrorKind::BadParameter,
                format!("edge collection '{}' needs _from and _to", self.info.name),
            )),
            (CollectionType::Document, Some(_)) => Err(Error::new(
                ErrorKind::BadParameter,
                format!("'{}' is not an edge collection", self.info.name),
            )),
            _ => Ok(()),
        }
    }

    /// Creates a document. The key comes from `_key` of the body or the key generator.
    pub fn insert(&mut self, body: &Value, edge: Option<EdgeEndpoints>) -> Result<Written> {
        let Value::Object(map) = body else {
            return Err(Error::new(ErrorKind::DocumentTypeInvalid, "document must be an object"));
        };
        self.check_edge(&edge)?;
        let user_key = match map.get("_key") {
            None => None,
            Some(Value::String(key)) => Some(key.as_str()),
            Some(_) => return Err(Error::new(ErrorKind::DocumentKeyBad, "_key must be a string")),
        };
        let key = self.keys.generate(user_key)?;
        let doc = self.make_document(key, map.clone(), edge)?;
        self.insert_document(&doc, false)?;
        let evicted = self.evict_after(&doc);
        Ok(Written { document: doc, previous: None, evicted })
    }

    /// Replaces the body of an existing document, keeping key and edge endpoints.
    pub fn update(&mut self, key: &str, body: &Value, policy: UpdatePolicy) -> Result<Written> {
        let Value::Object(map) = body else {
            return Err(Error::new(ErrorKind::DocumentTypeInvalid, "document must be an object"));
        };
        let old = self.existing(key, policy)?;
        self.write_revision(old, map.clone())
    }

    /// Merges `patch` into the stored body. Null values remove attributes unless
    /// `keep_null` is set.
    pub fn patch(&mut self, key: &str, patch: &Value, policy: UpdatePolicy, keep_null: bool) -> Result<Written> {
        let Value::Object(patch) = patch else {
            return Err(Error::new(ErrorKind::DocumentTypeInvalid, "patch must be an object"));
        };
        let old = self.existing(key, policy)?;
        let mut body = match self.env.shaper.to_json(&old.shaped)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merge_objects(&mut body, patch, keep_null);
        self.write_revision(old, body)
    }

    fn existing(&self, key: &str, policy: UpdatePolicy) -> Result<DocumentRef> {
        let doc = self
            .primary
            .lookup(key)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::DocumentNotFound, format!("document '{}' not found", key)))?;
        policy.check(&doc)?;
        Ok(doc)
    }

    fn write_revision(&mut self, old: DocumentRef, body: Map<String, Value>) -> Result<Written> {
        let new = self.make_document(old.key.clone(), body, old.edge.clone())?;
        self.replace_document(&old, &new, false)?;
        let evicted = self.evict_after(&new);
        Ok(Written { document: new, previous: Some(old), evicted })
    }

    pub fn remove(&mut self, key: &str, policy: UpdatePolicy) -> Result<DocumentRef> {
        let doc = self.existing(key, policy)?;
        self.remove_document(&doc, false)?;
        Ok(doc)
    }

    // ----- index chain -----

    /// Adds a document to every index, or to none of them.
    pub(crate) fn insert_document(&mut self, doc: &DocumentRef, is_rollback: bool) -> Result<()> {
        self.primary.insert(doc, is_rollback)?;
        for i in 0..self.indexes.len() {
            if let Err(err) = soft(self.indexes[i].insert(doc, is_rollback)) {
                debug!(
                    target: "collection.insert",
                    key = %doc.key,
                    iid = self.indexes[i].iid().0,
                    %err,
                    "rolling back document insert"
                );
                for j in (0..i).rev() {
                    if let Err(undo) = soft(self.indexes[j].remove(doc, true)) {
                        warn!(target: "collection.insert", iid = self.indexes[j].iid().0, %undo, "rollback failed");
                    }
                }
                if let Err(undo) = self.primary.remove(doc, true) {
                    warn!(target: "collection.insert", %undo, "primary rollback failed");
                }
                return Err(err);
            }
        }
        self.headers.insert(doc.rid, Arc::clone(doc));
        Ok(())
    }

    /// Removes a document from every index and hands it to the barrier list.
    pub(crate) fn remove_document(&mut self, doc: &DocumentRef, is_rollback: bool) -> Result<()> {
        match self.primary.lookup(&doc.key) {
            Some(stored) if DocMptr::same(stored, doc) => {}
            _ => {
                return Err(Error::new(
                    ErrorKind::DocumentNotFound,
                    format!("document '{}' not found", doc.key),
                ));
            }
        }
        let n = self.indexes.len();
        for i in (0..n).rev() {
            if let Err(err) = soft(self.indexes[i].remove(doc, is_rollback)) {
                for j in i + 1..n {
                    if let Err(undo) = soft(self.indexes[j].insert(doc, true)) {
                        warn!(target: "collection.remove", iid = self.indexes[j].iid().0, %undo, "rollback failed");
                    }
                }
                return Err(err);
            }
        }
        self.primary.remove(doc, is_rollback)?;
        self.headers.remove(&doc.rid);
        self.barriers.defer_release(Arc::clone(doc));
        Ok(())
    }

    /// Swaps `old` for `new` in every index, restoring `old` on failure.
    pub(crate) fn replace_document(&mut self, old: &DocumentRef, new: &DocumentRef, is_rollback: bool) -> Result<()> {
        match self.primary.lookup(&old.key) {
            Some(stored) if DocMptr::same(stored, old) => {}
            _ => {
                return Err(Error::new(
                    ErrorKind::DocumentNotFound,
                    format!("document '{}' not found", old.key),
                ));
            }
        }
        let n = self.indexes.len();
        for i in (0..n).rev() {
            if let Err(err) = soft(self.indexes[i].remove(old, is_rollback)) {
                for j in i + 1..n {
                    if let Err(undo) = soft(self.indexes[j].insert(old, true)) {
                        warn!(target: "collection.update", iid = self.indexes[j].iid().0, %undo, "rollback failed");
                    }
                }
                return Err(err);
            }
        }
        for i in 0..n {
            if let Err(err) = soft(self.indexes[i].insert(new, is_rollback)) {
                debug!(target: "collection.update", key = %new.key, %err, "rolling back document update");
                for j in (0..i).rev() {
                    if let Err(undo) = soft(self.indexes[j].remove(new, true)) {
                        warn!(target: "collection.update", iid = self.indexes[j].iid().0, %undo, "rollback failed");
                    }
                }
                for j in 0..n {
                    if let Err(undo) = soft(self.indexes[j].insert(old, true)) {
                        warn!(target: "collection.update", iid = self.indexes[j].iid().0, %undo, "rollback failed");
                    }
                }
                return Err(err);
            }
        }
        self.primary.replace(new)?;
        self.headers.remove(&old.rid);
        self.headers.insert(new.rid, Arc::clone(new));
        self.barriers.defer_release(Arc::clone(old));
        Ok(())
    }

    /// Runs post-insert hooks and removes whatever they ask to evict.
    fn evict_after(&mut self, doc: &DocumentRef) -> Vec<DocumentRef> {
        let victims: Vec<DocumentRef> = self
            .indexes
            .iter_mut()
            .flat_map(|index| index.post_insert(doc))
            .collect();
        let mut evicted = Vec::with_capacity(victims.len());
        for victim in victims {
            match self.remove_document(&victim, false) {
                Ok(()) => evicted.push(victim),
                Err(err) => warn!(target: "collection.evict", key = %victim.key, %err, "eviction failed"),
            }
        }
        evicted
    }

    /// Undoes an insert made earlier in an aborted transaction.
    pub fn rollback_insert(&mut self, doc: &DocumentRef) -> Result<()> {
        self.remove_document(doc, true)
    }

    /// Puts `old` back in place of `new`.
    pub fn rollback_update(&mut self, new: &DocumentRef, old: &DocumentRef) -> Result<()> {
        self.replace_document(new, old, true)
    }

    pub fn rollback_remove(&mut self, doc: &DocumentRef) -> Result<()> {
        self.insert_document(doc, true)
    }

    // ----- indexes -----

    pub fn index(&self, iid: Iid) -> Option<&dyn Index> {
        if iid == Iid::PRIMARY {
            return Some(&self.primary);
        }
        self.indexes.iter().find(|i| i.iid() == iid).map(|i| i.as_ref())
    }

    /// Typed access to an index, e.g. `index_as::<SkiplistIndex>(iid)` for lookups.
    pub fn index_as<T: Index + 'static>(&self, iid: Iid) -> Option<&T> {
        self.index(iid)?.as_any().downcast_ref::<T>()
    }

    pub fn edge_index(&self) -> Option<&EdgeIndex> {
        self.indexes.iter().find_map(|i| i.as_any().downcast_ref::<EdgeIndex>())
    }

    /// Descriptions of all indexes, the primary index first.
    pub fn indexes_json(&self) -> Vec<Value> {
        std::iter::once(self.primary.json())
            .chain(self.indexes.iter().map(|i| i.json()))
            .collect()
    }

    fn fill_index(&self, index: &mut dyn Index) -> Result<()> {
        index.size_hint(self.headers.len())?;
        for doc in self.headers.values() {
            soft(index.insert(doc, false))?;
        }
        Ok(())
    }

    /// Returns the existing index matching `description`, or creates, fills and
    /// persists a new one. The flag tells whether the index was created.
    pub fn ensure_index(&mut self, description: Value) -> Result<(Value, bool)> {
        let Value::Object(mut map) = description else {
            return Err(Error::new(ErrorKind::BadParameter, "index description must be an object"));
        };
        let kind = map
            .get("type")
            .and_then(Value::as_str)
            .and_then(IndexType::from_name)
            .ok_or_else(|| Error::new(ErrorKind::BadParameter, "unknown or missing index type"))?;
        if matches!(kind, IndexType::Primary | IndexType::Edge) {
            return Err(Error::new(ErrorKind::Forbidden, format!("cannot create a {} index", kind.name())));
        }

        let probe = Value::Object(map.clone());
        for existing in std::iter::once(&self.primary as &dyn Index).chain(self.indexes.iter().map(|i| i.as_ref())) {
            let json = existing.json();
            if index_comparator(&json, &probe) {
                return Ok((json, false));
            }
        }
        if kind == IndexType::Cap && self.indexes.iter().any(|i| i.kind() == IndexType::Cap) {
            return Err(Error::new(
                ErrorKind::CapConstraintAlreadyDefined,
                format!("collection '{}' already has a cap constraint", self.info.name),
            ));
        }

        match iid_from_json(&probe) {
            Some(iid) if self.index(iid).is_some() => {
                return Err(Error::new(ErrorKind::BadParameter, format!("index id {} is taken", iid)));
            }
            Some(iid) => update_tick(iid.0),
            None => {
                map.insert("id".to_string(), json!(new_tick().to_string()));
            }
        }
        let description = Value::Object(map);

        let mut index = create_index_from_json(&description, &self.settings)?;
        self.fill_index(index.as_mut())?;
        let json = index.json();

        if let Some(layout) = &self.env.layout {
            save_index(layout, index.as_ref(), self.env.config.force_sync_properties)?;
            self.env.replication.log_create_index(
                self.info.cid,
                &self.info.name,
                index.iid(),
                &json,
                self.env.config.server_id,
            );
        }
        let iid = index.iid();
        self.indexes.push(index);
        trace!(target: "index.create", cid = self.info.cid.0, iid = iid.0, kind = kind.name(), "index attached");

        if let Some(newest) = self.headers.values().next_back().cloned() {
            self.evict_after(&newest);
        }
        Ok((json, true))
    }

    /// Attaches an index read from disk without persisting it again.
    pub(crate) fn load_index(&mut self, description: &Value) -> Result<()> {
        let kind = description.get("type").and_then(Value::as_str).and_then(IndexType::from_name);
        if matches!(kind, Some(IndexType::Primary | IndexType::Edge)) {
            return Ok(());
        }
        let mut index = create_index_from_json(description, &self.settings)?;
        update_tick(index.iid().0);
        self.fill_index(index.as_mut())?;
        self.indexes.push(index);
        Ok(())
    }

    pub fn ensure_hash_index(&mut self, fields: &[&str], unique: bool) -> Result<(Value, bool)> {
        self.ensure_index(json!({"type": "hash", "unique": unique, "fields": fields}))
    }

    pub fn ensure_skiplist_index(&mut self, fields: &[&str], unique: bool) -> Result<(Value, bool)> {
        self.ensure_index(json!({"type": "skiplist", "unique": unique, "fields": fields}))
    }

    pub fn ensure_fulltext_index(&mut self, field: &str, min_length: i64) -> Result<(Value, bool)> {
        self.ensure_index(json!({"type": "fulltext", "unique": false, "fields": [field], "minLength": min_length}))
    }

    pub fn ensure_bitarray_index(&mut self, attributes: &[(&str, Vec<Value>)], undefined: bool) -> Result<(Value, bool)> {
        let fields: Vec<Value> = attributes.iter().map(|(name, values)| json!([name, values])).collect();
        self.ensure_index(json!({"type": "bitarray", "unique": false, "fields": fields, "undefined": undefined}))
    }

    pub fn ensure_cap_constraint(&mut self, size: usize, byte_size: usize) -> Result<(Value, bool)> {
        self.ensure_index(json!({"type": "cap", "size": size, "byteSize": byte_size, "fields": []}))
    }

    pub fn ensure_geo_index1(
        &mut self,
        field: &str,
        geo_json: bool,
        constraint: bool,
        ignore_null: bool,
    ) -> Result<(Value, bool)> {
        self.ensure_index(json!({
            "type": "geo1",
            "fields": [field],
            "geoJson": geo_json,
            "constraint": constraint,
            "unique": constraint,
            "ignoreNull": ignore_null,
        }))
    }

    pub fn ensure_geo_index2(
        &mut self,
        latitude: &str,
        longitude: &str,
        constraint: bool,
        ignore_null: bool,
    ) -> Result<(Value, bool)> {
        self.ensure_index(json!({
            "type": "geo2",
            "fields": [latitude, longitude],
            "constraint": constraint,
            "unique": constraint,
            "ignoreNull": ignore_null,
        }))
    }

    /// Drops a secondary index. The primary and edge indexes cannot be dropped.
    pub fn drop_index(&mut self, iid: Iid) -> Result<()> {
        if iid == Iid::PRIMARY {
            return Err(Error::new(ErrorKind::Forbidden, "cannot drop the primary index"));
        }
        let position = self
            .indexes
            .iter()
            .position(|i| i.iid() == iid)
            .ok_or_else(|| Error::new(ErrorKind::IndexNotFound, format!("index {} not found", iid)))?;
        if self.indexes[position].kind() == IndexType::Edge {
            return Err(Error::new(ErrorKind::Forbidden, "cannot drop the edge index"));
        }
        self.indexes.remove(position);
        if let Some(layout) = &self.env.layout {
            remove_index_file(layout, self.info.cid, iid)?;
            self.env.replication.log_drop_index(self.info.cid, &self.info.name, iid, self.env.config.server_id);
        }
        debug!(target: "index.drop", cid = self.info.cid.0, iid = iid.0, "index dropped");
        Ok(())
    }

    /// Gives every index a chance to compact, e.g. fulltext posting cleanup.
    pub fn cleanup_indexes(&mut self) -> Result<()> {
        for index in &mut self.indexes {
            index.cleanup()?;
        }
        Ok(())
    }

    pub fn figures(&self) -> CollectionFigures {
        CollectionFigures {
            count: self.primary.len(),
            index_count: self.indexes.len() + 1,
            index_memory: self.primary.memory() + self.indexes.iter().map(|i| i.memory()).sum::<usize>(),
            barriers: self.barriers.outstanding(),
            pending_release: self.barriers.pending(),
        }
    }
}
