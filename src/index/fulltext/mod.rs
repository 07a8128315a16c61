pub mod query;

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use roaring::RoaringBitmap;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::analysis::analyzer::Analyzer;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, DocumentRef, Iid, Rid};
use crate::index::base::{Index, IndexBase, IndexType};
use crate::shape::shaper::{Pid, Shaper};

pub use query::{Combine, FulltextQuery, MatchType, QueryTerm};

/// Inverted word index over one string attribute.
///
/// Each indexed document gets a dense internal id. Postings are bitmaps of those ids
/// per word. Removing a document only marks its id as deleted; `cleanup` later strips
/// deleted ids from a bounded number of words per call.
pub struct FulltextIndex {
    base: IndexBase,
    shaper: Arc<dyn Shaper>,
    pid: Pid,
    min_length: usize,
    max_length: usize,
    analyzer: Analyzer,

    words: BTreeMap<String, RoaringBitmap>,
    handles: HashMap<u32, DocumentRef>,
    ids: HashMap<Rid, u32>,
    next_id: u32,

    deleted: RoaringBitmap,
    sweep: Option<Sweep>,
    cleanup_batch: usize,
}

/// An in-progress cleanup pass
struct Sweep {
    /// ids deleted before the pass started
    snapshot: RoaringBitmap,
    /// last word already compacted
    cursor: Option<String>,
}

impl FulltextIndex {
    pub fn new(
        iid: Iid,
        cid: Cid,
        shaper: Arc<dyn Shaper>,
        field: &str,
        min_length: i64,
        max_length: usize,
        cleanup_batch: usize,
    ) -> Result<Self> {
        let pid = shaper.find_or_create_attribute_path_by_name(field)?;
        let min_length = normalize_min_length(min_length);
        let max_length = max_length.max(min_length);
        trace!(target: "index.fulltext", iid = iid.0, field, min_length, max_length, "created fulltext index");
        Ok(FulltextIndex {
            base: IndexBase::new(iid, IndexType::Fulltext, cid, false, vec![field.to_string()]),
            shaper,
            pid,
            min_length,
            max_length,
            analyzer: Analyzer::fulltext(min_length, max_length),
            words: BTreeMap::new(),
            handles: HashMap::new(),
            ids: HashMap::new(),
            next_id: 0,
            deleted: RoaringBitmap::new(),
            sweep: None,
            cleanup_batch: cleanup_batch.max(1),
        })
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Words are cut to this many characters, in documents and queries alike.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Deleted ids still referenced from postings
    pub fn pending_cleanup(&self) -> u64 {
        self.deleted.len()
    }

    fn word_list(&self, doc: &DocumentRef) -> Result<Vec<String>> {
        let Some(sub) = self.shaper.extract_shaped_json(&doc.shaped, self.pid)? else {
            return Ok(Vec::new());
        };
        match self.shaper.sub_to_json(&doc.shaped, &sub)? {
            Value::String(text) => Ok(self.analyzer.word_list(&text)),
            _ => Ok(Vec::new()),
        }
    }

    fn matching(&self, term: &QueryTerm) -> RoaringBitmap {
        match term.match_type {
            MatchType::Complete => self.words.get(&term.word).cloned().unwrap_or_default(),
            MatchType::Prefix => self
                .words
                .range::<String, _>((Bound::Included(&term.word), Bound::Unbounded))
                .take_while(|(word, _)| word.starts_with(term.word.as_str()))
                .fold(RoaringBitmap::new(), |acc, (_, ids)| acc | ids),
        }
    }

    /// Documents matching `query`, at most `limit` of them when given.
    pub fn search(&self, query: &FulltextQuery, limit: Option<usize>) -> Vec<DocumentRef> {
        let mut result: Option<RoaringBitmap> = None;
        for term in &query.terms {
            let ids = self.matching(term);
            result = Some(match (result, term.combine) {
                (None, Combine::Exclude) => RoaringBitmap::new(),
                (None, _) => ids,
                (Some(acc), Combine::And) => acc & ids,
                (Some(acc), Combine::Or) => acc | ids,
                (Some(acc), Combine::Exclude) => acc - ids,
            });
        }
        let mut result = result.unwrap_or_default();
        result -= &self.deleted;

        result
            .iter()
            .filter_map(|id| self.handles.get(&id).cloned())
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Parses and runs a query string.
    pub fn query(&self, query: &str, limit: Option<usize>) -> Result<Vec<DocumentRef>> {
        let query = FulltextQuery::parse(query, self.max_length)?;
        Ok(self.search(&query, limit))
    }
}

/// The effective minimum word length for a requested `minLength`; anything below 1 means 1.
pub fn normalize_min_length(requested: i64) -> usize {
    if requested <= 0 { 1 } else { requested as usize }
}

impl Index for FulltextIndex {
    fn base(&self) -> &IndexBase {
        &self.base
    }

    /// Inserting a document that is already indexed changes nothing.
    fn insert(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        if self.ids.contains_key(&doc.rid) {
            return Ok(());
        }
        let words = self.word_list(doc)?;
        if words.is_empty() {
            return Ok(());
        }

        let id = self.next_id;
        self.next_id = self.next_id.checked_add(1).ok_or_else(|| {
            Error::new(ErrorKind::OutOfMemory, "fulltext document ids exhausted")
        })?;
        for word in words {
            self.words.entry(word).or_default().insert(id);
        }
        self.handles.insert(id, Arc::clone(doc));
        self.ids.insert(doc.rid, id);
        Ok(())
    }

    /// Unknown documents are ignored.
    fn remove(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        if let Some(id) = self.ids.remove(&doc.rid) {
            self.handles.remove(&id);
            self.deleted.insert(id);
        }
        Ok(())
    }

    fn json(&self) -> Value {
        let mut map = self.base.json();
        map.insert("minLength".to_string(), json!(self.min_length));
        Value::Object(map)
    }

    fn memory(&self) -> usize {
        let postings: usize = self
            .words
            .iter()
            .map(|(word, ids)| word.len() + ids.serialized_size())
            .sum();
        postings + self.handles.len() * (std::mem::size_of::<DocumentRef>() + 2 * std::mem::size_of::<u64>())
    }

    /// Compacts up to the configured number of words.
    fn cleanup(&mut self) -> Result<()> {
        if self.deleted.is_empty() {
            return Ok(());
        }
        let mut sweep = self.sweep.take().unwrap_or_else(|| Sweep {
            snapshot: self.deleted.clone(),
            cursor: None,
        });

        let lower = match &sweep.cursor {
            Some(word) => Bound::Excluded(word.clone()),
            None => Bound::Unbounded,
        };
        let batch: Vec<String> = self
            .words
            .range((lower, Bound::Unbounded))
            .take(self.cleanup_batch)
            .map(|(word, _)| word.clone())
            .collect();

        for word in &batch {
            if let Some(ids) = self.words.get_mut(word) {
                *ids -= &sweep.snapshot;
                if ids.is_empty() {
                    self.words.remove(word);
                }
            }
        }

        if batch.len() < self.cleanup_batch {
            // every word has been swept since the snapshot was taken
            self.deleted -= &sweep.snapshot;
            debug!(
                target: "index.fulltext",
                iid = self.base.iid.0,
                released = sweep.snapshot.len(),
                "fulltext cleanup pass finished"
            );
        } else {
            sweep.cursor = batch.last().cloned();
            self.sweep = Some(sweep);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
