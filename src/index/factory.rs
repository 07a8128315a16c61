use std::sync::Arc;

use serde_json::Value;
use tracing::{trace, warn};

use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, Iid};
use crate::index::base::{Index, IndexType, iid_from_json};
use crate::index::bitarray::{BitarrayAttribute, BitarrayIndex};
use crate::index::cap::CapConstraint;
use crate::index::edge::EdgeIndex;
use crate::index::fulltext::FulltextIndex;
use crate::index::geo::GeoIndex;
use crate::index::hash_index::HashIndex;
use crate::index::primary::PrimaryIndex;
use crate::index::skiplist::SkiplistIndex;
use crate::memory::zone::MemoryZone;
use crate::shape::shaper::Shaper;

/// Everything an index needs besides its description
#[derive(Clone)]
pub struct IndexSettings {
    pub cid: Cid,
    pub shaper: Arc<dyn Shaper>,
    pub zone: Arc<MemoryZone>,
    pub hash_initial_size: usize,
    pub fulltext_min_length: usize,
    pub fulltext_max_length: usize,
    pub fulltext_cleanup_batch: usize,
    pub bitarray_max_cardinality: usize,
}

impl IndexSettings {
    pub fn new(cid: Cid, shaper: Arc<dyn Shaper>, zone: Arc<MemoryZone>, config: &Config) -> Self {
        IndexSettings {
            cid,
            shaper,
            zone,
            hash_initial_size: config.hash_initial_size,
            fulltext_min_length: config.fulltext_min_word_length,
            fulltext_max_length: config.fulltext_max_word_length,
            fulltext_cleanup_batch: config.fulltext_cleanup_batch,
            bitarray_max_cardinality: config.bitarray_max_cardinality,
        }
    }
}

fn bad(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::BadParameter, message)
}

fn flag(json: &Value, name: &str) -> Result<bool> {
    match json.get(name) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(bad(format!("'{}' must be a boolean", name))),
    }
}

fn number(json: &Value, name: &str) -> Result<Option<i64>> {
    match json.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| bad(format!("'{}' must be a number", name))),
    }
}

fn string_fields(json: &Value) -> Result<Vec<String>> {
    let Some(Value::Array(fields)) = json.get("fields") else {
        return Err(bad("'fields' must be a list"));
    };
    fields
        .iter()
        .map(|f| {
            f.as_str()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| bad("index attributes must be non-empty strings"))
        })
        .collect()
}

fn field_count(kind: IndexType, fields: &[String], expected: usize) -> Result<()> {
    if fields.len() == expected {
        Ok(())
    } else {
        Err(bad(format!("{} index needs {} attribute(s), got {}", kind.name(), expected, fields.len())))
    }
}

/// `[["attribute", [values...]], ...]`
fn bitarray_fields(json: &Value) -> Result<Vec<BitarrayAttribute>> {
    let Some(Value::Array(fields)) = json.get("fields") else {
        return Err(bad("'fields' must be a list"));
    };
    fields
        .iter()
        .map(|pair| match pair.as_array().map(Vec::as_slice) {
            Some([Value::String(name), Value::Array(values)]) if !name.is_empty() => Ok(BitarrayAttribute {
                name: name.clone(),
                values: values.clone(),
            }),
            _ => Err(bad("bitarray attributes must be [name, [values...]] pairs")),
        })
        .collect()
}

/// Builds an index from its description, as created by `Index::json`.
pub fn create_index_from_json(json: &Value, settings: &IndexSettings) -> Result<Box<dyn Index>> {
    let kind = json
        .get("type")
        .and_then(Value::as_str)
        .and_then(IndexType::from_name)
        .ok_or_else(|| bad("unknown or missing index type"))?;
    let iid = iid_from_json(json).ok_or_else(|| bad("index description lacks a valid id"))?;
    let cid = settings.cid;
    let shaper = Arc::clone(&settings.shaper);

    let index: Result<Box<dyn Index>> = match kind {
        IndexType::Primary => {
            if iid != Iid::PRIMARY {
                return Err(bad("primary index must have id 0"));
            }
            Ok(Box::new(PrimaryIndex::new(cid, &settings.zone, settings.hash_initial_size)?))
        }
        IndexType::Edge => Ok(Box::new(EdgeIndex::new(iid, cid, &settings.zone, settings.hash_initial_size)?)),
        IndexType::Hash => {
            let fields = string_fields(json)?;
            let unique = flag(json, "unique")?;
            HashIndex::new(iid, cid, shaper, &fields, unique, &settings.zone, settings.hash_initial_size)
                .map(|idx| Box::new(idx) as Box<dyn Index>)
        }
        IndexType::Skiplist => {
            let fields = string_fields(json)?;
            let unique = flag(json, "unique")?;
            SkiplistIndex::new(iid, cid, shaper, &fields, unique).map(|idx| Box::new(idx) as Box<dyn Index>)
        }
        IndexType::Fulltext => {
            let fields = string_fields(json)?;
            field_count(kind, &fields, 1)?;
            let min_length = number(json, "minLength")?.unwrap_or(settings.fulltext_min_length as i64);
            FulltextIndex::new(
                iid,
                cid,
                shaper,
                &fields[0],
                min_length,
                settings.fulltext_max_length,
                settings.fulltext_cleanup_batch,
            )
            .map(|idx| Box::new(idx) as Box<dyn Index>)
        }
        IndexType::Bitarray => {
            let attributes = bitarray_fields(json)?;
            let undefined = flag(json, "undefined")?;
            BitarrayIndex::new(iid, cid, shaper, attributes, undefined, settings.bitarray_max_cardinality)
                .map(|idx| Box::new(idx) as Box<dyn Index>)
        }
        IndexType::Cap => {
            let size = number(json, "size")?.unwrap_or(0);
            let byte_size = number(json, "byteSize")?.unwrap_or(0);
            if size < 0 || byte_size < 0 {
                return Err(bad("cap limits must not be negative"));
            }
            CapConstraint::new(iid, cid, size as usize, byte_size as usize)
                .map(|idx| Box::new(idx) as Box<dyn Index>)
        }
        IndexType::Geo1 => {
            let fields = string_fields(json)?;
            field_count(kind, &fields, 1)?;
            GeoIndex::new_combined(
                iid,
                cid,
                shaper,
                &fields[0],
                flag(json, "geoJson")?,
                flag(json, "constraint")? || flag(json, "unique")?,
                flag(json, "ignoreNull")?,
            )
            .map(|idx| Box::new(idx) as Box<dyn Index>)
        }
        IndexType::Geo2 => {
            let fields = string_fields(json)?;
            field_count(kind, &fields, 2)?;
            GeoIndex::new_separate(
                iid,
                cid,
                shaper,
                &fields[0],
                &fields[1],
                flag(json, "constraint")? || flag(json, "unique")?,
                flag(json, "ignoreNull")?,
            )
            .map(|idx| Box::new(idx) as Box<dyn Index>)
        }
    };

    match &index {
        Ok(_) => trace!(target: "index.create", cid = cid.0, iid = iid.0, kind = kind.name(), "index created"),
        Err(err) => warn!(target: "index.create", cid = cid.0, iid = iid.0, kind = kind.name(), %err, "cannot create index"),
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::comparator::index_comparator;
    use crate::shape::shaper::VocShaper;
    use serde_json::json;

    fn settings() -> IndexSettings {
        IndexSettings::new(
            Cid(1),
            Arc::new(VocShaper::new()),
            MemoryZone::unbounded(crate::memory::zone::ZoneId::Unknown),
            &Config::default(),
        )
    }

    #[test]
    fn descriptions_round_trip_for_every_type() {
        let settings = settings();
        let descriptions = [
            json!({"id": "0", "type": "primary", "fields": ["_id"]}),
            json!({"id": "1", "type": "edge", "fields": ["_from", "_to"]}),
            json!({"id": "2", "type": "hash", "unique": true, "fields": ["a", "b"]}),
            json!({"id": "3", "type": "skiplist", "unique": false, "fields": ["a"]}),
            json!({"id": "4", "type": "fulltext", "fields": ["text"], "minLength": 3}),
            json!({"id": "5", "type": "bitarray", "fields": [["a", [1, 2]], ["b", ["x"]]], "undefined": true}),
            json!({"id": "6", "type": "cap", "size": 10, "byteSize": 0, "fields": []}),
            json!({"id": "7", "type": "geo1", "fields": ["loc"], "geoJson": true, "ignoreNull": true}),
            json!({"id": "8", "type": "geo2", "fields": ["lat", "lon"], "constraint": true}),
        ];
        for description in descriptions {
            let index = create_index_from_json(&description, &settings).unwrap();
            let described = index.json();
            assert!(index_comparator(&description, &described), "{} vs {}", description, described);

            let again = create_index_from_json(&described, &settings).unwrap();
            assert!(index_comparator(&described, &again.json()));
            assert_eq!(again.iid(), index.iid());
        }
    }

    #[test]
    fn malformed_descriptions_are_rejected() {
        let settings = settings();
        for description in [
            json!({"id": "2", "type": "btree", "fields": ["a"]}),
            json!({"type": "hash", "fields": ["a"]}),
            json!({"id": "2", "type": "hash", "fields": "a"}),
            json!({"id": "2", "type": "hash", "fields": []}),
            json!({"id": "2", "type": "fulltext", "fields": ["a", "b"]}),
            json!({"id": "2", "type": "bitarray", "fields": ["a"]}),
            json!({"id": "2", "type": "cap", "size": -1}),
            json!({"id": "5", "type": "primary"}),
        ] {
            let err = create_index_from_json(&description, &settings).err().unwrap();
            assert_eq!(err.kind, ErrorKind::BadParameter, "{}", description);
        }
    }

    #[test]
    fn fulltext_word_lengths_come_from_config() {
        let config = Config {
            fulltext_min_word_length: 3,
            fulltext_max_word_length: 6,
            ..Config::default()
        };
        let settings = IndexSettings::new(
            Cid(1),
            Arc::new(VocShaper::new()),
            MemoryZone::unbounded(crate::memory::zone::ZoneId::Unknown),
            &config,
        );
        let index = create_index_from_json(&json!({"id": "4", "type": "fulltext", "fields": ["text"]}), &settings)
            .unwrap();
        let fulltext = index.as_any().downcast_ref::<FulltextIndex>().unwrap();
        assert_eq!(fulltext.min_length(), 3);
        assert_eq!(fulltext.max_length(), 6);
    }
}
