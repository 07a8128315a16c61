use serde_json::{Value, json};
use vocbase::core::types::CollectionType;
use vocbase::index::base::iid_from_json;
use vocbase::index::bitarray::BitarrayIndex;
use vocbase::index::fulltext::FulltextIndex;
use vocbase::index::geo::GeoIndex;
use vocbase::index::operator::IndexOperator;
use vocbase::index::skiplist::SkiplistIndex;
use vocbase::{Config, ErrorKind, Vocbase};

fn keys<'a>(docs: impl IntoIterator<Item = &'a vocbase::core::types::DocumentRef>) -> Vec<String> {
    let mut keys: Vec<String> = docs.into_iter().map(|d| d.key.clone()).collect();
    keys.sort();
    keys
}

#[test]
fn skiplist_range_between_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let vocbase = Vocbase::open(Config::with_storage_path(dir.path())).unwrap();
    let handle = vocbase.create_collection("numbers", CollectionType::Document).unwrap();
    let mut coll = handle.collection.write();
    let (description, _) = coll.ensure_skiplist_index(&["v"], false).unwrap();
    for v in [1, 3, 5, 7] {
        coll.insert(&json!({"_key": format!("n{}", v), "v": v}), None).unwrap();
    }

    let index = coll.index_as::<SkiplistIndex>(iid_from_json(&description).unwrap()).unwrap();
    let range = IndexOperator::and(IndexOperator::ge(vec![json!(3)]), IndexOperator::le(vec![json!(5)]));
    let found: Vec<String> = index.lookup(range).unwrap().map(|d| d.key.clone()).collect();
    assert_eq!(found, ["n3", "n5"]);

    let above: Vec<String> = index.lookup(IndexOperator::gt(vec![json!(5)])).unwrap().map(|d| d.key.clone()).collect();
    assert_eq!(above, ["n7"]);
}

#[test]
fn every_index_type_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let expected: Vec<Value> = {
        let vocbase = Vocbase::open(Config::with_storage_path(dir.path())).unwrap();
        let handle = vocbase.create_collection("places", CollectionType::Document).unwrap();
        let mut coll = handle.collection.write();
        coll.ensure_hash_index(&["name"], true).unwrap();
        coll.ensure_skiplist_index(&["rank", "name"], false).unwrap();
        coll.ensure_fulltext_index("text", 3).unwrap();
        coll.ensure_bitarray_index(&[("kind", vec![json!("city"), json!("town")])], true).unwrap();
        coll.ensure_geo_index1("loc", false, false, true).unwrap();
        coll.ensure_geo_index2("lat", "lon", true, false).unwrap();
        coll.ensure_cap_constraint(100, 0).unwrap();
        coll.indexes_json()
    };
    assert_eq!(expected.len(), 8);

    let vocbase = Vocbase::open(Config::with_storage_path(dir.path())).unwrap();
    let handle = vocbase.lookup_collection_by_name("places").unwrap();
    assert_eq!(handle.collection.read().indexes_json(), expected);
}

#[test]
fn secondary_indexes_follow_writes() {
    let dir = tempfile::tempdir().unwrap();
    let vocbase = Vocbase::open(Config::with_storage_path(dir.path())).unwrap();
    let handle = vocbase.create_collection("towns", CollectionType::Document).unwrap();
    let mut coll = handle.collection.write();

    let (fulltext, _) = coll.ensure_fulltext_index("text", 2).unwrap();
    let (bitarray, _) = coll
        .ensure_bitarray_index(&[("kind", vec![json!("city"), json!("town")])], false)
        .unwrap();
    let (geo, _) = coll.ensure_geo_index1("loc", false, false, false).unwrap();

    coll.insert(&json!({"_key": "berlin", "kind": "city", "text": "Big old city", "loc": [52.52, 13.40]}), None)
        .unwrap();
    coll.insert(&json!({"_key": "potsdam", "kind": "town", "text": "Old palaces", "loc": [52.39, 13.06]}), None)
        .unwrap();
    coll.insert(&json!({"_key": "paris", "kind": "city", "text": "City of light", "loc": [48.85, 2.35]}), None)
        .unwrap();

    let err = coll.insert(&json!({"_key": "x", "kind": "village"}), None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::BitarrayInsertUnsupportedValue);
    assert!(coll.lookup("x").is_none());

    let words = coll.index_as::<FulltextIndex>(iid_from_json(&fulltext).unwrap()).unwrap();
    assert_eq!(keys(&words.query("old", None).unwrap()), ["berlin", "potsdam"]);
    assert_eq!(keys(&words.query("prefix:cit,-light", None).unwrap()), ["berlin"]);

    let kinds = coll.index_as::<BitarrayIndex>(iid_from_json(&bitarray).unwrap()).unwrap();
    let cities = kinds.lookup(IndexOperator::eq(vec![json!("city")])).unwrap();
    assert_eq!(keys(&cities), ["berlin", "paris"]);

    let places = coll.index_as::<GeoIndex>(iid_from_json(&geo).unwrap()).unwrap();
    let near = places.near(52.5, 13.3, 2).unwrap();
    assert_eq!(near.iter().map(|(d, _)| d.key.as_str()).collect::<Vec<_>>(), ["berlin", "potsdam"]);
    let within = places.within(52.5, 13.4, 50_000.0).unwrap();
    assert_eq!(within.len(), 2);

    coll.remove("berlin", vocbase::UpdatePolicy::LastWrite).unwrap();
    let words = coll.index_as::<FulltextIndex>(iid_from_json(&fulltext).unwrap()).unwrap();
    assert_eq!(keys(&words.query("old", None).unwrap()), ["potsdam"]);
}

#[test]
fn unique_hash_index_rejects_second_document() {
    let dir = tempfile::tempdir().unwrap();
    let vocbase = Vocbase::open(Config::with_storage_path(dir.path())).unwrap();
    let handle = vocbase.create_collection("users", CollectionType::Document).unwrap();
    let mut coll = handle.collection.write();
    coll.ensure_hash_index(&["x"], true).unwrap();

    coll.insert(&json!({"_key": "a", "x": 1}), None).unwrap();
    let err = coll.insert(&json!({"_key": "b", "x": 1}), None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UniqueConstraintViolated);
    assert_eq!(coll.count(), 1);
    assert!(coll.lookup("b").is_none());

    // 1 and 1.0 are the same number
    let err = coll.insert(&json!({"_key": "c", "x": 1.0}), None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UniqueConstraintViolated);
}
