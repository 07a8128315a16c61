use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::Rng;
use serde_json::{Value, json};
use vocbase::collection::{CollectionEnv, CollectionInfo, DocumentCollection};
use vocbase::core::types::{Cid, CollectionType};
use vocbase::transaction::SingleCollectionTransaction;
use vocbase::{AccessType, Config, TransactionContext, Vocbase};

/// Helper to create test documents
fn create_test_document(id: u64) -> Value {
    let mut rng = rand::thread_rng();
    let words = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];
    let text: Vec<&str> = (0..12).map(|_| words[rng.gen_range(0..words.len())]).collect();
    json!({
        "_key": format!("doc{}", id),
        "title": format!("Document {}", id),
        "text": text.join(" "),
        "category": format!("category_{}", id % 10),
        "score": rng.gen_range(0.0..100.0),
    })
}

fn collection() -> DocumentCollection {
    let env = CollectionEnv::in_memory(Config::default());
    DocumentCollection::new(CollectionInfo::new(Cid(1), "bench", CollectionType::Document), env).unwrap()
}

/// Inserts with a growing set of secondary indexes
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection_insert");
    for indexes in [0usize, 1, 3] {
        group.bench_with_input(BenchmarkId::from_parameter(indexes), &indexes, |b, &indexes| {
            let mut coll = collection();
            if indexes >= 1 {
                coll.ensure_hash_index(&["title"], true).unwrap();
            }
            if indexes >= 3 {
                coll.ensure_skiplist_index(&["score"], false).unwrap();
                coll.ensure_fulltext_index("text", 2).unwrap();
            }
            let mut id = 0;
            b.iter(|| {
                coll.insert(&create_test_document(id), None).unwrap();
                id += 1;
            });
        });
    }
    group.finish();
}

fn bench_transaction_batch(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let vocbase = Arc::new(Vocbase::open(Config::with_storage_path(dir.path())).unwrap());
    vocbase.create_collection("docs", CollectionType::Document).unwrap();

    c.bench_function("transaction_batch_100", |b| {
        let mut id = 0;
        b.iter(|| {
            let mut trx = SingleCollectionTransaction::new(
                Arc::clone(&vocbase),
                TransactionContext::standalone(),
                "docs",
                AccessType::Write,
            )
            .unwrap();
            trx.begin().unwrap();
            for _ in 0..100 {
                black_box(trx.create(&create_test_document(id)).unwrap());
                id += 1;
            }
            trx.commit().unwrap();
        });
    });
}

fn bench_read_ordered(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let vocbase = Arc::new(Vocbase::open(Config::with_storage_path(dir.path())).unwrap());
    let handle = vocbase.create_collection("docs", CollectionType::Document).unwrap();
    for id in 0..10_000 {
        handle.collection.write().insert(&create_test_document(id), None).unwrap();
    }

    c.bench_function("read_ordered_tail_100", |b| {
        b.iter(|| {
            let mut trx = SingleCollectionTransaction::new(
                Arc::clone(&vocbase),
                TransactionContext::standalone(),
                "docs",
                AccessType::Read,
            )
            .unwrap();
            trx.begin().unwrap();
            black_box(trx.read_ordered(-100, 100).unwrap());
            trx.commit().unwrap();
        });
    });
}

criterion_group!(benches, bench_insert, bench_transaction_batch, bench_read_ordered);
criterion_main!(benches);
