use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use vocbase::hash::HashPolicy;
use vocbase::hash::array::HashArray;
use vocbase::memory::zone::{MemoryZone, ZoneId};
use xxhash_rust::xxh64::xxh64;

/// String keys mapped to their numeric payload
struct KeyPolicy;

impl HashPolicy for KeyPolicy {
    type Key = str;
    type Element = (String, u64);

    fn hash_key(&self, key: &str) -> u64 {
        xxh64(key.as_bytes(), 0)
    }

    fn hash_element(&self, element: &Self::Element) -> u64 {
        xxh64(element.0.as_bytes(), 0)
    }

    fn is_equal_key_element(&self, key: &str, element: &Self::Element) -> bool {
        key == element.0
    }

    fn is_equal_element_element(&self, left: &Self::Element, right: &Self::Element) -> bool {
        left.0 == right.0
    }
}

fn filled(n: u64) -> HashArray<KeyPolicy> {
    let zone = MemoryZone::unbounded(ZoneId::Unknown);
    let mut table = HashArray::new(KeyPolicy, &zone).unwrap();
    for i in 0..n {
        let key = format!("key{}", i);
        table.insert_key(&key.clone(), (key, i), false).unwrap();
    }
    table
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_array_insert");
    for n in [1_000u64, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| black_box(filled(n)));
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let table = filled(100_000);
    let keys: Vec<String> = (0..1_000).map(|i| format!("key{}", i * 97)).collect();
    c.bench_function("hash_array_lookup_1000", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(table.lookup_by_key(key));
            }
        });
    });
}

fn bench_remove_reinsert(c: &mut Criterion) {
    // removal shifts probe chains back, reinsert restores the table
    let mut table = filled(50_000);
    c.bench_function("hash_array_remove_reinsert", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key{}", i % 50_000);
            let element = table.remove_key(&key).unwrap();
            table.insert_key(&key, element, false).unwrap();
            i += 1;
        });
    });
}

criterion_group!(benches, bench_insert, bench_lookup, bench_remove_reinsert);
criterion_main!(benches);
