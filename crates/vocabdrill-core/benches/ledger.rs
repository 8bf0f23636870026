use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vocabdrill_core::ledger::Ledger;
use vocabdrill_core::model::VocabItem;
use vocabdrill_core::store::MemoryStore;

fn generate_import_json(n: usize) -> String {
    let words: Vec<serde_json::Value> = (0..n)
        .map(|i| {
            serde_json::json!({
                "wordId": format!("w{i}"),
                "word": {
                    "source": format!("word{i}"),
                    "target": format!("词{i}"),
                    "wrongOptions": {"target": ["错一", "错二"], "source": []},
                },
                "stats": {"errorCount": 2, "correctCount": 0},
                "tags": ["bench"],
                "level": i % 10,
            })
        })
        .collect();
    serde_json::json!({ "version": "2.0", "words": words }).to_string()
}

fn bench_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_import");
    let small = generate_import_json(10);
    let large = generate_import_json(5_000);

    group.bench_function("10_entries", |b| {
        b.iter(|| {
            let ledger = Ledger::new(MemoryStore::new(), "bench");
            ledger.import_batch("amy", black_box(&small))
        })
    });
    group.bench_function("5000_entries", |b| {
        b.iter(|| {
            let ledger = Ledger::new(MemoryStore::new(), "bench");
            ledger.import_batch("amy", black_box(&large))
        })
    });
    group.finish();
}

fn bench_record_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_record_miss");
    let ledger = Ledger::new(MemoryStore::new(), "bench");
    ledger.import_batch("amy", &generate_import_json(500));
    let word = VocabItem::new("w250", "word250", "词250");

    group.bench_function("existing_of_500", |b| {
        b.iter(|| ledger.record_miss("amy", black_box(&word), 3))
    });
    group.finish();
}

criterion_group!(benches, bench_import, bench_record_miss);
criterion_main!(benches);
