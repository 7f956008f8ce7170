//! Indexing and term-scan benchmarks over the in-memory store.
//!
//! Run with: `cargo bench`
//! Save baseline: `cargo bench -- --save-baseline main`
//! Compare: `cargo bench -- --baseline main`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use kivi::index::{Document, Field, IndexConfig, IndexReader, IndexWriter, Term};
use kivi::store::MemoryStore;
use kivi::utils::tokenizer::SimpleAnalyzer;

const WORDS: &[&str] = &[
    "anchor", "breeze", "cobalt", "dune", "ember", "fjord", "galley", "harbor", "inlet", "jetty",
    "keel", "lagoon", "marlin", "nacre", "osprey", "pelican", "quay", "reef", "schooner", "tide",
];

fn synthetic_doc(i: usize) -> Document {
    let mut body = String::new();
    for j in 0..40 {
        body.push_str(WORDS[(i * 7 + j * 3) % WORDS.len()]);
        body.push(' ');
    }
    let mut doc = Document::new();
    doc.add(Field::keyword("_id", format!("doc-{i}")));
    doc.add(Field::text("title", format!("Document number {i}")));
    doc.add(Field::text("body", body));
    doc
}

fn populated_store(docs: usize) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let mut writer = IndexWriter::new("bench", store.clone());
    for i in 0..docs {
        writer.add_document(&synthetic_doc(i), &SimpleAnalyzer).unwrap();
    }
    store
}

fn bench_add_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexing");

    group.bench_function("add_document", |b| {
        let store = Arc::new(MemoryStore::new());
        let mut writer = IndexWriter::new("bench", store);
        let mut i = 0usize;
        b.iter(|| {
            i += 1;
            writer.add_document(black_box(&synthetic_doc(i)), &SimpleAnalyzer).unwrap()
        });
    });

    group.bench_function("add_document_batched_100", |b| {
        let store = Arc::new(MemoryStore::new());
        let mut writer = IndexWriter::new("bench", store);
        writer.set_auto_commit(false).unwrap();
        let mut i = 0usize;
        b.iter(|| {
            for _ in 0..100 {
                i += 1;
                writer.add_document(black_box(&synthetic_doc(i)), &SimpleAnalyzer).unwrap();
            }
            writer.commit().unwrap();
        });
    });

    group.finish();
}

fn bench_reads(c: &mut Criterion) {
    let store = populated_store(1000);
    let mut group = c.benchmark_group("reading");

    group.bench_function("doc_freq", |b| {
        let reader = IndexReader::new("bench", store.clone(), IndexConfig::default());
        b.iter(|| reader.doc_freq(black_box(&Term::new("body", "marlin"))).unwrap());
    });

    group.bench_function("term_scan_full_field", |b| {
        b.iter(|| {
            let reader = IndexReader::new("bench", store.clone(), IndexConfig::default());
            let mut scanner = reader.terms_from(&Term::new("body", "")).unwrap();
            let mut count = 0u32;
            while scanner.term().is_some() {
                count += 1;
                if !scanner.next().unwrap() {
                    break;
                }
            }
            black_box(count)
        });
    });

    group.bench_function("postings_decode", |b| {
        b.iter(|| {
            let reader = IndexReader::new("bench", store.clone(), IndexConfig::default());
            black_box(reader.postings(&Term::new("body", "tide")).unwrap().len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_add_document, bench_reads);
criterion_main!(benches);
