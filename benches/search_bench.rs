//! Criterion benchmarks for query evaluation against an in-memory index.

use criterion::{Criterion, criterion_group, criterion_main};
use ferret::config::SearchConfig;
use ferret::index::{IndexFile, IndexWriter, Posting};
use ferret::query::search;
use std::hint::black_box;

const WORDS: &[&str] = &[
    "search", "engine", "index", "query", "document", "boolean", "ranking", "stemming",
    "daemon", "socket", "thread", "posting", "segment", "prefix", "meta", "title",
];

/// Build an index where each word appears in a deterministic spread of files.
fn generate_index(file_count: u32) -> IndexFile {
    let mut writer = IndexWriter::new();
    let dir = writer.add_directory("/bench/docs");
    for i in 0..file_count {
        writer.add_file(dir, &format!("doc{i}.html"), 1000 + i as u64, &format!("Document {i}"));
    }
    writer.add_meta_name("title");

    for (w, word) in WORDS.iter().enumerate() {
        let step = w as u32 + 2;
        let postings = (0..file_count)
            .filter(|f| f % step == 0)
            .map(|f| Posting::new(f, 1 + f % 7, 10 + (f * 13) % 90))
            .collect();
        writer.add_word(word, postings);
    }
    writer.add_stop_word("the");

    let bytes = writer.to_bytes().expect("index serializes");
    IndexFile::from_bytes(bytes).expect("index parses")
}

fn bench_queries(c: &mut Criterion) {
    let index = generate_index(10_000);
    let config = SearchConfig::default();

    let mut group = c.benchmark_group("search");
    for (name, query) in [
        ("word", "search"),
        ("and", "search and engine"),
        ("or", "search or engine or index"),
        ("and_not", "query and not boolean"),
        ("prefix", "s*"),
        ("meta", "title = (ranking or daemon)"),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| search(black_box(&index), black_box(query), &config).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_queries);
criterion_main!(benches);
