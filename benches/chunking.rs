use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};

use corpus_ingest::models::Document;
use corpus_ingest::services::{Chunker, HeuristicTokenizer, WordTokenizer};

fn document(paragraphs: usize) -> Document {
    let body = (0..paragraphs)
        .map(|i| {
            format!(
                "Paragraph {i} describes the deployment steps, the rollback plan, \
                 and the expected behaviour of service number {i} under load."
            )
        })
        .collect();
    Document::new("bench-doc", "Operations Handbook", body)
}

fn bench_chunking(c: &mut Criterion) {
    let doc = document(400);
    let mut group = c.benchmark_group("chunk");
    group.throughput(Throughput::Bytes(doc.char_len() as u64));

    let heuristic = Chunker::new(Arc::new(HeuristicTokenizer), 512, "passage: ");
    group.bench_function("heuristic_512", |b| {
        b.iter(|| heuristic.chunk(black_box(&doc)))
    });

    let words = Chunker::new(Arc::new(WordTokenizer), 128, "passage: ");
    group.bench_function("words_128", |b| b.iter(|| words.chunk(black_box(&doc))));

    group.finish();
}

criterion_group!(benches, bench_chunking);
criterion_main!(benches);
