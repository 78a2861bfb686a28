use criterion::{criterion_group, criterion_main, Criterion};
use wikisearch_core::codec::{decode, encode};
use wikisearch_core::Posting;

fn bench_codec(c: &mut Criterion) {
    let postings: Vec<Posting> = (0..100_000u32).map(|i| Posting { doc_id: i * 3, tf: i % 700 }).collect();
    let bytes = encode(&postings);
    c.bench_function("encode_100k", |b| b.iter(|| encode(&postings)));
    c.bench_function("decode_100k", |b| b.iter(|| decode(&bytes)));
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
