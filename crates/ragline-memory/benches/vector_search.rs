use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ragline_memory::{Chunker, ChunkerConfig, Fragment, VectorIndex, cosine_similarity};
use std::hint::black_box;

const DIM: usize = 384;

fn pseudo_vector(seed: usize) -> Vec<f32> {
    (0..DIM)
        .map(|i| {
            let x = (seed * 31 + i * 17) % 97;
            #[allow(clippy::cast_precision_loss)]
            let v = x as f32 / 97.0;
            v - 0.5
        })
        .collect()
}

fn similarity(c: &mut Criterion) {
    let a = pseudo_vector(1);
    let b = pseudo_vector(2);
    c.bench_function("cosine_similarity_384", |bench| {
        bench.iter(|| cosine_similarity(black_box(&a), black_box(&b)));
    });
}

fn search(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("vector_search");

    for size in [100usize, 1_000, 10_000] {
        let dir = tempfile::tempdir().unwrap();
        let index = rt.block_on(async {
            let index = VectorIndex::open(dir.path()).await.unwrap();
            let fragments: Vec<Fragment> = (0..size)
                .map(|i| {
                    Fragment::new(format!("doc-{}", i / 20), i % 20, format!("chunk {i}"))
                        .with_embedding(pseudo_vector(i))
                })
                .collect();
            index.insert(fragments).await.unwrap();
            index
        });
        let query = pseudo_vector(size / 2);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("top5", size), &query, |b, q| {
            b.iter(|| index.search(black_box(q), 5).unwrap());
        });
    }

    group.finish();
}

fn chunking(c: &mut Criterion) {
    let chunker = Chunker::new(ChunkerConfig::default());
    let mut group = c.benchmark_group("chunker");

    for size in [10_000usize, 100_000] {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(size / 45 + 1);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("split", size), &text, |b, text| {
            b.iter(|| chunker.split("doc", black_box(text)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, similarity, search, chunking);
criterion_main!(benches);
