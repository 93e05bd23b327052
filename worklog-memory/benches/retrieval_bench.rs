use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use worklog_memory::index::LexicalIndex;
use worklog_memory::{fuse_rrf, RankedList, SummaryId};

const WORDS: &[&str] = &[
    "schema", "routes", "auth", "booking", "cache", "parser", "deploy", "footer", "metrics",
    "migration", "tests", "pending", "implemented", "refactor", "index", "query",
];

fn synthetic_text(seed: usize) -> String {
    (0..12)
        .map(|i| WORDS[(seed * 7 + i * 3) % WORDS.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

fn ranked_list(ids: &[SummaryId], offset: usize, len: usize) -> Vec<(SummaryId, f32)> {
    (0..len)
        .map(|i| (ids[(i + offset) % ids.len()], 1.0 / (i + 1) as f32))
        .collect()
}

fn bench_rrf(c: &mut Criterion) {
    let mut group = c.benchmark_group("fuse_rrf");
    let ids: Vec<SummaryId> = (0..500).map(|_| SummaryId::new()).collect();

    for window in [10, 50, 200] {
        let lists = vec![
            (RankedList::Semantic, ranked_list(&ids, 0, window)),
            (RankedList::Lexical, ranked_list(&ids, window / 2, window)),
        ];
        group.bench_with_input(BenchmarkId::from_parameter(window), &lists, |b, lists| {
            b.iter(|| fuse_rrf(black_box(lists), 60.0))
        });
    }
    group.finish();
}

fn bench_bm25(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_search");

    for corpus in [100, 1_000, 10_000] {
        let mut index = LexicalIndex::new();
        for seed in 0..corpus {
            index.insert(SummaryId::new(), &synthetic_text(seed));
        }
        group.bench_with_input(BenchmarkId::from_parameter(corpus), &index, |b, index| {
            b.iter(|| index.search(black_box("booking schema migration"), 20))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rrf, bench_bm25);
criterion_main!(benches);
