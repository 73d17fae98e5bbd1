use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use snowdex::index::trie::{AutomatonSet, Trie};

/// Fills a trie with `count` synthetic dictionary terms built from a small
/// alphabet of word-like fragments, so fuzzy queries have real near-misses
/// to find instead of hitting an empty subtree immediately.
fn build_dictionary(count: usize) -> Trie {
    let mut rng = rand::thread_rng();
    let fragments = ["father", "mother", "droid", "saber", "force", "rebel", "empire", "jedi"];
    let mut trie = Trie::new();
    for i in 0..count {
        let base = fragments[rng.gen_range(0..fragments.len())];
        trie.insert(&format!("{base}{i}"));
    }
    trie
}

fn bench_exact_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("trie_exact_lookup");
    for size in [100, 1_000, 10_000].iter() {
        let trie = build_dictionary(*size);
        let automata = AutomatonSet::new();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let hits = trie.search(black_box(&automata), 0, black_box("father0"));
                black_box(hits);
            });
        });
    }
    group.finish();
}

fn bench_fuzzy_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("trie_fuzzy_expansion");
    let trie = build_dictionary(10_000);
    let automata = AutomatonSet::new();

    for distance in 0..=3u8 {
        group.bench_with_input(
            BenchmarkId::new("distance", distance),
            &distance,
            |b, &distance| {
                b.iter(|| {
                    let hits = trie.search(black_box(&automata), distance, black_box("fathr0"));
                    black_box(hits);
                });
            },
        );
    }
    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("trie_insert_10000_terms", |b| {
        b.iter(|| {
            let trie = build_dictionary(10_000);
            black_box(trie);
        });
    });
}

criterion_group!(benches, bench_exact_lookup, bench_fuzzy_expansion, bench_insert);
criterion_main!(benches);
