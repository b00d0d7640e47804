use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use relief_ai::{RecommendationParser, RequirementEstimator};
use relief_core::{Category, ItemId, RetrievedCandidate};

fn candidates(n: usize) -> Vec<RetrievedCandidate> {
    let catalogue = [
        ("Medical Kit", Category::Medical),
        ("Emergency Food Pack", Category::Food),
        ("Water Bottles", Category::Water),
        ("Rescue Tubes", Category::Rescue),
        ("Blankets", Category::Shelter),
        ("First Aid Bandages", Category::Medical),
        ("Flashlights", Category::Equipment),
        ("Batteries", Category::Equipment),
        ("Tents", Category::Shelter),
        ("Antibiotics", Category::Medical),
    ];
    (0..n)
        .map(|i| {
            let (name, category) = catalogue[i % catalogue.len()];
            RetrievedCandidate {
                item_id: ItemId::new(i as u64 + 1),
                name: name.to_string(),
                quantity: 100,
                category,
                priority: 1,
                distance: 0.0,
            }
        })
        .collect()
}

fn bench_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("requirement_estimate");
    let estimator = RequirementEstimator::new();
    let query = "Flood victims: 45 people with injuries and severe dehydration near the bridge";

    for k in [1usize, 5, 10, 50] {
        let items = candidates(k);
        group.throughput(Throughput::Elements(k as u64));
        group.bench_with_input(BenchmarkId::new("top_k", k), &items, |b, items| {
            b.iter(|| estimator.estimate(black_box(query), black_box(items)));
        });
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("recommendation_parse");
    let parser = RecommendationParser::new();

    group.bench_function("strict", |b| {
        let text = r#"{"Medical Kit": 9, "Water Bottles": 135, "Blankets": 45}"#;
        b.iter(|| parser.parse(black_box(text), ""));
    });
    group.bench_function("scrape", |b| {
        let text = r#"Recommend "Medical Kit": 9 and "Water Bottles": 135 then "Blankets": 45 as well"#;
        b.iter(|| parser.parse(black_box(text), ""));
    });
    group.finish();
}

criterion_group!(benches, bench_estimate, bench_parse);
criterion_main!(benches);
