use bencher::{API_ROUTES, TestCase};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use micro_router::path;
use micro_router::pattern::RoutePattern;
use std::hint::black_box;

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("static", API_ROUTES, "/users/me"),
        TestCase::normal("dynamic", API_ROUTES, "/users/42/posts/7"),
        TestCase::normal("wildcard_interior", API_ROUTES, "/orgs/rust-lang/repos/rust/blob/src/lib/core.rs"),
        TestCase::large("catch_all", API_ROUTES, "/some/deeply/nested/path/that/nothing/else/claims"),
    ]
}

fn benchmark_pattern_match(criterion: &mut Criterion) {
    let test_cases = create_test_cases();
    let mut group = criterion.benchmark_group("pattern_match");

    for case in test_cases {
        let patterns = case
            .routes()
            .patterns()
            .iter()
            .map(|pattern| RoutePattern::parse(pattern).expect("benchmark patterns should be valid"))
            .collect::<Vec<_>>();

        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| {
                let params = patterns.iter().find_map(|pattern| pattern.matches(black_box(case.request_path())));
                black_box(params)
            });
        });
    }

    group.finish();
}

fn benchmark_normalize(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("normalize");
    for raw in ["/", "users/42/", "/users/42/posts?sort=desc#top", "//a//b///"] {
        group.bench_with_input(BenchmarkId::from_parameter(raw), raw, |b, raw| {
            b.iter(|| black_box(path::normalize(black_box(raw))));
        });
    }
    group.finish();
}

criterion_group!(matcher, benchmark_pattern_match, benchmark_normalize);
criterion_main!(matcher);
