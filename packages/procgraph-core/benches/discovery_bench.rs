//! Discovery pipeline benchmark: PTA construction, merging, and guard
//! synthesis over a synthetic branching log.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use procgraph_core::pipeline::learn_efsm_from_traces;
use procgraph_core::shared::models::{AttrMap, AttrValue, Event, Trace};
use procgraph_core::{infer_attribute_domains, DiscoveryConfig};

fn synthetic_log(cases: usize) -> Vec<Trace> {
    (0..cases)
        .map(|case| {
            let amount = if case % 2 == 0 { 40 + (case as i64 % 10) } else { 400 + (case as i64 % 50) };
            let branch = if case % 2 == 0 { "approve" } else { "review" };
            let mut attrs = AttrMap::default();
            attrs.insert("amount".to_string(), AttrValue::Int(amount));
            vec![
                Event::new("submit", attrs.clone()),
                Event::new("check", AttrMap::default()),
                Event::new(branch, AttrMap::default()),
                Event::new("archive", AttrMap::default()),
            ]
        })
        .collect()
}

fn bench_learning(c: &mut Criterion) {
    let traces = synthetic_log(100);
    let domains = infer_attribute_domains(&traces);
    let config = DiscoveryConfig::default();

    c.bench_function("learn_efsm_100_cases", |b| {
        b.iter(|| {
            let efsm =
                learn_efsm_from_traces(black_box(&traces), &domains, &config).unwrap();
            black_box(efsm)
        })
    });
}

criterion_group!(benches, bench_learning);
criterion_main!(benches);
