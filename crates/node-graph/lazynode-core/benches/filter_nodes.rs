use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lazynode_core::{
    from_record, from_reference, from_value, with_function, EvalConfig, ExposingNodes,
    FunctionNode, NodeCore, NodeRef, Value,
};
use serde_json::json;

fn wide_record(width: usize) -> NodeRef<Value> {
    from_record((0..width).map(|i| (format!("f{i}"), from_reference(&format!("n{}", i % 8)))))
}

fn exposing() -> ExposingNodes {
    (0..8).map(|i| (format!("n{i}"), from_value(json!(i)))).collect()
}

fn bench_filter_nodes(c: &mut Criterion) {
    let exposing = exposing();

    let cached = with_function(wide_record(256), |v: Value| v);
    c.bench_function("filter_nodes_cached", |b| {
        b.iter(|| black_box(cached.filter_nodes(&exposing).expect("deps")))
    });

    let uncached = FunctionNode::with_config(
        wide_record(256),
        |v: Value| v,
        &EvalConfig {
            filter_cache_capacity: 0,
        },
    );
    // Children still cache, so each iteration binds a fresh exposing map.
    c.bench_function("filter_nodes_fresh_shape", |b| {
        b.iter(|| {
            let fresh = exposing.with("n0", from_value(json!(0)));
            black_box(uncached.filter_nodes(&fresh).expect("deps"))
        })
    });
}

criterion_group!(benches, bench_filter_nodes);
criterion_main!(benches);
