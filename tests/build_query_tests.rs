//! End-to-end pipeline tests: schema -> ordering -> binning -> compile -> query.

use std::collections::HashMap;
use tabledd::{
    BinConfig, BuildConfig, CompileMethod, Dimension, MddBuilder, Pattern, Schema, Value,
};

static TRACING: std::sync::Once = std::sync::Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

fn row(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn fixed(order: &[&str]) -> BuildConfig {
    BuildConfig::fixed(order.iter().map(|s| (*s).to_string()).collect())
}

#[test]
fn test_basic_build_and_exists() {
    init_tracing();
    let schema = Schema::new(vec![
        Dimension::categorical("region"),
        Dimension::ordinal("priority"),
    ])
    .expect("schema");
    let rows = vec![
        row(&[("region", Value::from("EU")), ("priority", Value::from(1))]),
        row(&[("region", Value::from("EU")), ("priority", Value::from(2))]),
        row(&[("region", Value::from("US")), ("priority", Value::from(1))]),
    ];
    let mdd = MddBuilder::new(schema)
        .with_config(fixed(&["region", "priority"]))
        .fit(rows)
        .expect("fit");

    let size = mdd.size();
    assert_eq!(size.layers, 2);
    // Root, EU node, US node, one shared terminal.
    assert_eq!(size.nodes, 4);
    // Labeled arcs: root {EU, US}, EU node {1, 2}, US node {1}.
    assert_eq!(size.arcs, 5);

    assert_eq!(mdd.count(&Pattern::new()).expect("count"), 3);
    assert_eq!(
        mdd.count(&Pattern::new().with("region", "EU")).expect("count"),
        2
    );
    assert!(mdd
        .exists(&Pattern::new().with("region", "EU").with("priority", 1))
        .expect("exists"));
    assert!(!mdd
        .exists(&Pattern::new().with("region", "EU").with("priority", 3))
        .expect("exists"));

    assert!(mdd.validate().is_empty());
}

#[test]
fn test_reduction_merges_duplicate_subtrees() {
    let schema = Schema::new(vec![
        Dimension::categorical("a"),
        Dimension::categorical("b"),
        Dimension::categorical("c"),
    ])
    .expect("schema");
    let rows = vec![
        row(&[("a", Value::from(0)), ("b", Value::from(0)), ("c", Value::from(0))]),
        row(&[("a", Value::from(0)), ("b", Value::from(0)), ("c", Value::from(1))]),
        row(&[("a", Value::from(1)), ("b", Value::from(0)), ("c", Value::from(0))]),
        row(&[("a", Value::from(1)), ("b", Value::from(0)), ("c", Value::from(1))]),
    ];
    let mdd = MddBuilder::new(schema)
        .with_config(fixed(&["a", "b", "c"]))
        .fit(rows)
        .expect("fit");

    // The c-layer nodes under (a=0, b=0) and (a=1, b=0) carry the same
    // sub-language and merge; that in turn makes both b-layer nodes
    // identical, so they merge too. One node per inner layer remains.
    assert_eq!(mdd.layer_widths(), vec![1, 1, 1, 1]);
    let size = mdd.size();
    assert_eq!(size.nodes, 4);
    assert_eq!(size.arcs, 5);

    // Counts aggregate across the merges.
    let merged_b = mdd
        .layer_nodes(1)
        .next()
        .expect("merged a-successor");
    assert_eq!(merged_b.reach_count(), 4);
    assert_eq!(mdd.count(&Pattern::new().with("b", 0)).expect("count"), 4);
    assert_eq!(mdd.count(&Pattern::new().with("c", 1)).expect("count"), 2);
    assert!(mdd.validate().is_empty());
}

#[test]
fn test_disable_reduction_keeps_trie_shape() {
    let schema = Schema::new(vec![
        Dimension::categorical("a"),
        Dimension::categorical("b"),
    ])
    .expect("schema");
    let rows = vec![
        row(&[("a", Value::from("x")), ("b", Value::from("p"))]),
        row(&[("a", Value::from("y")), ("b", Value::from("p"))]),
    ];
    let mut config = fixed(&["a", "b"]);
    config.enable_reduction = false;
    let mdd = MddBuilder::new(schema)
        .with_config(config)
        .fit(rows)
        .expect("fit");
    assert!(!mdd.is_reduced());
    // Two full chains below the root: nothing merged.
    assert_eq!(mdd.size().nodes, 5);
    // Still a consistent diagram with working queries.
    assert!(mdd.validate().is_empty());
    assert_eq!(mdd.count(&Pattern::new().with("b", "p")).expect("count"), 2);
}

#[test]
fn test_complete_with_laplace_smoothing() {
    let schema = Schema::new(vec![
        Dimension::categorical("region"),
        Dimension::categorical("product"),
    ])
    .expect("schema");
    let rows = vec![
        row(&[("region", Value::from("EU")), ("product", Value::from("A"))]),
        row(&[("region", Value::from("EU")), ("product", Value::from("A"))]),
        row(&[("region", Value::from("EU")), ("product", Value::from("B"))]),
        row(&[("region", Value::from("US")), ("product", Value::from("B"))]),
    ];
    let mdd = MddBuilder::new(schema)
        .with_config(fixed(&["region", "product"]))
        .fit(rows)
        .expect("fit");

    let results = mdd
        .complete(&Pattern::new().with("region", "EU"), 2)
        .expect("complete");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].path["region"], Value::from("EU"));
    assert_eq!(results[0].path["product"], Value::from("A"));
    assert_eq!(results[1].path["product"], Value::from("B"));
    let expected = ((2.0_f64 + 0.1) / (3.0 + 0.2)).ln();
    assert!((results[0].score - expected).abs() < 1e-12);
    assert!((results[0].details["logprob"] - expected).abs() < 1e-12);
}

#[test]
fn test_nearest_with_custom_distance() {
    let schema = Schema::new(vec![
        Dimension::categorical("task"),
        Dimension::ordinal("priority"),
    ])
    .expect("schema");
    let rows: Vec<_> = [1i64, 2, 3, 5]
        .iter()
        .map(|&p| row(&[("task", Value::from("deploy")), ("priority", Value::from(p))]))
        .collect();
    let mdd = MddBuilder::new(schema)
        .with_config(fixed(&["task", "priority"]))
        .fit(rows)
        .expect("fit");

    let distances = tabledd::DistanceSet::new().with("priority", |want: &Value, have: &Value| {
        match (want.as_f64(), have.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs(),
            _ => 1.0,
        }
    });
    let results = mdd
        .nearest(&Pattern::new().with("priority", 4), &distances, 2)
        .expect("nearest");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].path["priority"], Value::from(3));
    assert_eq!(results[1].path["priority"], Value::from(5));
    assert!((results[0].details["distance"] - 1.0).abs() < 1e-12);
    assert!((results[1].details["distance"] - 1.0).abs() < 1e-12);
    assert!((results[0].score + 1.0).abs() < 1e-12);
}

#[test]
fn test_numeric_binning_round_trip() {
    let schema = Schema::new(vec![
        Dimension::numeric("qty").with_bins(BinConfig::quantile(2)),
    ])
    .expect("schema");
    let rows: Vec<_> = [1.0, 2.0, 3.0, 4.0]
        .iter()
        .map(|&x| row(&[("qty", Value::from(x))]))
        .collect();
    let mdd = MddBuilder::new(schema).fit(rows).expect("fit");

    let model = mdd.bin_model("qty").expect("bin model");
    assert_eq!(model.bins(), 2);
    assert_eq!(mdd.count(&Pattern::new().with("qty", 1.5)).expect("count"), 2);
    assert_eq!(mdd.count(&Pattern::new().with("qty", 3.5)).expect("count"), 2);

    // Probing with the interval label itself hits the same arc.
    let label = model.labels()[0].clone();
    assert_eq!(
        mdd.count(&Pattern::new().with("qty", label)).expect("count"),
        2
    );
}

#[test]
fn test_slice_method_end_to_end() {
    let schema = Schema::new(vec![
        Dimension::categorical("region"),
        Dimension::ordinal("priority"),
    ])
    .expect("schema");
    let rows = vec![
        row(&[("region", Value::from("EU")), ("priority", Value::from(1))]),
        row(&[("region", Value::from("EU")), ("priority", Value::from(2))]),
        row(&[("region", Value::from("US")), ("priority", Value::from(1))]),
    ];
    let mdd = MddBuilder::new(schema)
        .with_config(fixed(&["region", "priority"]).with_method(CompileMethod::Slice))
        .fit(rows)
        .expect("fit");
    assert!(mdd.is_reduced());
    assert_eq!(mdd.size().nodes, 4);
    assert_eq!(mdd.count(&Pattern::new().with("region", "EU")).expect("count"), 2);
    assert!(mdd.validate().is_empty());
}

#[test]
fn test_renderer_iteration_is_stable() {
    let schema = Schema::new(vec![
        Dimension::categorical("a"),
        Dimension::categorical("b"),
    ])
    .expect("schema");
    let rows = vec![
        row(&[("a", Value::from("x")), ("b", Value::from("p"))]),
        row(&[("a", Value::from("y")), ("b", Value::from("q"))]),
    ];
    let mdd = MddBuilder::new(schema)
        .with_config(fixed(&["a", "b"]))
        .fit(rows)
        .expect("fit");

    let snapshot = |m: &tabledd::Mdd| -> Vec<(usize, usize, u64, u64, Vec<(String, usize, u64)>)> {
        m.iter_nodes()
            .map(|v| {
                (
                    v.id,
                    v.layer(),
                    v.terminal_count(),
                    v.reach_count(),
                    v.edges()
                        .map(|e| (e.label.to_string(), e.target, e.count))
                        .collect(),
                )
            })
            .collect()
    };
    assert_eq!(snapshot(&mdd), snapshot(&mdd));
    // Layer-major ids: layers are non-decreasing along the id sequence.
    let layers: Vec<usize> = mdd.iter_nodes().map(|v| v.layer()).collect();
    assert!(layers.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_path_fidelity() {
    let schema = Schema::new(vec![
        Dimension::categorical("a"),
        Dimension::categorical("b"),
        Dimension::categorical("c"),
    ])
    .expect("schema");
    let input = vec![
        row(&[("a", Value::from("r")), ("b", Value::from("s")), ("c", Value::from("t"))]),
        row(&[("a", Value::from("r")), ("b", Value::from("u")), ("c", Value::from("t"))]),
        row(&[("a", Value::from("v")), ("b", Value::from("s")), ("c", Value::from("t"))]),
    ];
    let mdd = MddBuilder::new(schema)
        .with_config(fixed(&["a", "b", "c"]))
        .fit(input.clone())
        .expect("fit");

    // Every input row exists.
    for r in &input {
        let pattern: Pattern = r
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        assert!(mdd.exists(&pattern).expect("exists"));
    }
    // Every enumerated path corresponds to an input row.
    let paths = mdd.matches(&Pattern::new()).expect("matches");
    assert_eq!(paths.len(), 3);
    for path in &paths {
        assert!(input.iter().any(|r| {
            path.iter().all(|(dim, label)| r.get(dim) == Some(label))
        }));
    }
    // Terminal tallies sum to the input size.
    let terminal_total: u64 = mdd
        .iter_nodes()
        .filter(|v| v.is_terminal())
        .map(|v| v.terminal_count())
        .sum();
    assert_eq!(terminal_total, 3);
}
