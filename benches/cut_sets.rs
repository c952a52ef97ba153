//! Benchmarks cut-set expansion and top-event quantification on synthetic
//! fault trees shaped like redundant channels.

#![allow(missing_docs)]

use criterion::{Criterion, criterion_group, criterion_main};
use faultline::{
    CancellationToken, FailureModeId, FaultTree,
    analysis::{FaultTreeBuilder, GateKind, Limits, minimal_cut_sets, quantitative},
};

/// An AND over `channels` OR gates, each over `per_channel` basic events,
/// alongside a `k`-out-of-`voters` voting gate, under a top-level OR.
fn redundant_channels(channels: usize, per_channel: usize, k: usize, voters: usize) -> FaultTree {
    let mut builder = FaultTreeBuilder::new();
    let mut event = |name: String| {
        let id = FailureModeId::new(name.clone()).unwrap();
        builder.basic_event(&id, name)
    };

    let channel_events: Vec<Vec<_>> = (0..channels)
        .map(|c| (0..per_channel).map(|e| event(format!("ch{c}_fm{e}"))).collect())
        .collect();
    let voter_events: Vec<_> = (0..voters).map(|v| event(format!("voter{v}"))).collect();

    let channels = channel_events
        .into_iter()
        .enumerate()
        .map(|(c, events)| {
            builder
                .gate(GateKind::Or, format!("channel {c} lost"), events)
                .unwrap()
        })
        .collect();
    let all_channels = builder
        .gate(GateKind::And, "all channels lost", channels)
        .unwrap();
    let voting = builder
        .gate(GateKind::AtLeast { k }, "voting lost", voter_events)
        .unwrap();
    let top = builder
        .gate(GateKind::Or, "function lost", vec![all_channels, voting])
        .unwrap();

    builder.build(top, "function lost").unwrap()
}

fn expansion(c: &mut Criterion) {
    let tree = redundant_channels(4, 6, 3, 10);
    let limits = Limits {
        max_cut_sets: 100_000,
        max_tree_depth: 64,
    };
    let cancel = CancellationToken::new();

    c.bench_function("minimal cut sets (1416)", |b| {
        b.iter(|| minimal_cut_sets(&tree, limits, &cancel).unwrap());
    });

    let qualitative = minimal_cut_sets(&tree, limits, &cancel).unwrap();
    let probabilities = vec![1e-3; tree.events().len()];
    c.bench_function("rare-event top probability", |b| {
        b.iter(|| {
            quantitative::top_event_probability(&qualitative.cut_sets, &probabilities, 0, &cancel)
                .unwrap()
        });
    });
}

fn exact(c: &mut Criterion) {
    let tree = redundant_channels(2, 3, 2, 4);
    let limits = Limits {
        max_cut_sets: 1_000,
        max_tree_depth: 64,
    };
    let cancel = CancellationToken::new();
    let qualitative = minimal_cut_sets(&tree, limits, &cancel).unwrap();
    let probabilities = vec![1e-2; tree.events().len()];

    c.bench_function("inclusion-exclusion (15 cut sets)", |b| {
        b.iter(|| {
            quantitative::inclusion_exclusion(&qualitative.cut_sets, &probabilities, &cancel)
                .unwrap()
        });
    });
}

criterion_group!(benches, expansion, exact);
criterion_main!(benches);
