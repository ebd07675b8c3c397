//! Timing proofs that independent targets overlap

use std::time::{Duration, Instant};

use depx::{Context, Target};

use crate::common::{counted, tokio_registry, Runs};

#[tokio::test(flavor = "multi_thread")]
async fn test_parallelism_proof_100_targets() {
    // 100 targets sleeping 100ms each finish in ~100ms, not 10 seconds.
    let registry = tokio_registry();
    let runs = Runs::default();
    let sleep_duration = Duration::from_millis(100);

    let targets: Vec<Target> = (0..100)
        .map(|i| {
            let name = Box::leak(format!("sleep{i}").into_boxed_str());
            counted(name, &runs, sleep_duration)
        })
        .collect();

    let start = Instant::now();
    registry.deps(&targets).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(runs.get(), 100);
    assert!(
        elapsed < Duration::from_millis(1000),
        "Targets appear to be running sequentially! Took {elapsed:?} instead of ~100ms"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_nested_fan_out_overlaps() {
    // Two parents each fan out to 10 sleeping children.
    let registry = tokio_registry();
    let runs = Runs::default();
    let sleep_duration = Duration::from_millis(100);

    let parent = |name: &'static str, prefix: &'static str| {
        let children: Vec<Target> = (0..10)
            .map(|i| {
                let child = Box::leak(format!("{prefix}{i}").into_boxed_str());
                counted(child, &runs, sleep_duration)
            })
            .collect();
        Target::new(name, move |ctx: Context| {
            let children = children.clone();
            async move { ctx.deps(&children).await }
        })
    };
    let left = parent("left", "l");
    let right = parent("right", "r");

    let start = Instant::now();
    registry.deps([&left, &right]).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(runs.get(), 20);
    assert!(
        elapsed < Duration::from_millis(800),
        "Nested fan-out did not overlap: {elapsed:?}"
    );
}
