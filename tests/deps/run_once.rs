//! Tests that every target body runs exactly once per registry

use std::time::Duration;

use depx::{BoxError, Context, Lifecycle, Target};
use tokio::time::sleep;

use crate::common::{after, counted, leaf, tokio_registry, Log, Runs};

#[tokio::test(flavor = "multi_thread")]
async fn test_same_target_twice_runs_once() {
    let registry = tokio_registry();
    let runs = Runs::default();
    let f = counted("f", &runs, Duration::ZERO);

    registry.deps([&f, &f]).await.unwrap();

    assert_eq!(runs.get(), 1);
    assert_eq!(registry.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_clones_share_identity() {
    let registry = tokio_registry();
    let runs = Runs::default();
    let f = counted("f", &runs, Duration::ZERO);

    registry.deps(vec![f.clone(), f.clone(), f]).await.unwrap();

    assert_eq!(runs.get(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sequential_calls_share_run() {
    let registry = tokio_registry();
    let runs = Runs::default();
    let f = counted("f", &runs, Duration::ZERO);

    registry.deps([&f]).await.unwrap();
    registry.deps([&f]).await.unwrap();
    registry.root().deps([&f]).await.unwrap();

    assert_eq!(runs.get(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_calls_share_run() {
    let registry = tokio_registry();
    let runs = Runs::default();
    let slow = counted("slow", &runs, Duration::from_millis(50));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let (registry, slow) = (registry.clone(), slow.clone());
            tokio::spawn(async move { registry.deps([&slow]).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(runs.get(), 1);
    assert_eq!(registry.state(slow.id()), Some(Lifecycle::Done));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_diamond_runs_shared_dependency_once() {
    //     top
    //    /   \
    //  left  right
    //    \   /
    //    base
    let registry = tokio_registry();
    let log = Log::default();
    let runs = Runs::default();

    let base = counted("base", &runs, Duration::from_millis(10));
    let left = after("left", vec![base.clone()], &log);
    let right = after("right", vec![base.clone()], &log);
    let top = after("top", vec![left, right], &log);

    registry.deps([&top]).await.unwrap();

    assert_eq!(runs.get(), 1);
    let entries = log.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries.last().map(String::as_str), Some("top"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_waiter_blocks_until_owner_finishes() {
    let registry = tokio_registry();
    let log = Log::default();

    let slow = {
        let log = log.clone();
        Target::new("slow", move |_| {
            let log = log.clone();
            async move {
                sleep(Duration::from_millis(100)).await;
                log.push("slow");
            }
        })
    };

    let owner = {
        let (registry, slow) = (registry.clone(), slow.clone());
        tokio::spawn(async move { registry.deps([&slow]).await })
    };

    sleep(Duration::from_millis(10)).await;
    assert_eq!(registry.state(slow.id()), Some(Lifecycle::Running));

    // Not the owner: this call only waits.
    registry.deps([&slow]).await.unwrap();
    assert_eq!(log.entries(), ["slow"]);

    owner.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_registries_are_independent() {
    let runs = Runs::default();
    let f = counted("f", &runs, Duration::ZERO);

    tokio_registry().deps([&f]).await.unwrap();
    tokio_registry().deps([&f]).await.unwrap();

    assert_eq!(runs.get(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_same_name_is_same_target() {
    // Identity is the name, not the closure.
    let registry = tokio_registry();
    let log = Log::default();

    let first = leaf("setup", &log);
    let second = Target::new("setup", |_ctx: Context| async {
        Err::<(), BoxError>("second body must not run".into())
    });

    registry.deps([&first]).await.unwrap();
    registry.deps([&second]).await.unwrap();

    assert_eq!(log.entries(), ["setup"]);
}
