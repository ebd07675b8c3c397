//! Tests for exit code resolution

use depx::{exit_status, exit_status_or, BoxError, Registry, Target};
use test_case::test_case;

use crate::common::{failing, fatal, tokio_registry};

#[test_case(2 ; "two targets")]
#[test_case(5 ; "five targets")]
#[test_case(20 ; "twenty targets")]
#[tokio::test(flavor = "multi_thread")]
async fn test_shared_code_is_kept(count: usize) {
    let registry = tokio_registry();
    let targets: Vec<Target> = (0..count)
        .map(|i| {
            let name = Box::leak(format!("t{i}").into_boxed_str());
            fatal(name, 33, "shared code")
        })
        .collect();

    let err = registry.deps(&targets).await.unwrap_err();

    assert_eq!(err.failures().len(), count);
    assert_eq!(err.to_string().lines().count(), count);
    assert_eq!(exit_status(Some(&err)), 33);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_plain_and_fatal_mix_falls_back() {
    let registry = tokio_registry();
    let a = failing("a", "plain");
    let b = fatal("b", 1, "fatal one");
    let c = fatal("c", 4, "fatal four");

    // Plain errors count as code 1, so a and b agree.
    let err = registry.deps([&a, &b]).await.unwrap_err();
    assert_eq!(exit_status(Some(&err)), 1);

    let err = registry.deps([&b, &c]).await.unwrap_err();
    assert_eq!(exit_status(Some(&err)), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_configured_default_code() {
    let registry: Registry = tokio_registry().with_default_exit_code(3);
    let a = fatal("a", 10, "ten");
    let b = fatal("b", 20, "twenty");

    let err = registry.deps([&a, &b]).await.unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_macro_built_fatal() {
    let registry = tokio_registry();
    let missing = Target::new("missing", |_| async {
        Err::<(), _>(depx::fatal!(127, "command {} not found", "protoc"))
    });

    let err = registry.deps([&missing]).await.unwrap_err();

    assert_eq!(err.to_string(), "command protoc not found");
    assert_eq!(exit_status(Some(&err)), 127);
}

#[test]
fn test_exit_status_of_success_is_zero() {
    assert_eq!(exit_status(None), 0);
    assert_eq!(exit_status_or(None, 9), 0);
}

#[test]
fn test_exit_status_of_boxed_fatal() {
    let err: BoxError = Box::new(depx::fatal(8, "eight"));
    assert_eq!(exit_status(Some(&*err)), 8);
}
