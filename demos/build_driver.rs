//! # Build Driver Example
//!
//! A minimal driver showing how a build tool uses depx: one [`Registry`] per invocation,
//! top-level targets run through `deps`, and the process exits with the code of the
//! failure, if any.
//!
//! ## Running This Example
//!
//! ```bash
//! # Build everything
//! cargo run --example build_driver -- all
//!
//! # A target that fails with exit code 3
//! cargo run --example build_driver -- release
//!
//! # With tracing output
//! RUST_LOG=depx=debug cargo run --example build_driver --features tracing -- all
//! ```

use std::collections::HashMap;
use std::time::Duration;

use depx::{exit_status, fatal, BoxError, Context, Registry, Target};
use tracing_subscriber::{fmt, EnvFilter};

fn step(name: &'static str, deps: Vec<Target>, work: Duration) -> Target {
    Target::new(name, move |ctx: Context| {
        let deps = deps.clone();
        async move {
            ctx.deps(&deps).await?;
            println!("running {name}");
            tokio::time::sleep(work).await;
            Ok::<(), BoxError>(())
        }
    })
}

fn targets() -> HashMap<String, Target> {
    let generate = step("generate", Vec::new(), Duration::from_millis(50));
    let compile = step("compile", vec![generate.clone()], Duration::from_millis(100));
    let docs = step("docs", vec![generate.clone()], Duration::from_millis(80));
    let test = step("test", vec![compile.clone()], Duration::from_millis(60));
    let all = step(
        "all",
        vec![compile.clone(), docs.clone(), test.clone()],
        Duration::ZERO,
    );
    let sign = Target::new("sign", |_| async {
        Err::<(), _>(depx::fatal!(3, "signing key {} not found", "release.key"))
    });
    let release = step("release", vec![all.clone(), sign.clone()], Duration::ZERO);

    [generate, compile, docs, test, all, sign, release]
        .into_iter()
        .map(|target| (target.id().to_string(), target))
        .collect()
}

#[tokio::main]
async fn main() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let known = targets();
    let mut requested = Vec::new();
    for name in std::env::args().skip(1) {
        match known.get(&name) {
            Some(target) => requested.push(target.clone()),
            None => {
                let err = fatal(2, format!("unknown target {name:?}"));
                eprintln!("Error: {err}");
                std::process::exit(exit_status(Some(&err)));
            }
        }
    }

    let registry = Registry::new(|fut| {
        tokio::spawn(fut);
    });

    if let Err(err) = registry.deps(&requested).await {
        eprintln!("Error: {err}");
        std::process::exit(exit_status(Some(&err)));
    }
}
