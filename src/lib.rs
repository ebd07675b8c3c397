//! Run-once Dependency Execution
//!
//! The execution core of a make-like build tool: given named build steps ("targets"), depx
//! runs each target's body **at most once per build**, runs independent targets
//! **concurrently**, and turns target failures into a single error carrying a well-defined
//! **process exit code**.
//!
//! # Features
//!
//! - **Run-once memoization**: A target listed by many dependency calls, or several times in
//!   one call, runs exactly once per [`Registry`]. Callers that did not start it wait for it.
//! - **Concurrent fan-out, synchronous join**: [`Context::deps`] spawns the targets it owns and
//!   returns only after every target it was given has finished.
//! - **Nested dependencies**: A target body declares its own dependencies through the
//!   [`Context`] it receives, so dependencies always finish before their dependents.
//! - **Exit codes**: [`Fatal`] errors carry an explicit code, plain errors map to
//!   [`DEFAULT_EXIT_CODE`], and [`exit_status`] reads the code back from any error.
//! - **Error aggregation**: Failures of one call are folded into a [`DepsError`] whose message
//!   joins theirs and whose code is theirs when they agree.
//! - **Runtime-agnostic**: Bodies are handed to a spawner function, so Tokio, smol, a futures
//!   thread pool or any other executor can drive the build.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use depx::{exit_status, Context, DepsError, Registry, Target};
//!
//! # smol::block_on(async {
//! let log = Arc::new(Mutex::new(Vec::new()));
//!
//! let generate = {
//!     let log = log.clone();
//!     Target::new("generate", move |_ctx: Context| {
//!         let log = log.clone();
//!         async move { log.lock().unwrap().push("generate") }
//!     })
//! };
//!
//! let compile = {
//!     let (log, generate) = (log.clone(), generate.clone());
//!     Target::new("compile", move |ctx: Context| {
//!         let (log, generate) = (log.clone(), generate.clone());
//!         async move {
//!             ctx.deps([&generate]).await?;
//!             log.lock().unwrap().push("compile");
//!             Ok::<(), DepsError>(())
//!         }
//!     })
//! };
//!
//! // One registry per build.
//! let registry = Registry::new(|fut| smol::spawn(fut).detach());
//!
//! match registry.deps([&compile, &generate]).await {
//!     Ok(()) => assert_eq!(*log.lock().unwrap(), ["generate", "compile"]),
//!     Err(err) => {
//!         eprintln!("{err}");
//!         std::process::exit(exit_status(Some(&err)));
//!     }
//! }
//! # });
//! ```
//!
//! # Failure Semantics
//!
//! A dependency call never cancels work: when one target fails, its siblings still run to
//! completion and their failures join the same [`DepsError`]. Inside a body, the error is
//! propagated with `?`; its message and exit code survive unchanged up to the outermost call,
//! where the build driver prints it and exits with [`exit_status`].
//!
//! | Failing targets in one call         | Message                     | Exit code    |
//! |-------------------------------------|-----------------------------|--------------|
//! | `Fatal::new(99, "ouch!")`           | `ouch!`                     | 99           |
//! | plain error `"boom"`                | `boom`                      | 1            |
//! | `Fatal(99, "ouch!")`, `Fatal(11, "bang!")` | `ouch!\nbang!` (any order) | 1     |
//! | N × `Fatal(C, ..)`                  | N lines                     | C            |
//!
//! Panicking bodies are caught and reported as [`TargetError::Panicked`] with the default
//! exit code.
//!
//! # Tracing
//!
//! With the `tracing` feature enabled, target registration, spawning, completion and failed
//! calls are reported as `tracing` events.

mod error;
mod registry;
mod runner;
mod target;
mod types;

pub use error::{
    exit_status, exit_status_or, fatal, BoxError, DepsError, ExitStatus, Failure, Fatal,
    TargetError, DEFAULT_EXIT_CODE,
};
pub use registry::{Completion, Outcome, Record, Registry, Spawner};
pub use runner::Context;
pub use target::{IntoTargetResult, Target, TargetResult};
pub use types::{Lifecycle, TargetId};
