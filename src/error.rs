//! Error types for dependency execution.
//!
//! Two kinds of failure come out of a target: plain errors, which map to
//! [`DEFAULT_EXIT_CODE`], and [`Fatal`] errors, which carry an explicit process exit code.
//! A failing [`deps`](crate::Context::deps) call folds the failures of its targets into a
//! single [`DepsError`] whose exit code is resolved from theirs.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::types::TargetId;

/// Exit code for failures that carry no explicit code.
pub const DEFAULT_EXIT_CODE: i32 = 1;

/// Error type returned by target bodies.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// An error that knows which process exit code it should produce.
pub trait ExitStatus {
    fn exit_status(&self) -> i32;
}

/// An error tagged with an explicit process exit code.
///
/// Displays as its message only; the code is read through [`exit_status`].
///
/// # Examples
///
/// ```
/// use depx::{exit_status, fatal, Fatal};
///
/// let err = Fatal::new(99, "ouch!");
/// assert_eq!(err.to_string(), "ouch!");
/// assert_eq!(exit_status(Some(&err)), 99);
///
/// let err = fatal!(3, "missing {} files", 2);
/// assert_eq!(err.to_string(), "missing 2 files");
/// assert_eq!(err.code(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Fatal {
    code: i32,
    message: String,
}

impl Fatal {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl ExitStatus for Fatal {
    fn exit_status(&self) -> i32 {
        self.code
    }
}

/// Shorthand for [`Fatal::new`].
pub fn fatal(code: i32, message: impl Into<String>) -> Fatal {
    Fatal::new(code, message)
}

/// Build a [`Fatal`] error from an exit code and a format string.
#[macro_export]
macro_rules! fatal {
    ($code:expr, $($arg:tt)+) => {
        $crate::Fatal::new($code, ::std::format!($($arg)+))
    };
}

/// Failures the engine itself produces on behalf of a target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TargetError {
    /// The target body panicked.
    #[error("target {target} panicked: {message}")]
    Panicked { target: TargetId, message: String },

    /// The target depends on itself through the listed chain.
    #[error("dependency cycle: {}", display_path(.path))]
    Cycle { path: Vec<TargetId> },

    /// The task running the target was dropped before the body finished.
    #[error("target {target} was dropped before it finished")]
    Abandoned { target: TargetId },
}

fn display_path(path: &[TargetId]) -> String {
    path.iter()
        .map(TargetId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// The recorded failure of one target.
///
/// Every caller waiting on the target observes the same value, so the error is shared.
#[derive(Debug, Clone)]
pub struct Failure {
    target: TargetId,
    error: Arc<dyn StdError + Send + Sync + 'static>,
    exit_code: i32,
}

impl Failure {
    /// Record `error` as the failure of `target`.
    ///
    /// The exit code is read from the error with [`exit_status_or`], falling back to
    /// `default_exit_code` for plain errors.
    pub fn new(target: TargetId, error: impl Into<BoxError>, default_exit_code: i32) -> Self {
        let error: BoxError = error.into();
        let exit_code = exit_status_or(
            Some(&*error as &(dyn StdError + 'static)),
            default_exit_code,
        );
        Self {
            target,
            error: Arc::from(error),
            exit_code,
        }
    }

    pub fn target(&self) -> &TargetId {
        &self.target
    }

    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.error
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

/// The aggregated failure of one dependency call.
///
/// Displays the messages of all failing targets joined by newlines. The order of the
/// messages follows argument order but callers must not rely on it.
#[derive(Debug, Clone)]
pub struct DepsError {
    failures: Vec<Failure>,
    exit_code: i32,
}

impl DepsError {
    /// Fold `failures` into one error, or `None` when there are none.
    ///
    /// The exit code is the one shared by every failure, or `default_exit_code` when
    /// they disagree.
    pub(crate) fn aggregate(failures: Vec<Failure>, default_exit_code: i32) -> Option<Self> {
        let first = failures.first()?.exit_code;
        let exit_code = if failures.iter().all(|f| f.exit_code == first) {
            first
        } else {
            default_exit_code
        };
        Some(Self {
            failures,
            exit_code,
        })
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }
}

impl ExitStatus for DepsError {
    fn exit_status(&self) -> i32 {
        self.exit_code
    }
}

impl fmt::Display for DepsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            fmt::Display::fmt(failure, f)?;
        }
        Ok(())
    }
}

impl StdError for DepsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self.failures.as_slice() {
            [single] => Some(single.error() as &(dyn StdError + 'static)),
            _ => None,
        }
    }
}

/// Exit code for an optional error.
///
/// `None` maps to 0. A [`Fatal`] or a [`DepsError`] yields its own code. Anything else
/// yields [`DEFAULT_EXIT_CODE`], including errors that merely wrap a `Fatal` as their
/// `source()`.
pub fn exit_status(err: Option<&(dyn StdError + 'static)>) -> i32 {
    exit_status_or(err, DEFAULT_EXIT_CODE)
}

/// [`exit_status`] with a caller-chosen code for untagged errors.
pub fn exit_status_or(err: Option<&(dyn StdError + 'static)>, default_exit_code: i32) -> i32 {
    match err {
        None => 0,
        Some(err) => tagged_exit_code(err).unwrap_or(default_exit_code),
    }
}

fn tagged_exit_code(err: &(dyn StdError + 'static)) -> Option<i32> {
    if let Some(fatal) = err.downcast_ref::<Fatal>() {
        return Some(fatal.exit_status());
    }
    if let Some(deps) = err.downcast_ref::<DepsError>() {
        return Some(deps.exit_status());
    }
    None
}
