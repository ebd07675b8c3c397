//! Targets: named, run-once build steps.
//!
//! A [`Target`] pairs a stable [`TargetId`] with an async body. The body receives a
//! [`Context`] through which it declares its own dependencies.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::error::BoxError;
use crate::runner::Context;
use crate::types::TargetId;

/// Result of running a target body.
pub type TargetResult = Result<(), BoxError>;

type Body = Arc<dyn Fn(Context) -> BoxFuture<'static, TargetResult> + Send + Sync>;

/// Values a target body may return.
///
/// Implemented for `()` (infallible targets) and for `Result<(), E>` with any error that
/// converts into a [`BoxError`].
pub trait IntoTargetResult {
    fn into_target_result(self) -> TargetResult;
}

impl IntoTargetResult for () {
    fn into_target_result(self) -> TargetResult {
        Ok(())
    }
}

impl<E> IntoTargetResult for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_target_result(self) -> TargetResult {
        self.map_err(Into::into)
    }
}

/// A zero-argument build step with a stable identity.
///
/// Cloning a target is cheap and keeps its identity: the clone is the same build step.
///
/// # Examples
///
/// ```
/// use depx::{Context, DepsError, Target};
///
/// let generate = Target::new("generate", |_ctx: Context| async {});
///
/// let compile = {
///     let generate = generate.clone();
///     Target::new("compile", move |ctx: Context| {
///         let generate = generate.clone();
///         async move {
///             ctx.deps([&generate]).await?;
///             Ok::<(), DepsError>(())
///         }
///     })
/// };
///
/// assert_eq!(compile.id().as_str(), "compile");
/// ```
#[derive(Clone)]
pub struct Target {
    id: TargetId,
    body: Body,
}

impl Target {
    pub fn new<F, Fut>(id: impl Into<TargetId>, body: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoTargetResult,
    {
        let body: Body = Arc::new(move |ctx: Context| {
            let fut = body(ctx);
            async move { fut.await.into_target_result() }.boxed()
        });
        Self {
            id: id.into(),
            body,
        }
    }

    pub fn id(&self) -> &TargetId {
        &self.id
    }

    pub(crate) fn call(&self, ctx: Context) -> BoxFuture<'static, TargetResult> {
        (self.body)(ctx)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target").field("id", &self.id).finish()
    }
}
