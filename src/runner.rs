//! Dependency runner.
//!
//! [`Context::deps`] is the heart of the crate: for each target it asks the [`Registry`]
//! whether this call owns the target or merely waits on it, spawns the bodies it owns,
//! then joins on every target of the call and folds their failures into one
//! [`DepsError`].
//!
//! A body receives its own [`Context`] and may call `deps` again, so a dependency always
//! finishes before the body that declared it returns.

use std::any::Any;
use std::borrow::Borrow;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};

#[cfg(feature = "tracing")]
use tracing::{debug, error, trace};

use crate::error::{DepsError, Failure, TargetError};
use crate::registry::{Completion, Outcome, Registry};
use crate::target::Target;
use crate::types::TargetId;

/// Handle through which a target body declares its dependencies.
///
/// Each context remembers the chain of targets that led to it, which lets a call that
/// would wait on one of its own ancestors fail with [`TargetError::Cycle`] instead of
/// hanging.
#[derive(Clone)]
pub struct Context {
    registry: Registry,
    chain: Arc<Vec<TargetId>>,
}

impl Context {
    pub(crate) fn root(registry: Registry) -> Self {
        Self {
            registry,
            chain: Arc::new(Vec::new()),
        }
    }

    fn child(&self, id: &TargetId) -> Self {
        let mut chain = Vec::with_capacity(self.chain.len() + 1);
        chain.extend(self.chain.iter().cloned());
        chain.push(id.clone());
        Self {
            registry: self.registry.clone(),
            chain: Arc::new(chain),
        }
    }

    /// The target whose body holds this context, or `None` at the top level.
    pub fn current(&self) -> Option<&TargetId> {
        self.chain.last()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run `targets` concurrently and wait for all of them.
    ///
    /// Targets nobody has started yet are spawned by this call; targets already running or
    /// finished are only awaited. Each body runs at most once per registry no matter how
    /// many calls list it. Listing the same target twice in one call is the same as listing
    /// it once.
    ///
    /// # Errors
    ///
    /// Returns a [`DepsError`] holding the failures of this call's targets when any of
    /// them failed. Siblings are never cancelled: every target of the call has finished
    /// by the time the error is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use depx::{exit_status, Fatal, Registry, Target};
    ///
    /// # smol::block_on(async {
    /// let registry = Registry::new(|fut| smol::spawn(fut).detach());
    /// let ok = Target::new("ok", |_| async {});
    /// let broken = Target::new("broken", |_| async { Err::<(), _>(Fatal::new(99, "ouch!")) });
    ///
    /// let err = registry.deps([&ok, &broken]).await.unwrap_err();
    /// assert_eq!(err.to_string(), "ouch!");
    /// assert_eq!(exit_status(Some(&err)), 99);
    /// # });
    /// ```
    pub async fn deps<I>(&self, targets: I) -> Result<(), DepsError>
    where
        I: IntoIterator,
        I::Item: Borrow<Target>,
    {
        let waits = self.start_all(targets);

        #[cfg(feature = "tracing")]
        trace!(count = waits.len(), parent = ?self.current(), "waiting on dependencies");

        let failures: Vec<Failure> = future::join_all(waits)
            .await
            .into_iter()
            .flatten()
            .collect();

        match DepsError::aggregate(failures, self.registry.default_exit_code()) {
            None => Ok(()),
            Some(err) => {
                #[cfg(feature = "tracing")]
                error!(
                    parent = ?self.current(),
                    exit_code = err.exit_code(),
                    failed = err.failures().len(),
                    "dependencies failed"
                );
                Err(err)
            }
        }
    }

    /// Run `targets` one at a time, in order, stopping at the first failure.
    ///
    /// Run-once bookkeeping is shared with [`Context::deps`]: a target that already ran is
    /// not run again, and one running elsewhere is awaited.
    pub async fn serial_deps<I>(&self, targets: I) -> Result<(), DepsError>
    where
        I: IntoIterator,
        I::Item: Borrow<Target>,
    {
        for target in targets {
            let target: &Target = target.borrow();
            self.deps([target]).await?;
        }
        Ok(())
    }

    /// Register every target and collect one completion future per distinct target.
    ///
    /// Kept synchronous so that the caller's iterator never lives across an await point.
    fn start_all<I>(&self, targets: I) -> Vec<BoxFuture<'static, Outcome>>
    where
        I: IntoIterator,
        I::Item: Borrow<Target>,
    {
        let mut seen = HashSet::new();
        let mut waits = Vec::new();

        for target in targets {
            let target: &Target = target.borrow();
            if !seen.insert(target.id().clone()) {
                continue;
            }

            if let Some(path) = self.cycle_through(target.id()) {
                let failure = Failure::new(
                    target.id().clone(),
                    TargetError::Cycle { path },
                    self.registry.default_exit_code(),
                );
                waits.push(future::ready(Some(failure)).boxed());
                continue;
            }

            let (record, completion) = self.registry.get_or_start(target.id());
            if let Some(completion) = completion {
                self.spawn_owned(target, completion);
            }
            waits.push(record.wait().boxed());
        }

        waits
    }

    /// The chain from the first occurrence of `id` back to `id`, if `id` is an ancestor.
    fn cycle_through(&self, id: &TargetId) -> Option<Vec<TargetId>> {
        let start = self.chain.iter().position(|ancestor| ancestor == id)?;
        let mut path = self.chain[start..].to_vec();
        path.push(id.clone());
        Some(path)
    }

    fn spawn_owned(&self, target: &Target, completion: Completion) {
        #[cfg(feature = "tracing")]
        debug!(target_id = %target.id(), parent = ?self.current(), "spawning target");

        let ctx = self.child(target.id());
        let target = target.clone();
        let default_exit_code = self.registry.default_exit_code();

        let task = async move {
            // The body is invoked inside the guarded future: a panic before its first
            // await is caught too.
            let result = AssertUnwindSafe(async { target.call(ctx).await })
                .catch_unwind()
                .await;

            let id = target.id().clone();
            let outcome = match result {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(Failure::new(id, err, default_exit_code)),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());

                    #[cfg(feature = "tracing")]
                    error!(target_id = %id, panic_message = %message, "target panicked");

                    Some(Failure::new(
                        id.clone(),
                        TargetError::Panicked {
                            target: id,
                            message,
                        },
                        default_exit_code,
                    ))
                }
            };

            #[cfg(feature = "tracing")]
            {
                match &outcome {
                    None => debug!(target_id = %completion.id(), "target finished"),
                    Some(failure) => debug!(
                        target_id = %completion.id(),
                        exit_code = failure.exit_code(),
                        error = %failure,
                        "target failed"
                    ),
                }
            }

            completion.finish(outcome);
        };

        self.registry.spawn(Box::pin(task));
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
