//! Per-build registry of target completions.
//!
//! The registry is the only shared mutable state of a build. It maps every
//! [`TargetId`] referenced so far to a [`Record`] and guarantees that exactly one caller
//! becomes the owner of each record. Everyone else waits on the record's completion.
//!
//! A registry is created by the build driver and dropped when the build ends; nothing here
//! is global, so independent builds (and tests) never observe each other's records.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

#[cfg(feature = "tracing")]
use tracing::{debug, trace, warn};

use crate::error::{DepsError, Failure, TargetError, DEFAULT_EXIT_CODE};
use crate::runner::Context;
use crate::target::Target;
use crate::types::{Lifecycle, TargetId};

/// Stored outcome of a finished target: `None` on success.
pub type Outcome = Option<Failure>;

/// Spawns a future onto whatever async runtime drives the build.
///
/// Examples:
/// - Tokio: `|fut| { tokio::spawn(fut); }`
/// - Smol: `|fut| smol::spawn(fut).detach()`
/// - futures `ThreadPool`: `move |fut| pool.spawn_ok(fut)`
pub type Spawner = Arc<dyn Fn(BoxFuture<'static, ()>) + Send + Sync>;

struct Slot {
    lifecycle: Lifecycle,
    outcome: Outcome,
    sender: Option<oneshot::Sender<Outcome>>,
}

/// Completion record of one target.
///
/// Moves `Pending → Running → Done` exactly once. Waiters are released when the record
/// reaches `Done`.
pub struct Record {
    id: TargetId,
    default_exit_code: i32,
    slot: Mutex<Slot>,
    done: Shared<oneshot::Receiver<Outcome>>,
}

impl Record {
    fn new(id: TargetId, default_exit_code: i32) -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            id,
            default_exit_code,
            slot: Mutex::new(Slot {
                lifecycle: Lifecycle::Pending,
                outcome: None,
                sender: Some(sender),
            }),
            done: receiver.shared(),
        }
    }

    pub fn id(&self) -> &TargetId {
        &self.id
    }

    pub fn state(&self) -> Lifecycle {
        self.slot.lock().lifecycle
    }

    /// Outcome of the target, once it is done.
    pub fn outcome(&self) -> Option<Outcome> {
        let slot = self.slot.lock();
        (slot.lifecycle == Lifecycle::Done).then(|| slot.outcome.clone())
    }

    /// Take the `Pending → Running` transition. Only the first caller gets `true`.
    fn try_start(&self) -> bool {
        let mut slot = self.slot.lock();
        if slot.lifecycle == Lifecycle::Pending {
            slot.lifecycle = Lifecycle::Running;
            true
        } else {
            false
        }
    }

    /// Take the transition to `Done` and release waiters. Later calls are ignored.
    fn finish(&self, outcome: Outcome) -> bool {
        let sender = {
            let mut slot = self.slot.lock();
            if slot.lifecycle == Lifecycle::Done {
                return false;
            }
            slot.lifecycle = Lifecycle::Done;
            slot.outcome = outcome.clone();
            slot.sender.take()
        };

        if let Some(sender) = sender {
            // Nobody holding the receiver means nobody is waiting.
            let _ = sender.send(outcome);
        }
        true
    }

    /// Wait until the record is done and return its outcome.
    pub fn wait(&self) -> impl Future<Output = Outcome> + Send + 'static {
        let done = self.done.clone();
        let id = self.id.clone();
        let default_exit_code = self.default_exit_code;
        async move {
            done.await.unwrap_or_else(|_canceled| {
                Some(Failure::new(
                    id.clone(),
                    TargetError::Abandoned { target: id },
                    default_exit_code,
                ))
            })
        }
    }
}

/// Ownership of a started record.
///
/// Handed to the single caller that won the `Pending → Running` transition. Dropping it
/// without calling [`Completion::finish`] marks the target as abandoned so that waiters are
/// never left hanging.
pub struct Completion {
    record: Arc<Record>,
    finished: bool,
}

impl Completion {
    pub fn id(&self) -> &TargetId {
        self.record.id()
    }

    pub fn finish(mut self, outcome: Outcome) {
        self.finished = true;
        self.record.finish(outcome);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        #[cfg(feature = "tracing")]
        warn!(target_id = %self.record.id, "target dropped before finishing");

        let id = self.record.id.clone();
        let failure = Failure::new(
            id.clone(),
            TargetError::Abandoned { target: id },
            self.record.default_exit_code,
        );
        self.record.finish(Some(failure));
    }
}

/// Table of target completions for one build.
///
/// Cheap to clone; clones share the same records.
///
/// # Examples
///
/// ```
/// use depx::{Registry, Target};
///
/// # smol::block_on(async {
/// let registry = Registry::new(|fut| smol::spawn(fut).detach());
/// let hello = Target::new("hello", |_| async {});
///
/// registry.deps([&hello, &hello]).await.unwrap();
/// assert_eq!(registry.len(), 1);
/// # });
/// ```
#[derive(Clone)]
pub struct Registry {
    records: Arc<Mutex<HashMap<TargetId, Arc<Record>>>>,
    spawner: Spawner,
    default_exit_code: i32,
}

impl Registry {
    /// Create an empty registry that runs target bodies through `spawner`.
    pub fn new<S>(spawner: S) -> Self
    where
        S: Fn(BoxFuture<'static, ()>) + Send + Sync + 'static,
    {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            spawner: Arc::new(spawner),
            default_exit_code: DEFAULT_EXIT_CODE,
        }
    }

    /// Exit code used for plain errors and for aggregates whose codes disagree.
    pub fn with_default_exit_code(mut self, code: i32) -> Self {
        self.default_exit_code = code;
        self
    }

    pub fn default_exit_code(&self) -> i32 {
        self.default_exit_code
    }

    /// Return the record for `id`, creating it if needed.
    ///
    /// The caller that takes the record from `Pending` to `Running` also receives its
    /// [`Completion`] and is responsible for running the target.
    pub fn get_or_start(&self, id: &TargetId) -> (Arc<Record>, Option<Completion>) {
        let mut records = self.records.lock();
        let record = records
            .entry(id.clone())
            .or_insert_with(|| {
                #[cfg(feature = "tracing")]
                trace!(target_id = %id, "registering target");

                Arc::new(Record::new(id.clone(), self.default_exit_code))
            })
            .clone();
        drop(records);

        let completion = record.try_start().then(|| Completion {
            record: Arc::clone(&record),
            finished: false,
        });
        (record, completion)
    }

    /// Mark `id` as done with `outcome`, releasing its waiters.
    ///
    /// Returns `false` if the target is unknown or already done.
    pub fn mark_done(&self, id: &TargetId, outcome: Outcome) -> bool {
        match self.record(id) {
            Some(record) => record.finish(outcome),
            None => false,
        }
    }

    /// Wait for `id` to finish and return its outcome.
    ///
    /// Returns `None` at once when the registry has never seen `id`, so an unregistered
    /// target is never mistaken for one that succeeded. Otherwise resolves to
    /// `Some(outcome)` once the target is done.
    pub async fn wait(&self, id: &TargetId) -> Option<Outcome> {
        let record = self.record(id)?;
        Some(record.wait().await)
    }

    pub fn state(&self, id: &TargetId) -> Option<Lifecycle> {
        self.record(id).map(|record| record.state())
    }

    /// Number of distinct targets referenced so far.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn record(&self, id: &TargetId) -> Option<Arc<Record>> {
        self.records.lock().get(id).cloned()
    }

    pub(crate) fn spawn(&self, fut: BoxFuture<'static, ()>) {
        (self.spawner)(fut)
    }

    /// Context for top-level calls made by the build driver.
    pub fn root(&self) -> Context {
        Context::root(self.clone())
    }

    /// Run `targets` concurrently from the top level. See [`Context::deps`].
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, targets)))]
    pub async fn deps<I>(&self, targets: I) -> Result<(), DepsError>
    where
        I: IntoIterator,
        I::Item: std::borrow::Borrow<Target>,
    {
        #[cfg(feature = "tracing")]
        debug!("running top-level dependencies");

        self.root().deps(targets).await
    }

    /// Run `targets` one after another from the top level. See [`Context::serial_deps`].
    pub async fn serial_deps<I>(&self, targets: I) -> Result<(), DepsError>
    where
        I: IntoIterator,
        I::Item: std::borrow::Borrow<Target>,
    {
        self.root().serial_deps(targets).await
    }
}
