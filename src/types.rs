//! Core type definitions for targets and their lifecycle.
//!
//! This module defines the identity used to recognise "the same build step" across
//! separate dependency calls, and the lifecycle states a target moves through.

use std::fmt;
use std::sync::Arc;

/// Stable identity of a target.
///
/// Two [`Target`](crate::Target)s with equal ids are the same build step: the registry runs
/// the body of only one of them, once per build. Ids are cheap to clone.
///
/// # Examples
///
/// ```
/// use depx::TargetId;
///
/// let a = TargetId::new("build");
/// let b: TargetId = "build".into();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "build");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(Arc<str>);

impl TargetId {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TargetId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&TargetId> for TargetId {
    fn from(id: &TargetId) -> Self {
        id.clone()
    }
}

/// Where a target is in its once-per-build lifecycle.
///
/// Transitions are `Pending → Running → Done`, each taken exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Known to the registry, no owner yet.
    Pending,
    /// An owner is executing the body.
    Running,
    /// The body finished; its outcome is recorded.
    Done,
}
