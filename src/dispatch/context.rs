//! Detection of an active execution context on the current thread

use tokio::runtime::{Handle, RuntimeFlavor};

/// Which scheduler is driving the current thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    /// Single-threaded runtime: the caller's tasks share this OS thread
    CurrentThread,
    /// Work-stealing runtime: other workers can pick up the caller's tasks
    MultiThread,
}

/// State of the current thread with respect to async runtimes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// No runtime: safe to build one and block on it here
    Absent,
    /// A runtime is already driving this thread; blocking entry here would
    /// panic with "Cannot start a runtime from within a runtime"
    Active(SchedulerKind),
    /// Runtime thread-locals are gone (thread is tearing down)
    Unavailable,
}

impl ExecutionContext {
    /// Inspect the current thread. Uses tokio's typed `TryCurrentError`
    /// rather than provoking the nested-runtime panic.
    pub fn detect() -> Self {
        match Handle::try_current() {
            Ok(handle) => Self::Active(match handle.runtime_flavor() {
                RuntimeFlavor::CurrentThread => SchedulerKind::CurrentThread,
                _ => SchedulerKind::MultiThread,
            }),
            Err(err) if err.is_missing_context() => Self::Absent,
            Err(_) => Self::Unavailable,
        }
    }

    /// Whether work must be routed away from this thread
    pub fn requires_worker(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}
