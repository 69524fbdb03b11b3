//! Remote call dispatch
//!
//! Runs a suspend-capable unit of work to completion from synchronous code,
//! whether or not the calling thread is already driven by an async runtime:
//! - no runtime on this thread: build a current-thread runtime and block on it
//! - runtime already active: hand the work to a one-shot worker thread with
//!   its own runtime and wait for it at the OS-thread level

mod context;
mod dispatcher;

pub use context::{ExecutionContext, SchedulerKind};
pub use dispatcher::{DispatchError, DispatchPath, Dispatcher, dispatch};
