//! The dispatcher: run a work item to completion, on this thread or a worker

use std::any::Any;
use std::future::Future;
use std::thread;

use thiserror::Error;

use super::context::{ExecutionContext, SchedulerKind};
use crate::environment::RuntimeEnvironment;

/// Default name for one-shot worker threads
const DEFAULT_WORKER_NAME: &str = "dispatch-worker";

/// Infrastructure failures raised by the dispatcher itself. Errors produced
/// by the work item never take this form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("failed to build async runtime: {0}")]
    Runtime(String),

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    #[error("worker thread panicked: {0}")]
    WorkerPanicked(String),
}

/// Which route a work item took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPath {
    /// Fresh runtime on the calling thread
    Direct,
    /// Fresh runtime on a one-shot worker thread
    Worker,
}

/// Runs suspend-capable work items from synchronous code.
///
/// Each worker-path call spawns its own short-lived thread; there is no pool,
/// so throughput is bounded by thread creation cost.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    environment: RuntimeEnvironment,
    worker_name: String,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(RuntimeEnvironment::current())
    }
}

impl Dispatcher {
    /// Create a dispatcher tagged with the given environment hint
    pub fn new(environment: RuntimeEnvironment) -> Self {
        Self {
            environment,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }

    /// Set the name given to worker threads
    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Drive `work` to completion and return its result.
    ///
    /// The work item's own error is returned untouched on either path;
    /// `DispatchError` reaches the caller only through `E::from`.
    pub fn run<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>>,
        T: Send,
        E: From<DispatchError> + Send,
    {
        self.run_traced(work).map(|(value, _)| value)
    }

    /// Same as [`Dispatcher::run`], also reporting the path taken
    pub fn run_traced<F, Fut, T, E>(&self, work: F) -> Result<(T, DispatchPath), E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>>,
        T: Send,
        E: From<DispatchError> + Send,
    {
        let context = ExecutionContext::detect();
        match context {
            ExecutionContext::Absent => {
                log::trace!("dispatching work item directly");
                run_on_fresh_runtime(work).map(|value| (value, DispatchPath::Direct))
            }
            ExecutionContext::Active(SchedulerKind::MultiThread) => {
                tracing::debug!(
                    environment = self.environment.label(),
                    "runtime active on caller thread, moving work item to worker"
                );
                // Let the caller's runtime hand its other tasks to sibling
                // workers while this thread waits on the join.
                tokio::task::block_in_place(|| self.run_on_worker(work))
                    .map(|value| (value, DispatchPath::Worker))
            }
            ExecutionContext::Active(SchedulerKind::CurrentThread) | ExecutionContext::Unavailable => {
                tracing::debug!(
                    environment = self.environment.label(),
                    context = ?context,
                    "caller thread cannot host a runtime, moving work item to worker"
                );
                self.run_on_worker(work).map(|value| (value, DispatchPath::Worker))
            }
        }
    }

    fn run_on_worker<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>>,
        T: Send,
        E: From<DispatchError> + Send,
    {
        thread::scope(|scope| {
            let handle = thread::Builder::new()
                .name(self.worker_name.clone())
                .spawn_scoped(scope, move || run_on_fresh_runtime(work))
                .map_err(|e| {
                    log::error!("Failed to spawn dispatch worker: {}", e);
                    E::from(DispatchError::WorkerSpawn(e.to_string()))
                })?;

            match handle.join() {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    log::error!("Dispatch worker panicked: {}", message);
                    Err(E::from(DispatchError::WorkerPanicked(message)))
                }
            }
        })
    }
}

/// Dispatch with a default [`Dispatcher`]
pub fn dispatch<F, Fut, T, E>(work: F) -> Result<T, E>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T, E>>,
    T: Send,
    E: From<DispatchError> + Send,
{
    Dispatcher::default().run(work)
}

/// Build a current-thread runtime, block on the work item, tear it down.
/// Must only be called on a thread with no active runtime.
fn run_on_fresh_runtime<F, Fut, T, E>(work: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<DispatchError>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| E::from(DispatchError::Runtime(e.to_string())))?;
    runtime.block_on(work())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum RemoteError {
        NetworkTimeout(String),
        Dispatch(DispatchError),
    }

    impl From<DispatchError> for RemoteError {
        fn from(err: DispatchError) -> Self {
            RemoteError::Dispatch(err)
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(RuntimeEnvironment::default())
    }

    #[test]
    fn test_direct_path_returns_value() {
        let (value, path) = dispatcher()
            .run_traced(|| async { Ok::<_, RemoteError>(42) })
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(path, DispatchPath::Direct);
    }

    #[test]
    fn test_direct_path_allows_multiple_suspensions() {
        let value = dispatcher()
            .run(|| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                tokio::task::yield_now().await;
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, RemoteError>("done")
            })
            .unwrap();
        assert_eq!(value, "done");
    }

    #[test]
    fn test_direct_path_runs_on_calling_thread() {
        let caller = thread::current().id();
        let ran_on = dispatcher()
            .run(|| async { Ok::<_, RemoteError>(thread::current().id()) })
            .unwrap();
        assert_eq!(ran_on, caller);
    }

    #[tokio::test]
    async fn test_worker_path_inside_current_thread_runtime() {
        let (value, path) = dispatcher()
            .run_traced(|| async { Ok::<_, RemoteError>("ok".to_string()) })
            .unwrap();
        assert_eq!(value, "ok");
        assert_eq!(path, DispatchPath::Worker);
    }

    #[tokio::test]
    async fn test_worker_path_leaves_caller_tasks_intact() {
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();
        let waiter = tokio::spawn(async move { rx.await.unwrap() + 1 });

        let value = dispatcher()
            .run(|| async { Ok::<_, RemoteError>("ok") })
            .unwrap();
        assert_eq!(value, "ok");

        tx.send(41).unwrap();
        assert_eq!(waiter.await.unwrap(), 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_path_multi_thread_keeps_runtime_progressing() {
        let (tx, rx) = tokio::sync::oneshot::channel::<&'static str>();
        // Completed by a task on the caller's runtime while the caller blocks
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send("from caller runtime");
        });

        let (value, path) = dispatcher()
            .run_traced(|| async move { rx.await.map_err(|e| RemoteError::NetworkTimeout(e.to_string())) })
            .unwrap();
        assert_eq!(value, "from caller runtime");
        assert_eq!(path, DispatchPath::Worker);
    }

    #[tokio::test]
    async fn test_worker_thread_is_named() {
        let name = dispatcher()
            .with_worker_name("catalog-call")
            .run(|| async { Ok::<_, RemoteError>(thread::current().name().map(String::from)) })
            .unwrap();
        assert_eq!(name.as_deref(), Some("catalog-call"));
    }

    #[test]
    fn test_error_identity_direct() {
        let err = dispatcher()
            .run(|| async { Err::<(), _>(RemoteError::NetworkTimeout("read timed out".into())) })
            .unwrap_err();
        assert_eq!(err, RemoteError::NetworkTimeout("read timed out".into()));
    }

    #[tokio::test]
    async fn test_error_identity_worker() {
        let err = dispatcher()
            .run(|| async { Err::<(), _>(RemoteError::NetworkTimeout("read timed out".into())) })
            .unwrap_err();
        assert_eq!(err, RemoteError::NetworkTimeout("read timed out".into()));
    }

    #[tokio::test]
    async fn test_worker_panic_is_reported() {
        let err = dispatcher()
            .run(|| async {
                if true {
                    panic!("remote client exploded");
                }
                Ok::<(), RemoteError>(())
            })
            .unwrap_err();
        assert_eq!(
            err,
            RemoteError::Dispatch(DispatchError::WorkerPanicked("remote client exploded".into()))
        );
    }

    #[test]
    fn test_work_item_may_borrow_caller_state() {
        let names = vec!["main".to_string(), "samples".to_string()];
        let count = dispatcher()
            .run(|| async { Ok::<_, RemoteError>(names.len()) })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_free_function_dispatch() {
        let value: Result<u8, RemoteError> = dispatch(|| async { Ok(7) });
        assert_eq!(value.unwrap(), 7);
    }

    #[test]
    fn test_concurrent_mixed_paths() {
        let direct = Arc::new(AtomicUsize::new(0));
        let worker = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16u64)
            .map(|i| {
                let direct = direct.clone();
                let worker = worker.clone();
                thread::spawn(move || {
                    let work = move || async move {
                        tokio::time::sleep(Duration::from_millis(i % 4)).await;
                        Ok::<_, RemoteError>(i * 2)
                    };
                    let (value, path) = if i % 2 == 0 {
                        dispatcher().run_traced(work).unwrap()
                    } else {
                        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
                        rt.block_on(async { dispatcher().run_traced(work).unwrap() })
                    };
                    match path {
                        DispatchPath::Direct => direct.fetch_add(1, Ordering::SeqCst),
                        DispatchPath::Worker => worker.fetch_add(1, Ordering::SeqCst),
                    };
                    (i, value)
                })
            })
            .collect();

        for handle in handles {
            let (i, value) = handle.join().unwrap();
            assert_eq!(value, i * 2);
        }
        assert_eq!(direct.load(Ordering::SeqCst), 8);
        assert_eq!(worker.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_panic_message_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }
}
