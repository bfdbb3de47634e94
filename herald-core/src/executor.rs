//! Executors for detached delivery tasks
//!
//! `send()` never waits on the network. It hands a [`Task`] to an
//! [`Executor`] and returns. Two executors are provided:
//!
//! - [`SingleWorkerExecutor`]: one dedicated thread, tasks run one at a time
//!   in submission order. This is the default.
//! - [`TokioExecutor`]: spawns onto an existing tokio runtime. Tasks run
//!   concurrently and may complete in any order.
//!
//! A panic inside a task is caught and logged; it never takes the worker down.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::thread::JoinHandle;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// A detached unit of work
pub type Task = BoxFuture<'static, ()>;

/// Runs tasks off the caller's thread
pub trait Executor: Send + Sync {
    /// Queue `task` for execution
    ///
    /// Fails with [`Error::Rejected`] when the executor no longer accepts work.
    fn execute(&self, task: Task) -> Result<()>;
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_reason(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn run_contained(task: Task) {
    if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
        tracing::error!(reason = %panic_reason(panic.as_ref()), "Herald task panicked");
    }
}

/// Executor backed by a single dedicated thread
///
/// The thread drives a current-thread tokio runtime, so tasks may use tokio
/// IO and timers.
pub struct SingleWorkerExecutor {
    sender: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SingleWorkerExecutor {
    /// Start the worker thread
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();

        let worker = std::thread::Builder::new()
            .name("herald-worker".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    while let Some(task) = receiver.recv().await {
                        run_contained(task).await;
                    }
                });
                tracing::debug!("Herald worker stopped");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stop accepting tasks, let queued ones finish, then join the worker
    ///
    /// In-flight and already queued tasks still run. Calling this from inside
    /// a task only closes the queue.
    pub fn shutdown(&self) {
        self.sender.lock().take();

        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        if worker.thread().id() == std::thread::current().id() {
            return;
        }

        if worker.join().is_err() {
            tracing::error!("Herald worker thread panicked");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl Executor for SingleWorkerExecutor {
    fn execute(&self, task: Task) -> Result<()> {
        match self.sender.lock().as_ref() {
            Some(sender) => sender
                .send(task)
                .map_err(|_| Error::Rejected("worker has stopped".to_string())),
            None => Err(Error::Rejected("executor has been shut down".to_string())),
        }
    }
}

impl Drop for SingleWorkerExecutor {
    fn drop(&mut self) {
        // closing the queue lets the worker drain and exit on its own
        self.sender.get_mut().take();
    }
}

impl std::fmt::Debug for SingleWorkerExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleWorkerExecutor")
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

/// Executor that spawns onto an existing tokio runtime
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on
    pub fn current() -> Result<Self> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::Config(format!("no tokio runtime available: {}", e)))
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, task: Task) -> Result<()> {
        self.handle.spawn(run_contained(task));
        Ok(())
    }
}
