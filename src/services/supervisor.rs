//! Keeps spawned relay tasks alive and provides a shutdown barrier.
//!
//! A fire-and-forget relay is still a `tokio::spawn`ed future: if nothing
//! holds its `JoinHandle`, the runtime is free to drop it between
//! suspension points (most notably the backoff sleep). `TaskSupervisor` is
//! the explicit task set that prevents that, mirroring the original
//! `knocker.tasks` module's `BACKGROUND_TASKS` set plus a done-callback.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Signals in-flight relays to stop retrying and exit without a callback.
#[derive(Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    /// Resolves as soon as shutdown has been requested.
    pub async fn cancelled(&mut self) {
        let _ = self.0.wait_for(|shutting_down| *shutting_down).await;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

struct RemoveOnFinish {
    id: u64,
    tasks: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
}

impl Drop for RemoveOnFinish {
    fn drop(&mut self) {
        self.tasks.lock().unwrap().remove(&self.id);
    }
}

/// Tracks in-flight background relays so they are reachable until their
/// terminal state is observed.
#[derive(Clone)]
pub struct TaskSupervisor {
    tasks: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
    next_id: Arc<AtomicU64>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    /// A receiver relays can poll/await to learn that shutdown has begun.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal(self.shutdown_rx.clone())
    }

    /// Admits `fut` to the supervised set. It runs to completion on its own
    /// schedule; the supervisor only guarantees it stays reachable until
    /// then.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);
        let guard = RemoveOnFinish { id, tasks: Arc::clone(&tasks) };

        let handle = tokio::spawn(async move {
            let _guard = guard;
            fut.await;
        });

        tasks.lock().unwrap().insert(id, handle);
    }

    /// Current number of supervised (in-flight) tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signals cancellation without waiting for anything to finish.
    /// Handlers use this to stop accepting new work; [`Self::drain`] calls
    /// it too, as the first step of shutdown.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Signals cancellation to all in-flight relays, then awaits completion
    /// up to `deadline`, aborting stragglers past that point.
    pub async fn drain(&self, deadline: Duration) {
        self.request_shutdown();

        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap();
            tasks.drain().map(|(_, handle)| handle).collect()
        };

        let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        if tokio::time::timeout(deadline, wait_joins(handles)).await.is_err() {
            for abort_handle in abort_handles {
                abort_handle.abort();
            }
        }
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_joins(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tokio::time::sleep;

    #[tokio::test]
    async fn spawned_task_is_removed_on_completion() {
        let supervisor = TaskSupervisor::new();
        supervisor.spawn(async {
            sleep(Duration::from_millis(10)).await;
        });
        assert_eq!(supervisor.len(), 1);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(supervisor.len(), 0);
    }

    #[tokio::test]
    async fn drain_waits_for_in_flight_tasks() {
        let supervisor = TaskSupervisor::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        supervisor.spawn(async move {
            sleep(Duration::from_millis(20)).await;
            ran_clone.store(true, Ordering::SeqCst);
        });

        supervisor.drain(Duration::from_secs(1)).await;
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(supervisor.len(), 0);
    }

    #[tokio::test]
    async fn drain_signals_shutdown() {
        let supervisor = TaskSupervisor::new();
        let mut signal = supervisor.shutdown_signal();
        assert!(!signal.is_cancelled());

        let drained = tokio::spawn({
            let supervisor = supervisor.clone();
            async move { supervisor.drain(Duration::from_millis(100)).await }
        });

        signal.cancelled().await;
        assert!(signal.is_cancelled());
        drained.await.unwrap();
    }
}
