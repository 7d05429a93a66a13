//! Background task queue drained by a small per-application worker pool.
//!
//! Tasks are dequeued in FIFO order, but with more than one worker their
//! completion order is not guaranteed. A failing or panicking task is logged
//! and dropped; its worker moves on to the next task. Workers run until the
//! owning application's liveness flag goes false, at which point any tasks
//! still queued are dropped without running. Dropping them matters: a queued
//! closure usually holds the application it was queued by.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use fxi_api::ShellEvent;
use serde::Deserialize;

use crate::{EventSender, TaskError, lock};

/// Worker pool sizing and polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Upper bound on worker threads per application.
    pub max_workers: usize,
    /// How long a worker waits on the queue before idling.
    pub poll_timeout_ms: u64,
    /// Pause after an empty poll.
    pub idle_sleep_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 2,
            poll_timeout_ms: 1000,
            idle_sleep_ms: 500,
        }
    }
}

impl PoolConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

type Job = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// A deferred invocation with its arguments already captured.
pub struct Task {
    label: String,
    job: Job,
}

impl Task {
    pub fn new<F>(label: impl Into<String>, job: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            label: label.into(),
            job: Box::new(job),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run the task, turning both errors and panics into a `TaskError`.
    pub fn run(self) -> Result<(), TaskError> {
        run_guarded(self.job)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("label", &self.label).finish()
    }
}

/// Run a closure, catching panics so they surface as errors.
pub(crate) fn run_guarded<F>(f: F) -> Result<(), TaskError>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(TaskError::Failed(err)),
        Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Point-in-time counters for a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskStats {
    pub pending: usize,
    pub live_workers: usize,
    pub spawned_workers: usize,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    live: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// FIFO of background work for one application.
pub struct TaskQueue {
    app: String,
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    alive: Arc<AtomicBool>,
    config: PoolConfig,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
    events: EventSender,
}

impl TaskQueue {
    /// Create a queue whose workers live as long as `alive` stays true.
    ///
    /// No thread is started until the first task is enqueued.
    pub fn new(
        app: impl Into<String>,
        alive: Arc<AtomicBool>,
        config: PoolConfig,
        events: EventSender,
    ) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            app: app.into(),
            sender,
            receiver,
            alive,
            config,
            workers: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
            events,
        }
    }

    /// Append a task. Never blocks. Starts another worker if the pool is
    /// below its configured size.
    ///
    /// Once the application is dead the task is dropped unrun.
    pub fn enqueue(&self, task: Task) {
        if !self.is_alive() {
            tracing::debug!(app = %self.app, task = task.label(), "dropping task for dead application");
            return;
        }
        tracing::trace!(app = %self.app, task = task.label(), "enqueue");
        if self.sender.send(task).is_err() {
            // The receiver lives in `self`, so this cannot happen while we exist.
            return;
        }
        // Shutdown may have drained the queue between the check and the send.
        if !self.is_alive() {
            self.discard_pending();
            return;
        }
        self.ensure_worker();
    }

    /// Shorthand for `enqueue(Task::new(label, job))`.
    pub fn spawn<F>(&self, label: impl Into<String>, job: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.enqueue(Task::new(label, job));
    }

    fn ensure_worker(&self) {
        let mut workers = lock(&self.workers);
        if workers.len() >= self.config.max_workers || !self.alive.load(Ordering::Acquire) {
            return;
        }

        let index = workers.len();
        let ctx = WorkerContext {
            app: self.app.clone(),
            receiver: self.receiver.clone(),
            alive: self.alive.clone(),
            config: self.config,
            counters: self.counters.clone(),
            events: self.events.clone(),
        };

        // Counted before the thread starts so the bound holds even while
        // the new worker is still being scheduled.
        self.counters.live.fetch_add(1, Ordering::AcqRel);
        let spawned = thread::Builder::new()
            .name(format!("{}-worker-{}", self.app, index))
            .spawn(move || worker_loop(ctx));

        match spawned {
            Ok(handle) => {
                tracing::debug!(app = %self.app, worker = index, "worker started");
                workers.push(handle);
            }
            Err(e) => {
                self.counters.live.fetch_sub(1, Ordering::AcqRel);
                tracing::error!(app = %self.app, error = %e, "failed to start worker");
            }
        }
    }

    /// Current counters.
    pub fn stats(&self) -> TaskStats {
        TaskStats {
            pending: self.receiver.len(),
            live_workers: self.counters.live.load(Ordering::Acquire),
            spawned_workers: lock(&self.workers).len(),
            completed: self.counters.completed.load(Ordering::Acquire),
            failed: self.counters.failed.load(Ordering::Acquire),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Whether the owning application is still alive.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Drop every queued task without running it. Returns how many went.
    pub fn discard_pending(&self) -> usize {
        let dropped = drain(&self.receiver);
        if dropped > 0 {
            tracing::debug!(app = %self.app, dropped, "discarded queued tasks");
        }
        dropped
    }

    /// Flip the liveness flag and wait for every worker to finish its current
    /// task and exit. Queued tasks are dropped unrun.
    ///
    /// Blocks for as long as the slowest in-flight task takes.
    pub fn shutdown_and_join(&self) {
        self.alive.store(false, Ordering::Release);
        self.discard_pending();
        let handles: Vec<_> = lock(&self.workers).drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                tracing::warn!(app = %self.app, "worker thread panicked");
            }
        }
    }
}

fn drain(receiver: &Receiver<Task>) -> usize {
    let mut dropped = 0;
    while receiver.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

struct WorkerContext {
    app: String,
    receiver: Receiver<Task>,
    alive: Arc<AtomicBool>,
    config: PoolConfig,
    counters: Arc<Counters>,
    events: EventSender,
}

/// Decrements the live-worker count however the worker exits.
struct LiveGuard(Arc<Counters>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::AcqRel);
    }
}

fn worker_loop(ctx: WorkerContext) {
    let _live = LiveGuard(ctx.counters.clone());

    while ctx.alive.load(Ordering::Acquire) {
        let task = match ctx.receiver.recv_timeout(ctx.config.poll_timeout()) {
            Ok(task) => task,
            Err(RecvTimeoutError::Timeout) => {
                thread::sleep(ctx.config.idle_sleep());
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        // The application may have died while we were waiting.
        if !ctx.alive.load(Ordering::Acquire) {
            tracing::debug!(app = %ctx.app, task = task.label(), "abandoning task");
            drop(task);
            break;
        }

        let label = task.label.clone();
        match task.run() {
            Ok(()) => {
                ctx.counters.completed.fetch_add(1, Ordering::AcqRel);
            }
            Err(err) => {
                ctx.counters.failed.fetch_add(1, Ordering::AcqRel);
                tracing::warn!(
                    app = %ctx.app,
                    task = %label,
                    kind = err.kind(),
                    error = %err,
                    "background task dropped"
                );
                let _ = ctx.events.send(ShellEvent::TaskFailed {
                    app: ctx.app.clone(),
                    task: label,
                    error: err.to_string(),
                });
            }
        }
    }

    // Whoever flipped the flag may not have drained the queue.
    let dropped = drain(&ctx.receiver);
    tracing::debug!(app = %ctx.app, dropped, "worker exiting");
}

#[cfg(test)]
pub(crate) fn fast_config(max_workers: usize) -> PoolConfig {
    PoolConfig {
        max_workers,
        poll_timeout_ms: 20,
        idle_sleep_ms: 5,
    }
}

#[cfg(test)]
pub(crate) fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    fn queue(max_workers: usize) -> (TaskQueue, Arc<AtomicBool>) {
        let alive = Arc::new(AtomicBool::new(true));
        let (events, _rx) = crate::event_channel();
        let q = TaskQueue::new("test", alive.clone(), fast_config(max_workers), events);
        (q, alive)
    }

    #[test]
    fn test_no_worker_before_first_enqueue() {
        let (q, _alive) = queue(2);
        assert_eq!(q.stats().spawned_workers, 0);
        assert_eq!(q.stats().live_workers, 0);
    }

    #[test]
    fn test_pool_never_exceeds_max_workers() {
        let (q, _alive) = queue(2);
        let gate = Arc::new(Barrier::new(3));
        for i in 0..50 {
            let gate = gate.clone();
            q.spawn(format!("t{i}"), move || {
                if i < 2 {
                    gate.wait();
                }
                Ok(())
            });
            let stats = q.stats();
            assert!(stats.spawned_workers <= 2);
            assert!(stats.live_workers <= 2);
        }
        gate.wait();
        assert!(wait_until(Duration::from_secs(5), || q.stats().completed == 50));
        assert_eq!(q.stats().spawned_workers, 2);
        q.shutdown_and_join();
    }

    #[test]
    fn test_failing_task_does_not_stop_later_tasks() {
        let (q, _alive) = queue(2);
        let ran = Arc::new(Mutex::new(Vec::new()));
        for i in 1..=5 {
            let ran = ran.clone();
            q.spawn(format!("T{i}"), move || {
                if i == 3 {
                    anyhow::bail!("T3 exploded");
                }
                lock(&ran).push(i);
                Ok(())
            });
        }

        assert!(wait_until(Duration::from_secs(5), || {
            let s = q.stats();
            s.completed + s.failed == 5
        }));
        let mut ran = lock(&ran).clone();
        ran.sort();
        assert_eq!(ran, vec![1, 2, 4, 5]);
        let stats = q.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.live_workers, stats.spawned_workers);
        q.shutdown_and_join();
    }

    #[test]
    fn test_panicking_task_is_isolated() {
        let (q, _alive) = queue(1);
        let hits = Arc::new(AtomicUsize::new(0));
        q.spawn("boom", || panic!("task panic"));
        for _ in 0..3 {
            let hits = hits.clone();
            q.spawn("ok", move || {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        assert!(wait_until(Duration::from_secs(5), || hits.load(Ordering::SeqCst) == 3));
        assert_eq!(q.stats().failed, 1);
        assert_eq!(q.stats().live_workers, 1);
        q.shutdown_and_join();
    }

    #[test]
    fn test_single_worker_preserves_fifo() {
        let (q, _alive) = queue(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..20 {
            let order = order.clone();
            q.spawn("ordered", move || {
                lock(&order).push(i);
                Ok(())
            });
        }
        assert!(wait_until(Duration::from_secs(5), || q.stats().completed == 20));
        assert_eq!(*lock(&order), (0..20).collect::<Vec<_>>());
        q.shutdown_and_join();
    }

    #[test]
    fn test_dead_app_abandons_queued_tasks() {
        let (q, alive) = queue(1);
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        let later = Arc::new(AtomicUsize::new(0));

        q.spawn("blocker", move || {
            started_tx.send(()).ok();
            release_rx.recv().ok();
            Ok(())
        });
        for _ in 0..3 {
            let later = later.clone();
            q.spawn("never", move || {
                later.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        started_rx.recv().unwrap();
        alive.store(false, Ordering::Release);
        release_tx.send(()).unwrap();

        assert!(wait_until(Duration::from_secs(5), || q.stats().live_workers == 0));
        assert_eq!(later.load(Ordering::SeqCst), 0);
        assert_eq!(q.stats().completed, 1);
    }

    #[test]
    fn test_no_new_workers_after_shutdown() {
        let (q, _alive) = queue(2);
        q.shutdown_and_join();
        q.spawn("late", || Ok(()));
        assert_eq!(q.stats().spawned_workers, 0);
        assert_eq!(q.stats().pending, 0);
    }

    #[test]
    fn test_dead_app_drops_queued_closures() {
        let (q, alive) = queue(1);
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        q.spawn("blocker", move || {
            started_tx.send(()).ok();
            release_rx.recv().ok();
            Ok(())
        });
        let captured = Arc::new(());
        let weak = Arc::downgrade(&captured);
        q.spawn("holder", move || {
            let _held = &captured;
            Ok(())
        });

        started_rx.recv().unwrap();
        alive.store(false, Ordering::Release);
        release_tx.send(()).unwrap();

        // The worker drains on its way out even though nobody called shutdown.
        assert!(wait_until(Duration::from_secs(5), || q.stats().live_workers == 0));
        assert!(weak.upgrade().is_none());
        assert_eq!(q.stats().pending, 0);
        assert_eq!(q.stats().completed, 1);
    }

    #[test]
    fn test_discard_pending_counts_dropped_tasks() {
        let (q, _alive) = queue(1);
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        q.spawn("blocker", move || {
            started_tx.send(()).ok();
            release_rx.recv().ok();
            Ok(())
        });
        started_rx.recv().unwrap();
        for _ in 0..4 {
            q.spawn("queued", || Ok(()));
        }

        assert_eq!(q.discard_pending(), 4);
        assert_eq!(q.stats().pending, 0);
        release_tx.send(()).unwrap();
        q.shutdown_and_join();
        assert_eq!(q.stats().completed, 1);
    }

    #[test]
    fn test_task_failure_is_published() {
        let alive = Arc::new(AtomicBool::new(true));
        let (events, mut rx) = crate::event_channel();
        let q = TaskQueue::new("pub", alive, fast_config(1), events);
        q.spawn("bad", || anyhow::bail!("nope"));
        assert!(wait_until(Duration::from_secs(5), || q.stats().failed == 1));
        match rx.try_recv() {
            Ok(ShellEvent::TaskFailed { app, task, error }) => {
                assert_eq!(app, "pub");
                assert_eq!(task, "bad");
                assert_eq!(error, "nope");
            }
            other => panic!("expected TaskFailed, got {:?}", other),
        }
        q.shutdown_and_join();
    }

    #[test]
    fn test_pool_config_defaults_and_partial_json() {
        let config: PoolConfig = serde_json::from_str(r#"{"max_workers": 4}"#).unwrap();
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.poll_timeout(), Duration::from_secs(1));
        assert_eq!(PoolConfig::default().max_workers, 2);
    }
}
