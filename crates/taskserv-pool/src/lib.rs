//! # taskserv-pool - bounded worker thread pool
//!
//! Long-lived OS worker threads pulling tasks from one FIFO queue.
//!
//! **Contract:**
//! - `submit()` never blocks the caller. If the pool is shutting down or
//!   the queue is at its configured limit it returns `None` - explicit
//!   backpressure, the caller decides to retry or drop.
//! - Tasks execute outside every lock. A panicking task body is caught at
//!   the worker boundary and reported only through its [`TaskHandle`];
//!   the worker thread survives.
//! - `wait()` observes an empty queue, not finished in-flight tasks.
//! - Shrinking posts removal credits: each credit makes one idle worker
//!   exit instead of dequeuing. Finished threads are joined and pruned on
//!   the next `remove_workers`/`resize` call, so handles never leak.
//! - Teardown joins every worker; tasks still queued resolve their
//!   handles to [`TaskError::Cancelled`] without running.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use taskserv_core::ttrace;

mod task;

pub use task::{TaskError, TaskHandle, TaskResult};
use task::Task;

/// Admission bound applied when none is configured.
pub const DEFAULT_QUEUE_LIMIT: usize = usize::MAX;

/// Queue and lifecycle state, guarded by one mutex.
struct PoolState {
    queue: VecDeque<Task>,
    queue_limit: usize,
    shutdown: bool,
    /// Outstanding graceful-exit credits; a waking worker consumes one
    /// and returns instead of dequeuing.
    remove_credits: usize,
}

struct PoolInner {
    state: Mutex<PoolState>,
    /// Signalled on: task queued, shutdown, removal credit posted.
    work_available: Condvar,
    /// Signalled when the queue is observed empty (unblocks `wait()`).
    queue_idle: Condvar,
}

/// Fixed-thread worker pool with a bounded FIFO task queue.
pub struct ThreadPool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_worker_id: AtomicUsize,
}

impl ThreadPool {
    /// Spawn a pool with `workers` threads and an unbounded queue.
    pub fn new(workers: usize) -> Self {
        let pool = Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    queue_limit: DEFAULT_QUEUE_LIMIT,
                    shutdown: false,
                    remove_credits: 0,
                }),
                work_available: Condvar::new(),
                queue_idle: Condvar::new(),
            }),
            workers: Mutex::new(Vec::new()),
            next_worker_id: AtomicUsize::new(0),
        };
        pool.add_workers(workers);
        pool
    }

    /// Queue a unit of work.
    ///
    /// Returns `None` when the pool is shutting down or the queue is at
    /// its admission bound; the work is discarded and never runs.
    pub fn submit<F, T>(&self, f: F) -> Option<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (task, handle) = Task::new(f);
        let rejected;
        {
            let mut state = self.inner.state.lock().unwrap();
            if state.shutdown || state.queue.len() >= state.queue_limit {
                rejected = Some(task);
            } else {
                state.queue.push_back(task);
                rejected = None;
            }
        }
        match rejected {
            Some(task) => {
                // Dropped outside the lock; the unused handle follows.
                drop(task);
                None
            }
            None => {
                self.inner.work_available.notify_one();
                Some(handle)
            }
        }
    }

    /// Spawn `count` additional workers immediately.
    pub fn add_workers(&self, count: usize) {
        let mut workers = self.workers.lock().unwrap();
        for _ in 0..count {
            let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
            let inner = Arc::clone(&self.inner);
            let handle = thread::Builder::new()
                .name(format!("pool-worker-{}", id))
                .spawn(move || worker_loop(inner, id))
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }
    }

    /// Ask `count` workers to exit gracefully, then join and prune every
    /// worker thread that has already finished.
    ///
    /// A busy worker keeps running its current task and consumes its
    /// credit when it next looks at the queue; its handle is pruned by a
    /// later call. `remove_workers(0)` is a pure pruning pass.
    pub fn remove_workers(&self, count: usize) {
        let mut workers = self.workers.lock().unwrap();
        let count = count.min(workers.len());
        if count > 0 {
            {
                let mut state = self.inner.state.lock().unwrap();
                state.remove_credits += count;
            }
            for _ in 0..count {
                self.inner.work_available.notify_one();
            }
        }

        let mut live = Vec::with_capacity(workers.len());
        for handle in workers.drain(..) {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                live.push(handle);
            }
        }
        *workers = live;
    }

    /// Grow (`delta > 0`) or shrink (`delta < 0`) the worker set.
    pub fn resize(&self, delta: isize) {
        if delta >= 0 {
            self.add_workers(delta as usize);
        } else {
            self.remove_workers(delta.unsigned_abs());
        }
    }

    /// Change the admission bound for future submissions.
    ///
    /// Already-queued tasks are not evicted.
    pub fn set_queue_limit(&self, limit: usize) {
        self.inner.state.lock().unwrap().queue_limit = limit;
    }

    /// Number of live worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.lock().unwrap().len()
    }

    /// Number of tasks waiting in the queue.
    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().unwrap().queue.len()
    }

    /// Block until the queue is observed empty.
    ///
    /// In-flight tasks may still be executing when this returns.
    pub fn wait(&self) {
        let mut state = self.inner.state.lock().unwrap();
        while !state.queue.is_empty() {
            state = self.inner.queue_idle.wait(state).unwrap();
        }
    }

    /// Discard every not-yet-started task.
    ///
    /// Their handles resolve to [`TaskError::Cancelled`]; tasks already
    /// claimed by a worker are unaffected.
    pub fn drain(&self) {
        let discarded = {
            let mut state = self.inner.state.lock().unwrap();
            std::mem::take(&mut state.queue)
        };
        // Cancel callbacks run outside the lock.
        drop(discarded);
        self.inner.queue_idle.notify_all();
    }

    /// Begin shutdown: reject new submissions, wake every worker.
    ///
    /// Queued tasks are discarded as cancelled. Does not join; `Drop`
    /// performs the joins.
    pub fn shutdown(&self) {
        let discarded = {
            let mut state = self.inner.state.lock().unwrap();
            state.shutdown = true;
            std::mem::take(&mut state.queue)
        };
        drop(discarded);
        self.inner.work_available.notify_all();
        self.inner.queue_idle.notify_all();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for handle in workers {
            let _ = handle.join();
        }
    }
}

/// Worker thread body: wait for work, a removal credit, or shutdown.
fn worker_loop(inner: Arc<PoolInner>, id: usize) {
    loop {
        let task = {
            let mut state = inner.state.lock().unwrap();
            loop {
                if state.shutdown {
                    ttrace!("pool-worker-{} exiting: shutdown", id);
                    return;
                }
                if state.remove_credits > 0 {
                    state.remove_credits -= 1;
                    ttrace!("pool-worker-{} exiting: removal credit", id);
                    return;
                }
                if let Some(task) = state.queue.pop_front() {
                    if state.queue.is_empty() {
                        inner.queue_idle.notify_all();
                    }
                    break task;
                }
                state = inner.work_available.wait(state).unwrap();
            }
        };
        // Outside the lock. Panics are captured into the task's handle.
        task.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    /// Park `n` workers on a blocking task; returns one release sender
    /// per parked worker plus a receiver confirming they all started.
    fn park_workers(
        pool: &ThreadPool,
        n: usize,
    ) -> (Vec<mpsc::Sender<()>>, Vec<TaskHandle<()>>) {
        let (started_tx, started_rx) = mpsc::channel();
        let mut releases = Vec::new();
        let mut handles = Vec::new();
        for _ in 0..n {
            let (release_tx, release_rx) = mpsc::channel::<()>();
            let started = started_tx.clone();
            let handle = pool
                .submit(move || {
                    started.send(()).unwrap();
                    let _ = release_rx.recv();
                })
                .expect("park task rejected");
            releases.push(release_tx);
            handles.push(handle);
        }
        for _ in 0..n {
            started_rx
                .recv_timeout(Duration::from_secs(5))
                .expect("worker did not pick up park task");
        }
        (releases, handles)
    }

    #[test]
    fn test_worker_count_matches_construction() {
        let pool = ThreadPool::new(4);
        assert_eq!(pool.worker_count(), 4);
    }

    #[test]
    fn test_submit_returns_value_through_handle() {
        let pool = ThreadPool::new(2);
        let handle = pool.submit(|| 21 * 2).unwrap();
        assert_eq!(handle.wait(), Ok(42));
    }

    #[test]
    fn test_fifo_order_single_worker() {
        let pool = ThreadPool::new(1);
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..8 {
            let log = Arc::clone(&log);
            handles.push(pool.submit(move || log.lock().unwrap().push(i)).unwrap());
        }
        for handle in handles {
            handle.wait().unwrap();
        }
        assert_eq!(*log.lock().unwrap(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_queue_limit_rejects_excess() {
        let pool = ThreadPool::new(1);
        let (releases, parked) = park_workers(&pool, 1);

        pool.set_queue_limit(1);
        let admitted = pool.submit(|| ()).expect("first queued task admitted");
        assert!(pool.submit(|| ()).is_none(), "over-limit submit must reject");
        assert_eq!(pool.queue_len(), 1);

        releases[0].send(()).unwrap();
        admitted.wait().unwrap();
        for handle in parked {
            handle.wait().unwrap();
        }
    }

    #[test]
    fn test_lowering_queue_limit_keeps_queued_tasks() {
        let pool = ThreadPool::new(1);
        let (releases, parked) = park_workers(&pool, 1);

        let mut queued = Vec::new();
        for i in 0..3 {
            queued.push(pool.submit(move || i).unwrap());
        }
        assert_eq!(pool.queue_len(), 3);

        // The new bound gates admissions only; nothing is evicted.
        pool.set_queue_limit(1);
        assert_eq!(pool.queue_len(), 3);
        assert!(pool.submit(|| 0).is_none(), "over-limit submit must reject");

        releases[0].send(()).unwrap();
        for (i, handle) in queued.into_iter().enumerate() {
            assert_eq!(handle.wait(), Ok(i as i32));
        }
        for handle in parked {
            handle.wait().unwrap();
        }
    }

    #[test]
    fn test_drain_discards_and_cancels() {
        let pool = ThreadPool::new(1);
        let (releases, parked) = park_workers(&pool, 1);

        let ran = Arc::new(AtomicUsize::new(0));
        let mut queued = Vec::new();
        for _ in 0..3 {
            let ran = Arc::clone(&ran);
            queued.push(
                pool.submit(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap(),
            );
        }
        assert_eq!(pool.queue_len(), 3);

        pool.drain();
        assert_eq!(pool.queue_len(), 0);
        for handle in queued {
            assert_eq!(handle.wait(), Err(TaskError::Cancelled));
        }

        releases[0].send(()).unwrap();
        for handle in parked {
            handle.wait().unwrap();
        }
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_wait_unblocks_when_queue_empties() {
        let pool = ThreadPool::new(2);
        for _ in 0..16 {
            pool.submit(|| std::thread::sleep(Duration::from_millis(1)))
                .unwrap();
        }
        pool.wait();
        assert_eq!(pool.queue_len(), 0);
    }

    #[test]
    fn test_panic_does_not_kill_worker() {
        let pool = ThreadPool::new(1);
        let boom = pool.submit(|| -> () { panic!("task blew up") }).unwrap();
        match boom.wait() {
            Err(TaskError::Panicked(msg)) => assert!(msg.contains("blew up")),
            other => panic!("unexpected: {:?}", other),
        }
        // Same (sole) worker must still serve tasks.
        assert_eq!(pool.submit(|| 5).unwrap().wait(), Ok(5));
        assert_eq!(pool.worker_count(), 1);
    }

    #[test]
    fn test_remove_workers_prunes_handles() {
        let pool = ThreadPool::new(4);
        pool.remove_workers(2);
        // Idle workers consume their credits quickly; prune until done.
        for _ in 0..200 {
            pool.remove_workers(0);
            if pool.worker_count() == 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(pool.worker_count(), 2);
        // The survivors still execute work.
        assert_eq!(pool.submit(|| 9).unwrap().wait(), Ok(9));
    }

    #[test]
    fn test_add_workers_grows_pool() {
        let pool = ThreadPool::new(1);
        pool.resize(3);
        assert_eq!(pool.worker_count(), 4);
    }

    #[test]
    fn test_shutdown_rejects_and_cancels() {
        let pool = ThreadPool::new(1);
        let (releases, parked) = park_workers(&pool, 1);
        let queued = pool.submit(|| ()).unwrap();

        pool.shutdown();
        assert!(pool.submit(|| ()).is_none(), "submit after shutdown");
        assert_eq!(queued.wait(), Err(TaskError::Cancelled));

        releases[0].send(()).unwrap();
        for handle in parked {
            handle.wait().unwrap();
        }
    }

    #[test]
    fn test_teardown_cancels_queued_tasks() {
        let pool = ThreadPool::new(1);
        let (releases, _parked) = park_workers(&pool, 1);
        let queued = pool.submit(|| ()).unwrap();

        // Unblock the parked worker shortly so Drop's joins complete.
        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            let _ = releases[0].send(());
        });
        drop(pool);
        assert_eq!(queued.wait(), Err(TaskError::Cancelled));
        releaser.join().unwrap();
    }
}
