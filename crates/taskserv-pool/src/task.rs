//! Tasks and their result handles
//!
//! A [`Task`] is the type-erased unit of work the queue owns; a
//! [`TaskHandle`] is the submitter's side of it. Every outcome reaches the
//! handle: the return value on success, [`TaskError::Panicked`] when the
//! body unwinds, [`TaskError::Cancelled`] when the task is discarded
//! without running (queue drain or pool teardown). Nothing is swallowed
//! silently at the worker boundary.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};

/// Why a task produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Discarded before execution (drain or teardown).
    Cancelled,

    /// The task body panicked; the worker survived.
    Panicked(String),
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskError::Cancelled => write!(f, "task cancelled before execution"),
            TaskError::Panicked(msg) => write!(f, "task panicked: {}", msg),
        }
    }
}

impl std::error::Error for TaskError {}

/// Result of one executed (or discarded) task.
pub type TaskResult<T> = Result<T, TaskError>;

/// One-shot completion slot shared by a task and its handle.
struct Completion<T> {
    slot: Mutex<Option<TaskResult<T>>>,
    done: Condvar,
}

impl<T> Completion<T> {
    /// First writer wins; later fills are ignored.
    fn fill(&self, value: TaskResult<T>) {
        let mut slot = self.slot.lock().unwrap();
        if slot.is_none() {
            *slot = Some(value);
            self.done.notify_all();
        }
    }
}

/// Submitter's view of a task in flight.
pub struct TaskHandle<T> {
    completion: Arc<Completion<T>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes (or is discarded) and take the result.
    pub fn wait(self) -> TaskResult<T> {
        let mut slot = self.completion.slot.lock().unwrap();
        loop {
            if let Some(result) = slot.take() {
                return result;
            }
            slot = self.completion.done.wait(slot).unwrap();
        }
    }

    /// Take the result if it is already available.
    pub fn try_wait(&self) -> Option<TaskResult<T>> {
        self.completion.slot.lock().unwrap().take()
    }

    /// Whether a result is waiting to be taken.
    pub fn is_finished(&self) -> bool {
        self.completion.slot.lock().unwrap().is_some()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Type-erased queued unit of work.
///
/// Dropping an unexecuted task resolves its handle to `Cancelled`.
pub(crate) struct Task {
    job: Option<Box<dyn FnOnce() + Send + 'static>>,
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Task {
    pub(crate) fn new<F, T>(f: F) -> (Task, TaskHandle<T>)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let completion = Arc::new(Completion {
            slot: Mutex::new(None),
            done: Condvar::new(),
        });

        let on_done = Arc::clone(&completion);
        let job = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(f));
            on_done.fill(result.map_err(|payload| TaskError::Panicked(panic_message(&*payload))));
        });

        let on_cancel = Arc::clone(&completion);
        let cancel = Box::new(move || on_cancel.fill(Err(TaskError::Cancelled)));

        (
            Task {
                job: Some(job),
                cancel: Some(cancel),
            },
            TaskHandle { completion },
        )
    }

    /// Execute the job. Never unwinds; panics land in the handle.
    pub(crate) fn run(mut self) {
        // Executing now - drop must not resolve the handle to Cancelled.
        self.cancel.take();
        if let Some(job) = self.job.take() {
            job();
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_resolves_handle() {
        let (task, handle) = Task::new(|| 21 * 2);
        assert!(!handle.is_finished());
        task.run();
        assert!(handle.is_finished());
        assert_eq!(handle.wait(), Ok(42));
    }

    #[test]
    fn test_drop_without_run_cancels() {
        let (task, handle) = Task::new(|| 1);
        drop(task);
        assert_eq!(handle.wait(), Err(TaskError::Cancelled));
    }

    #[test]
    fn test_panic_is_captured() {
        let (task, handle) = Task::new(|| -> u32 { panic!("kaboom") });
        task.run(); // must not unwind
        match handle.wait() {
            Err(TaskError::Panicked(msg)) => assert!(msg.contains("kaboom")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_try_wait_takes_once() {
        let (task, handle) = Task::new(|| 7);
        assert!(handle.try_wait().is_none());
        task.run();
        assert_eq!(handle.try_wait(), Some(Ok(7)));
        assert!(handle.try_wait().is_none());
    }

    #[test]
    fn test_wait_blocks_across_threads() {
        let (task, handle) = Task::new(|| "ok");
        let runner = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            task.run();
        });
        assert_eq!(handle.wait(), Ok("ok"));
        runner.join().unwrap();
    }
}
