//! Scope guard for exit-path cleanup
//!
//! Wraps a cleanup closure that runs when the guard is dropped - on normal
//! return, early `?` return, or unwind. Call [`ScopeGuard::defuse`] once
//! the guarded operation has committed and the cleanup is no longer wanted.
//!
//! # Usage
//!
//! ```ignore
//! let guard = ScopeGuard::new(|| registry.remove(fd));
//! do_risky_setup()?;   // cleanup runs if this bails
//! guard.defuse();      // committed - keep the registration
//! ```

/// Runs its closure on drop unless defused.
pub struct ScopeGuard<F: FnOnce()> {
    cleanup: Option<F>,
}

impl<F: FnOnce()> ScopeGuard<F> {
    /// Arm a guard with the given cleanup closure.
    pub fn new(cleanup: F) -> Self {
        Self {
            cleanup: Some(cleanup),
        }
    }

    /// Disarm the guard; the cleanup closure is dropped without running.
    pub fn defuse(mut self) {
        self.cleanup = None;
    }

    /// Run the cleanup now instead of at scope exit.
    pub fn fire(mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl<F: FnOnce()> Drop for ScopeGuard<F> {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_runs_on_drop() {
        let fired = Cell::new(false);
        {
            let _g = ScopeGuard::new(|| fired.set(true));
        }
        assert!(fired.get());
    }

    #[test]
    fn test_defused_guard_is_silent() {
        let fired = Cell::new(false);
        {
            let g = ScopeGuard::new(|| fired.set(true));
            g.defuse();
        }
        assert!(!fired.get());
    }

    #[test]
    fn test_fire_is_early_and_once() {
        let count = Cell::new(0);
        {
            let g = ScopeGuard::new(|| count.set(count.get() + 1));
            g.fire();
            assert_eq!(count.get(), 1);
        }
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_runs_on_unwind() {
        let fired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let fired2 = fired.clone();
        let result = std::panic::catch_unwind(move || {
            let _g = ScopeGuard::new(|| {
                fired2.store(true, std::sync::atomic::Ordering::SeqCst)
            });
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
    }
}
