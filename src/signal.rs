//! Counting signal between the edge callback and the bridge worker

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Counting semaphore released once per interrupt edge
///
/// `release` never blocks on anything the worker holds for longer than a
/// counter update, so it is safe to call from interrupt callback context.
#[derive(Debug, Default)]
pub struct InterruptSignal {
    permits: Mutex<usize>,
    available: Condvar,
}

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn permits(&self) -> MutexGuard<'_, usize> {
        self.permits.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn release(&self) {
        *self.permits() += 1;
        self.available.notify_one();
    }

    /// Take one permit, waiting at most `timeout`
    ///
    /// Returns `false` if the timeout elapsed first.
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut permits = self.permits();
        while *permits == 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            permits = match self.available.wait_timeout(permits, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        *permits -= 1;
        true
    }

    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Drop all pending permits
    pub fn reset(&self) {
        *self.permits() = 0;
    }

    pub fn pending(&self) -> usize {
        *self.permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counts_releases() {
        let signal = InterruptSignal::new();
        signal.release();
        signal.release();
        assert_eq!(signal.pending(), 2);
        assert!(signal.try_acquire());
        assert!(signal.acquire_timeout(Duration::from_millis(1)));
        assert!(!signal.try_acquire());
    }

    #[test]
    fn test_acquire_times_out() {
        let signal = InterruptSignal::new();
        let start = Instant::now();
        assert!(!signal.acquire_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_release_wakes_waiter() {
        let signal = Arc::new(InterruptSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.acquire_timeout(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(10));
        signal.release();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_reset_discards_permits() {
        let signal = InterruptSignal::new();
        signal.release();
        signal.reset();
        assert_eq!(signal.pending(), 0);
    }
}
