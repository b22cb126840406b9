//! Counting semaphore with bounded waits and close
//!
//! Built on `parking_lot`'s `Mutex` + `Condvar`. Closing wakes every waiter;
//! permits released before the close can still be taken, after which acquire
//! fails. That lets a consumer drain what a finished producer left behind
//! while a failed worker still releases its counterpart.

use crate::core::ChannelError;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

struct State {
    permits: usize,
    closed: bool,
}

/// Counting semaphore
pub struct Semaphore {
    state: Mutex<State>,
    available: Condvar,
}

impl Semaphore {
    /// Create a semaphore holding `permits`
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(State { permits, closed: false }),
            available: Condvar::new(),
        }
    }

    /// Take one permit, blocking up to `timeout` for it to appear.
    ///
    /// Fails with [`ChannelError::Closed`] when the semaphore is closed and
    /// no permit is left.
    pub fn acquire(&self, timeout: Duration) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        if state.permits > 0 {
            state.permits -= 1;
            return Ok(());
        }
        if state.closed {
            return Err(ChannelError::Closed);
        }

        // A timeout too large to represent as an instant never expires
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let timed_out = match deadline {
                Some(deadline) => self.available.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.available.wait(&mut state);
                    false
                }
            };
            if state.permits > 0 {
                state.permits -= 1;
                return Ok(());
            }
            if state.closed {
                return Err(ChannelError::Closed);
            }
            if timed_out {
                return Err(ChannelError::TimedOut(timeout));
            }
        }
    }

    /// Return one permit and wake a waiter
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.permits += 1;
        drop(state);
        self.available.notify_one();
    }

    /// Close the semaphore and wake every waiter
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Permits currently available
    pub fn available(&self) -> usize {
        self.state.lock().permits
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn permits_are_conserved() {
        let sem = Semaphore::new(2);
        sem.acquire(WAIT).unwrap();
        sem.acquire(WAIT).unwrap();
        assert_eq!(sem.available(), 0);
        sem.release();
        assert_eq!(sem.available(), 1);
        sem.acquire(WAIT).unwrap();
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn empty_acquire_times_out() {
        let sem = Semaphore::new(0);
        let start = Instant::now();
        let err = sem.acquire(Duration::from_millis(20)).unwrap_err();
        assert_eq!(err, ChannelError::TimedOut(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn release_wakes_blocked_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let waiter = {
            let sem = Arc::clone(&sem);
            std::thread::spawn(move || sem.acquire(WAIT))
        };
        std::thread::sleep(Duration::from_millis(20));
        sem.release();
        assert_eq!(waiter.join().unwrap(), Ok(()));
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn close_wakes_blocked_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let waiter = {
            let sem = Arc::clone(&sem);
            std::thread::spawn(move || sem.acquire(WAIT))
        };
        std::thread::sleep(Duration::from_millis(20));
        sem.close();
        assert_eq!(waiter.join().unwrap(), Err(ChannelError::Closed));
    }

    #[test]
    fn closed_drains_remaining_permits() {
        let sem = Semaphore::new(2);
        sem.close();
        assert!(sem.is_closed());
        assert_eq!(sem.acquire(WAIT), Ok(()));
        assert_eq!(sem.acquire(WAIT), Ok(()));
        assert_eq!(sem.acquire(WAIT), Err(ChannelError::Closed));
    }

    #[test]
    fn unrepresentable_timeout_waits_untimed() {
        let sem = Arc::new(Semaphore::new(0));
        let waiter = {
            let sem = Arc::clone(&sem);
            std::thread::spawn(move || sem.acquire(Duration::from_secs(u64::MAX)))
        };
        std::thread::sleep(Duration::from_millis(20));
        sem.release();
        assert_eq!(waiter.join().unwrap(), Ok(()));

        let closer = {
            let sem = Arc::clone(&sem);
            std::thread::spawn(move || sem.acquire(Duration::MAX))
        };
        std::thread::sleep(Duration::from_millis(20));
        sem.close();
        assert_eq!(closer.join().unwrap(), Err(ChannelError::Closed));
    }
}
