// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    sync::{Arc, Condvar, Mutex},
    time::Duration,
};

/// Represents the current cancel state.
#[derive(PartialEq)]
enum CancelState {
    Untouched,
    Cancelled,
}

/// A cancel handle is shared between the monitor loop and any in-flight pulse trains.
/// It's the pulse train's responsibility to respect a cancel request at its next
/// wait boundary so that the underlying line is released.
#[derive(Clone)]
pub struct CancelHandle {
    /// The current cancel state of the process.
    cancelled: Arc<Mutex<CancelState>>,
    /// The condvar will handle notification of cancelling.
    condvar: Arc<Condvar>,
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle {
            cancelled: Arc::new(Mutex::new(CancelState::Untouched)),
            condvar: Arc::new(Condvar::new()),
        }
    }

    /// Returns true if the process has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().expect("Error getting lock") == CancelState::Cancelled
    }

    /// Sleeps for the given duration, waking up early if the handle is cancelled.
    /// Returns true if the sleep ended due to cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let guard = self.cancelled.lock().expect("Error getting lock");
        let (guard, _) = self
            .condvar
            .wait_timeout_while(guard, duration, |cancelled| {
                *cancelled == CancelState::Untouched
            })
            .expect("Error getting lock");
        *guard == CancelState::Cancelled
    }

    /// Cancels the process.
    pub fn cancel(&self) {
        let mut cancel_state = self.cancelled.lock().expect("Error getting lock");
        if *cancel_state == CancelState::Untouched {
            *cancel_state = CancelState::Cancelled;
            self.condvar.notify_all();
        }
    }
}

#[cfg(test)]
mod test {
    use std::{thread, time::Instant};

    use super::*;

    #[test]
    fn test_sleep_expires() {
        let cancel_handle = CancelHandle::new();

        let start = Instant::now();
        assert!(!cancel_handle.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(!cancel_handle.is_cancelled());
    }

    #[test]
    fn test_sleep_interrupted_by_cancel() {
        let cancel_handle = CancelHandle::new();

        let join = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || cancel_handle.sleep(Duration::from_secs(60)))
        };

        cancel_handle.cancel();
        assert!(join.join().expect("Error joining thread"));
        assert!(cancel_handle.is_cancelled());
    }

    #[test]
    fn test_sleep_after_cancel_returns_immediately() {
        let cancel_handle = CancelHandle::new();
        cancel_handle.cancel();

        let start = Instant::now();
        assert!(cancel_handle.sleep(Duration::from_secs(60)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
