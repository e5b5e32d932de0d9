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
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use super::{Error, Level};

/// A mock GPIO line. Doesn't actually touch any hardware.
#[derive(Clone)]
pub struct Line {
    name: String,
    in_use: Arc<AtomicBool>,
    levels: Arc<Mutex<Vec<Level>>>,
    fail_sets: Arc<AtomicBool>,
    releases: Arc<AtomicUsize>,
}

impl Line {
    /// Gets the given mock line.
    pub fn get(name: &str) -> Line {
        Line {
            name: name.to_string(),
            in_use: Arc::new(AtomicBool::new(false)),
            levels: Arc::new(Mutex::new(Vec::new())),
            fail_sets: Arc::new(AtomicBool::new(false)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[cfg(test)]
    /// Returns all levels written to the line so far.
    pub fn levels(&self) -> Vec<Level> {
        self.levels.lock().expect("unable to get levels lock").clone()
    }

    #[cfg(test)]
    /// Returns the number of high pulses written to the line so far.
    pub fn high_count(&self) -> usize {
        self.levels()
            .iter()
            .filter(|level| **level == Level::High)
            .count()
    }

    #[cfg(test)]
    /// Returns true if the line is currently reserved.
    pub fn is_acquired(&self) -> bool {
        self.in_use.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    /// Returns the number of times the line has been released.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    /// Makes all subsequent set calls fail.
    pub fn fail_sets(&self) {
        self.fail_sets.store(true, Ordering::SeqCst);
    }
}

impl super::Line for Line {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn acquire(&self) -> Result<Box<dyn super::Handle>, Error> {
        if self
            .in_use
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Busy);
        }

        Ok(Box::new(Handle { line: self.clone() }))
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

struct Handle {
    line: Line,
}

impl super::Handle for Handle {
    fn set(&mut self, level: Level) -> Result<(), Error> {
        if self.line.fail_sets.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("mock write failure")));
        }

        self.line
            .levels
            .lock()
            .expect("unable to get levels lock")
            .push(level);
        Ok(())
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.line.releases.fetch_add(1, Ordering::SeqCst);
        self.line.in_use.store(false, Ordering::SeqCst);
    }
}
