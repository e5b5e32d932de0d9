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
    collections::VecDeque,
    fmt, io,
    sync::{Arc, Mutex},
};

use super::{FetchError, Totals};

/// A mock source. Replays scripted readings instead of fetching anything.
#[derive(Clone)]
pub struct Source {
    readings: Arc<Mutex<VecDeque<Option<Totals>>>>,
}

impl Source {
    /// Gets a mock source with no scripted readings.
    pub fn get() -> Source {
        Source {
            readings: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    #[cfg(test)]
    /// Scripts a successful reading.
    pub fn push(&self, totals: Totals) {
        self.readings
            .lock()
            .expect("unable to get readings lock")
            .push_back(Some(totals));
    }

    #[cfg(test)]
    /// Scripts a failed fetch.
    pub fn push_failure(&self) {
        self.readings
            .lock()
            .expect("unable to get readings lock")
            .push_back(None);
    }
}

impl super::Source for Source {
    fn fetch(&self) -> Result<Totals, FetchError> {
        let reading = self
            .readings
            .lock()
            .expect("unable to get readings lock")
            .pop_front();

        match reading {
            Some(Some(totals)) => Ok(totals),
            _ => Err(FetchError::Exec(io::Error::other("mock fetch failure"))),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mock (Mock)")
    }
}
