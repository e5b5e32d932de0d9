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
use std::time::Instant;

use tracing::info;

use crate::{feed::Totals, util};

/// A single accepted reading of the counters.
#[derive(Clone, Copy, Debug)]
pub struct Sample {
    /// When the reading was accepted.
    pub at: Instant,
    /// The confirmed counter total.
    pub confirmed: i64,
    /// The deaths counter total.
    pub deaths: i64,
}

/// An append-only, time-ordered buffer of accepted samples. Existing samples
/// are never removed or mutated.
pub struct SampleBuffer {
    samples: Vec<Sample>,
}

impl SampleBuffer {
    /// Creates a new, empty sample buffer.
    pub fn new() -> SampleBuffer {
        SampleBuffer {
            samples: Vec::new(),
        }
    }

    /// The number of samples in the buffer.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if no sample has been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The sample at the given index.
    pub fn sample(&self, index: usize) -> &Sample {
        &self.samples[index]
    }

    /// The most recently accepted sample.
    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Reconciles a raw reading into the buffer. The first reading is always
    /// accepted verbatim. Later readings have reversal artifacts corrected per
    /// counter, and are dropped entirely when nothing changed. Returns true if
    /// a new sample was appended.
    pub fn reconcile(&mut self, raw: Totals, now: Instant) -> bool {
        let prev = match self.samples.last() {
            Some(prev) => *prev,
            None => {
                info!(
                    confirmed = raw.total_confirmed,
                    deaths = raw.total_deaths,
                    "First reading, accepting verbatim."
                );
                self.samples.push(Sample {
                    at: now,
                    confirmed: raw.total_confirmed,
                    deaths: raw.total_deaths,
                });
                return true;
            }
        };

        let confirmed = reverse_correct(raw.total_confirmed, prev.confirmed);
        let deaths = reverse_correct(raw.total_deaths, prev.deaths);

        if (confirmed, deaths) == (prev.confirmed, prev.deaths) {
            info!("No change in counts.");
            return false;
        }

        info!(
            delta_confirmed = confirmed - prev.confirmed,
            delta_deaths = deaths - prev.deaths,
            last_update = util::duration_minutes(now.duration_since(prev.at)),
            "Counts updated."
        );
        self.samples.push(Sample {
            at: now,
            confirmed,
            deaths,
        });
        true
    }

    #[cfg(test)]
    /// Appends a sample directly, bypassing reconciliation.
    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }
}

/// Treats an exact negation of the previous total as a spurious sign flip in
/// the source rather than a real drop, and substitutes the previous total.
fn reverse_correct(raw: i64, prev: i64) -> i64 {
    if raw < 0 && raw == -prev {
        info!(raw, prev, "Reversing a recent update.");
        prev
    } else {
        raw
    }
}
