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
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::{blink, cancel::CancelHandle, gpio, samples::SampleBuffer, util};

/// The output lines the coordinator schedules pulse trains for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineId {
    Confirmed,
    Deaths,
}

impl LineId {
    fn label(&self) -> &'static str {
        match self {
            LineId::Confirmed => "confirmed",
            LineId::Deaths => "deaths",
        }
    }
}

/// The per-line scheduling state. The cursor marks the last sample already
/// consumed into a launched job; the job slot holds the one in-flight pulse
/// train allowed for this line.
struct LineState {
    id: LineId,
    line: Arc<dyn gpio::Line>,
    cursor: usize,
    job: Option<JoinHandle<()>>,
}

impl LineState {
    fn new(id: LineId, line: Arc<dyn gpio::Line>) -> LineState {
        LineState {
            id,
            line,
            cursor: 0,
            job: None,
        }
    }
}

/// Decides when each line gets a new pulse train. Owns the per-line cursors
/// into the sample buffer and the launch throttle shared by both lines.
pub struct Coordinator {
    confirmed: LineState,
    deaths: LineState,
    /// The instant of the last launch attempt on either line.
    last_launch: Option<Instant>,
    min_launch_gap: Duration,
    window: Duration,
    width: Duration,
    cancel_handle: CancelHandle,
}

impl Coordinator {
    /// Creates a new coordinator for the two counter lines.
    pub fn new(
        confirmed_line: Arc<dyn gpio::Line>,
        deaths_line: Arc<dyn gpio::Line>,
        min_launch_gap: Duration,
        window: Duration,
        width: Duration,
        cancel_handle: CancelHandle,
    ) -> Coordinator {
        Coordinator {
            confirmed: LineState::new(LineId::Confirmed, confirmed_line),
            deaths: LineState::new(LineId::Deaths, deaths_line),
            last_launch: None,
            min_launch_gap,
            window,
            width,
            cancel_handle,
        }
    }

    /// Evaluates both lines against the buffer: reaps finished jobs and
    /// launches a new pulse train where an unconsumed delta exists. Lines are
    /// evaluated in a fixed order and share the launch throttle, so a launch
    /// attempt on one line pushes the other line's next chance out by the
    /// minimum launch gap. The cursor advances and the throttle updates on
    /// every launch attempt, even when the interval's net delta produces no
    /// pulses.
    pub fn tick(&mut self, buffer: &SampleBuffer, now: Instant) {
        if buffer.is_empty() {
            return;
        }

        let min_launch_gap = self.min_launch_gap;
        let window = self.window;
        let width = self.width;
        let cancel_handle = self.cancel_handle.clone();
        let mut last_launch = self.last_launch;

        for state in [&mut self.confirmed, &mut self.deaths] {
            if state.job.as_ref().is_some_and(|job| job.is_finished()) {
                info!(line = state.id.label(), "Pulse job finished.");
                state.job = None;
            }

            if state.job.is_some() {
                continue;
            }
            if buffer.len() <= state.cursor + 1 {
                continue;
            }
            if last_launch.is_some_and(|launch| now.duration_since(launch) <= min_launch_gap) {
                continue;
            }

            let old = *buffer.sample(state.cursor);
            let latest = *buffer.sample(buffer.len() - 1);
            let delta = match state.id {
                LineId::Confirmed => latest.confirmed - old.confirmed,
                LineId::Deaths => latest.deaths - old.deaths,
            };
            let updates = buffer.len() - (state.cursor + 1);

            state.cursor = buffer.len() - 1;
            last_launch = Some(now);

            if delta <= 0 {
                debug!(
                    line = state.id.label(),
                    delta, "No positive delta, nothing to blink."
                );
                continue;
            }

            info!(
                line = state.id.label(),
                delta,
                updates,
                prior = util::duration_minutes(latest.at.duration_since(old.at)),
                window = format!("{:?}", window),
                "Launching pulse train."
            );

            let line = state.line.clone();
            let cancel_handle = cancel_handle.clone();
            let count = delta as u64;
            state.job = Some(tokio::task::spawn_blocking(move || {
                if let Err(e) = blink::run(line, count, window, width, cancel_handle) {
                    error!(err = e.as_ref(), "Error writing pulse train.");
                }
            }));
        }

        self.last_launch = last_launch;
    }

    #[cfg(test)]
    /// Returns true if the given line currently has a job in its slot.
    pub fn is_running(&self, id: LineId) -> bool {
        self.state(id).job.is_some()
    }

    #[cfg(test)]
    /// The given line's cursor into the sample buffer.
    pub fn cursor(&self, id: LineId) -> usize {
        self.state(id).cursor
    }

    #[cfg(test)]
    fn state(&self, id: LineId) -> &LineState {
        match id {
            LineId::Confirmed => &self.confirmed,
            LineId::Deaths => &self.deaths,
        }
    }
}
