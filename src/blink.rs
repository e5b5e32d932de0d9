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
use std::{error::Error, sync::Arc, time::Duration};

use tracing::{info, span, warn, Level};

use crate::{cancel::CancelHandle, gpio};

/// A single entry in a pulse train plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pulse {
    /// How long the line is held high.
    pub on: Duration,
    /// How long the line stays low before the next pulse.
    pub off: Duration,
}

/// Computes the timing plan for writing out `count` pulses of the given width
/// spread evenly across `window`.
pub fn plan(count: u64, window: Duration, width: Duration) -> Vec<Pulse> {
    let spacing = window.div_f64(count as f64);
    let off = match spacing.checked_sub(width) {
        Some(off) => off,
        None => {
            warn!(
                count,
                window = format!("{:?}", window),
                width = format!("{:?}", width),
                "Too many pulses for the window, clamping the gap to zero."
            );
            Duration::ZERO
        }
    };

    vec![Pulse { on: width, off }; count as usize]
}

/// Writes `count` pulses out to the given line, spread across `window`. This
/// blocks for approximately the full window; the line is acquired at the start
/// and released on every exit path, including write failures and cancellation.
pub fn run(
    line: Arc<dyn gpio::Line>,
    count: u64,
    window: Duration,
    width: Duration,
    cancel_handle: CancelHandle,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let span = span!(Level::INFO, "blink");
    let _enter = span.enter();

    let pulses = plan(count, window, width);
    let gap = pulses.first().map(|pulse| pulse.off).unwrap_or_default();
    info!(
        line = line.name(),
        count,
        window = format!("{:?}", window),
        gap = format!("{:?}", gap),
        "Writing out pulses."
    );

    let mut handle = line.acquire()?;
    let mut written = 0;
    for pulse in pulses.iter() {
        handle.set(gpio::Level::High)?;
        spin_sleep::sleep(pulse.on);
        handle.set(gpio::Level::Low)?;

        written += 1;
        if written >= pulses.len() {
            break;
        }
        if cancel_handle.sleep(pulse.off) {
            info!(line = line.name(), written, "Pulse train cancelled.");
            break;
        }
    }

    info!(line = line.name(), written, "Done blinking.");
    Ok(())
}
