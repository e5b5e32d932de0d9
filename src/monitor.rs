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

use tracing::{error, info};

use crate::{cancel::CancelHandle, coordinator::Coordinator, feed, samples::SampleBuffer};

/// How long the loop sleeps between iterations. Coarse on purpose: polling and
/// launch decisions work at minute-plus granularity.
const LOOP_TICK: Duration = Duration::from_secs(1);

/// Drives the whole daemon: polls the feed on its interval, reconciles the
/// readings into the sample buffer, and ticks the coordinator continuously.
pub struct Monitor {
    source: Arc<dyn feed::Source>,
    coordinator: Coordinator,
    buffer: SampleBuffer,
    poll_interval: Duration,
    last_poll: Option<Instant>,
    polls: u64,
    cancel_handle: CancelHandle,
}

impl Monitor {
    /// Creates a new monitor.
    pub fn new(
        source: Arc<dyn feed::Source>,
        coordinator: Coordinator,
        poll_interval: Duration,
        cancel_handle: CancelHandle,
    ) -> Monitor {
        Monitor {
            source,
            coordinator,
            buffer: SampleBuffer::new(),
            poll_interval,
            last_poll: None,
            polls: 0,
            cancel_handle,
        }
    }

    /// Runs until the cancel handle fires. Realistically, that only happens at
    /// process shutdown.
    pub async fn run(mut self) {
        info!(
            source = format!("{}", self.source),
            poll_interval = format!("{:?}", self.poll_interval),
            "Monitor started."
        );

        while !self.cancel_handle.is_cancelled() {
            self.tick(Instant::now()).await;
            tokio::time::sleep(LOOP_TICK).await;
        }

        info!("Monitor stopped.");
    }

    /// A single loop iteration: polls the source if a poll is due, then ticks
    /// the coordinator. The poll clock advances on failed fetches too, so a
    /// broken source is retried at the next interval rather than in a tight
    /// loop.
    async fn tick(&mut self, now: Instant) {
        if self.poll_due(now) {
            self.last_poll = Some(now);
            self.polls += 1;
            info!(poll = self.polls, "Checking source for data...");

            let source = self.source.clone();
            match tokio::task::spawn_blocking(move || source.fetch()).await {
                Ok(Ok(totals)) => {
                    self.buffer.reconcile(totals, now);
                }
                Ok(Err(e)) => {
                    error!(err = format!("{}", e), "Failed to fetch data, continuing.");
                }
                Err(e) => {
                    error!(err = format!("{}", e), "Fetch task failed, continuing.");
                }
            }
        }

        self.coordinator.tick(&self.buffer, now);
    }

    fn poll_due(&self, now: Instant) -> bool {
        match self.last_poll {
            Some(last_poll) => now.duration_since(last_poll) > self.poll_interval,
            None => true,
        }
    }

    #[cfg(test)]
    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    #[cfg(test)]
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    #[cfg(test)]
    pub fn polls(&self) -> u64 {
        self.polls
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::Arc,
        time::{Duration, Instant},
    };

    use crate::{
        cancel::CancelHandle,
        coordinator::{Coordinator, LineId},
        feed::{self, Totals},
        gpio,
        test::eventually,
    };

    use super::Monitor;

    struct Fixture {
        source: Arc<feed::test::Source>,
        confirmed: Arc<gpio::test::Line>,
        deaths: Arc<gpio::test::Line>,
        monitor: Monitor,
        cancel_handle: CancelHandle,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            self.cancel_handle.cancel();
        }
    }

    fn fixture(poll_interval: Duration) -> Fixture {
        let source = Arc::new(feed::test::Source::get());
        let confirmed = Arc::new(gpio::test::Line::get("mock-confirmed"));
        let deaths = Arc::new(gpio::test::Line::get("mock-deaths"));
        let cancel_handle = CancelHandle::new();
        let coordinator = Coordinator::new(
            confirmed.clone(),
            deaths.clone(),
            Duration::from_millis(10),
            Duration::from_millis(200),
            Duration::from_millis(1),
            cancel_handle.clone(),
        );
        let monitor = Monitor::new(
            source.clone(),
            coordinator,
            poll_interval,
            cancel_handle.clone(),
        );
        Fixture {
            source,
            confirmed,
            deaths,
            monitor,
            cancel_handle,
        }
    }

    fn totals(total_confirmed: i64, total_deaths: i64) -> Totals {
        Totals {
            total_confirmed,
            total_deaths,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_end_to_end_blinks_confirmed_delta() {
        let mut f = fixture(Duration::ZERO);
        f.source.push(totals(100, 5));
        f.source.push(totals(150, 5));

        // First poll accepts the baseline reading; there is nothing to blink
        // yet.
        f.monitor.tick(Instant::now()).await;
        assert_eq!(1, f.monitor.buffer().len());
        assert!(!f.monitor.coordinator().is_running(LineId::Confirmed));

        // Second poll sees the increase and the confirmed line blinks it out.
        std::thread::sleep(Duration::from_millis(20));
        f.monitor.tick(Instant::now()).await;
        assert_eq!(2, f.monitor.buffer().len());
        assert!(f.monitor.coordinator().is_running(LineId::Confirmed));
        assert_eq!(1, f.monitor.coordinator().cursor(LineId::Confirmed));
        eventually(|| f.confirmed.high_count() == 50, "Never blinked 50 times");

        // The deaths counter never moved.
        assert!(!f.monitor.coordinator().is_running(LineId::Deaths));
        assert_eq!(0, f.deaths.high_count());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_fetch_advances_poll_clock() {
        let mut f = fixture(Duration::from_millis(50));
        f.source.push_failure();
        f.source.push(totals(100, 5));

        let start = Instant::now();
        f.monitor.tick(start).await;
        assert_eq!(1, f.monitor.polls());
        assert!(f.monitor.buffer().is_empty());

        // The failure consumed this interval; no immediate retry happens.
        f.monitor.tick(Instant::now()).await;
        assert_eq!(1, f.monitor.polls());

        // The next interval picks up the good reading.
        std::thread::sleep(Duration::from_millis(60));
        f.monitor.tick(Instant::now()).await;
        assert_eq!(2, f.monitor.polls());
        assert_eq!(1, f.monitor.buffer().len());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_no_change_appends_nothing() {
        let mut f = fixture(Duration::ZERO);
        f.source.push(totals(100, 5));
        f.source.push(totals(100, 5));

        f.monitor.tick(Instant::now()).await;
        std::thread::sleep(Duration::from_millis(5));
        f.monitor.tick(Instant::now()).await;

        assert_eq!(1, f.monitor.buffer().len());
        assert!(!f.monitor.coordinator().is_running(LineId::Confirmed));
        assert!(!f.monitor.coordinator().is_running(LineId::Deaths));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_stops_on_cancel() {
        let source = Arc::new(feed::test::Source::get());
        let confirmed = Arc::new(gpio::test::Line::get("mock-confirmed"));
        let deaths = Arc::new(gpio::test::Line::get("mock-deaths"));
        let cancel_handle = CancelHandle::new();
        let coordinator = Coordinator::new(
            confirmed,
            deaths,
            Duration::from_millis(10),
            Duration::from_millis(100),
            Duration::from_millis(1),
            cancel_handle.clone(),
        );
        let monitor = Monitor::new(
            source,
            coordinator,
            Duration::from_secs(3600),
            cancel_handle.clone(),
        );

        let join = tokio::spawn(monitor.run());
        cancel_handle.cancel();
        assert!(join.await.is_ok());
    }
}
