//! Countdown timer for a test session.
//!
//! Runs as a spawned tokio task that decrements the remaining seconds once per
//! wall-clock second and publishes them through a `watch` channel. It knows
//! nothing about the network or the session state; the controller only reads
//! it.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Remaining time below which the clock is shown as running low.
pub const LOW_TIME_THRESHOLD_SECS: u64 = 300;

/// Countdown bound to a test's allotted duration.
///
/// Best-effort wall-clock approximation: ticks missed while the process was
/// suspended are delivered in a burst once it resumes.
pub struct SessionTimer {
    remaining: watch::Sender<u64>,
    task: Option<JoinHandle<()>>,
}

impl SessionTimer {
    pub fn new() -> Self {
        let (remaining, _) = watch::channel(0);
        Self {
            remaining,
            task: None,
        }
    }

    /// Seed the countdown and start ticking. Restarting re-seeds.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, duration_secs: u64) {
        self.stop();
        self.remaining.send_replace(duration_secs);
        if duration_secs == 0 {
            return;
        }

        let tx = self.remaining.clone();
        self.task = Some(tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                ticks.tick().await;
                let mut left = 0;
                tx.send_modify(|r| {
                    *r = r.saturating_sub(1);
                    left = *r;
                });
                tracing::debug!(remaining = left, "timer tick");
                if left == 0 {
                    break;
                }
            }
        }));
    }

    /// Freeze the countdown at its current value.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    pub fn is_expired(&self) -> bool {
        self.remaining() == 0
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Receiver that observes every change of the remaining seconds.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining.subscribe()
    }
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Format seconds as `MM:SS`.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Whether the clock should be rendered as running low.
pub fn is_low_time(secs: u64) -> bool {
    secs < LOW_TIME_THRESHOLD_SECS
}
