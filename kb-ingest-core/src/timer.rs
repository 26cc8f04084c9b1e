//! Wall-clock timing around long-running operations.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::info;

use crate::error::TimerError;

/// Start/stop timer. Elapsed time is measured on the monotonic clock, the
/// wall-clock timestamps are only for the log.
#[derive(Debug, Default)]
pub struct Timer {
    running: Option<(Instant, DateTime<Local>)>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the timer.
    pub fn start(&mut self) {
        let started_at = Local::now();
        info!(
            started_at = %started_at.format("%Y-%m-%d %H:%M:%S"),
            "Timer started"
        );
        self.running = Some((Instant::now(), started_at));
    }

    /// Stops the timer and returns the elapsed time.
    ///
    /// Fails with [`TimerError::NotRunning`] if there was no `start()` since the
    /// last `stop()`.
    pub fn stop(&mut self) -> Result<Duration, TimerError> {
        let (started, _) = self.running.take().ok_or(TimerError::NotRunning)?;
        let elapsed = started.elapsed();
        let stopped_at = Local::now();
        info!(
            stopped_at = %stopped_at.format("%Y-%m-%d %H:%M:%S"),
            total = %format_hms(elapsed),
            "Timer stopped"
        );
        Ok(elapsed)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

/// Renders a duration as whole hours, minutes and seconds: `"1h 2m 3s"`.
pub fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}h {minutes}m {seconds}s")
}
