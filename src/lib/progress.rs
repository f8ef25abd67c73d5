//! Periodic progress logging for long-running loops.

use log::info;
use std::time::Instant;

use crate::logging::{format_count, format_duration, format_rate};

/// Counts processed items and logs each time the count crosses a multiple of the interval.
///
/// # Example
/// ```
/// use bcdemux_lib::progress::ProgressTracker;
///
/// let mut tracker = ProgressTracker::new("Processed read pairs").with_interval(100);
/// for _ in 0..250 {
///     tracker.record(1); // logs at 100 and 200
/// }
/// tracker.log_final(); // logs the final count of 250
/// assert_eq!(tracker.count(), 250);
/// ```
#[derive(Debug)]
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: u64,
    started: Instant,
}

impl ProgressTracker {
    /// Creates a tracker with a default interval of 1,000,000.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: 1_000_000, message: message.into(), count: 0, started: Instant::now() }
    }

    /// Sets the logging interval. An interval of zero is treated as one.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds `additional` to the count, logging once per interval boundary crossed.
    ///
    /// Returns `true` if at least one boundary was crossed.
    pub fn record(&mut self, additional: u64) -> bool {
        let prev = self.count;
        self.count += additional;
        let crossed = self.count / self.interval - prev / self.interval;
        for i in 1..=crossed {
            let milestone = (prev / self.interval + i) * self.interval;
            self.log_milestone(milestone);
        }
        crossed > 0
    }

    /// Logs the final count unless it landed exactly on the last logged boundary.
    pub fn log_final(&self) {
        if self.count > 0 && !self.count.is_multiple_of(self.interval) {
            let elapsed = self.started.elapsed();
            info!(
                "{} {} (complete) in {}",
                self.message,
                format_count(self.count),
                format_duration(elapsed)
            );
        }
    }

    /// The number of items recorded so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    fn log_milestone(&self, milestone: u64) {
        let elapsed = self.started.elapsed();
        info!(
            "{} {} ({}, {})",
            self.message,
            format_count(milestone),
            format_duration(elapsed),
            format_rate(milestone, elapsed)
        );
    }
}
