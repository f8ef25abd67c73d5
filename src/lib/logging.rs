//! Formatting helpers and run summaries for log output.

use std::time::{Duration, Instant};

use crate::demux::DemuxSummary;

/// Formats an integer with thousands separators.
///
/// # Examples
///
/// ```
/// use bcdemux_lib::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a fraction (0.0-1.0) as a percentage with `decimals` places.
///
/// # Examples
///
/// ```
/// use bcdemux_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration as e.g. "45s", "2m 15s" or "1h 30m".
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let (mins, rem) = (secs / 60, secs % 60);
        if rem == 0 { format!("{mins}m") } else { format!("{mins}m {rem}s") }
    } else {
        let (hours, mins) = (secs / 3600, (secs % 3600) / 60);
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Formats a throughput in reads per second, or per minute when slower than one per second.
#[must_use]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} reads/s", format_count(count));
    }
    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} reads/s", format_count(rate as u64))
    } else {
        format!("{:.1} reads/min", rate * 60.0)
    }
}

/// Fraction `part / total`, or 0 when `total` is 0.
#[must_use]
pub fn fraction(part: u64, total: u64) -> f64 {
    if total == 0 { 0.0 } else { part as f64 / total as f64 }
}

/// Logs the end-of-run report: one line per bucket in report order, then the totals.
pub fn log_demux_summary(summary: &DemuxSummary) {
    let assigned = summary.assigned();
    log::info!("Demultiplexing Summary:");
    log::info!("  Total records: {}", format_count(summary.total_records));
    log::info!(
        "  Matched: {} ({})",
        format_count(summary.matched()),
        format_percent(fraction(summary.matched(), assigned), 2)
    );
    log::info!(
        "  Unknown: {} ({})",
        format_count(summary.unknown()),
        format_percent(fraction(summary.unknown(), assigned), 2)
    );
    log::info!("  Malformed records skipped: {}", format_count(summary.format_errors));
    if summary.conflicts > 0 {
        log::info!("  Ambiguous barcode variants: {}", format_count(summary.conflicts as u64));
    }
    log::info!("  Reads per bucket:");
    for bucket in &summary.buckets {
        log::info!(
            "    {}\t{}\t{}",
            bucket.id,
            format_count(bucket.reads),
            format_percent(fraction(bucket.reads, assigned), 2)
        );
    }
}

/// Times an operation and logs its throughput on completion.
///
/// # Examples
///
/// ```no_run
/// use bcdemux_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Demultiplexing reads");
/// // ... do work ...
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Starts the timer and logs that the operation began.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Time since the timer started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Logs the item count, elapsed time and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.elapsed();
        log::info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
