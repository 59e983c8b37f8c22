//! Throughput bookkeeping for a running job.
//!
//! Speed is not recomputed on every item; the throttle below amortizes the
//! cost and smooths single-item noise, so readers may observe a slightly
//! stale speed/ETA between recomputations.

use std::time::{Duration, Instant};

/// Recompute after this many items since the last recomputation...
const RECOMPUTE_EVERY_ITEMS: usize = 5;
/// ...or once this much wall-clock time has passed, whichever comes first.
const RECOMPUTE_MAX_INTERVAL: Duration = Duration::from_secs(30);

/// Predicate deciding when the rolling speed is worth refreshing.
/// Evaluated once per processed item.
pub struct SpeedThrottle {
    last_recompute: Instant,
    last_processed: usize,
}

impl SpeedThrottle {
    pub fn new() -> Self {
        Self {
            last_recompute: Instant::now(),
            last_processed: 0,
        }
    }

    pub fn should_recompute(&mut self, processed: usize) -> bool {
        let due = processed.saturating_sub(self.last_processed) >= RECOMPUTE_EVERY_ITEMS
            || self.last_recompute.elapsed() >= RECOMPUTE_MAX_INTERVAL;
        if due {
            self.last_processed = processed;
            self.last_recompute = Instant::now();
        }
        due
    }
}

impl Default for SpeedThrottle {
    fn default() -> Self {
        Self::new()
    }
}

/// Companies resolved per second since the epoch started.
pub fn processing_speed(processed: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        0.0
    } else {
        processed as f64 / secs
    }
}

/// Estimated seconds remaining, undefined until a speed is known.
pub fn eta_seconds(total: usize, processed: usize, speed: f64) -> Option<f64> {
    if speed > 0.0 {
        Some(total.saturating_sub(processed) as f64 / speed)
    } else {
        None
    }
}

/// Share of processed items that resolved a website, as a percentage.
pub fn success_ratio(success_count: usize, processed: usize) -> f64 {
    if processed == 0 {
        0.0
    } else {
        success_count as f64 / processed as f64 * 100.0
    }
}

/// Arithmetic mean of the per-item durations, in milliseconds.
pub fn average_time_ms(times: &[u64]) -> f64 {
    if times.is_empty() {
        0.0
    } else {
        times.iter().sum::<u64>() as f64 / times.len() as f64
    }
}
