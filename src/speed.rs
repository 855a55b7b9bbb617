//! Transfer speed estimation.
//!
//! A [`Speedometer`] averages byte counts over a short sliding window and
//! reports bytes per second. Each swarm keeps one for downloads and one
//! for uploads, fed from wire byte events.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::constants::SPEED_WINDOW;

/// Sliding-window byte-rate estimator.
///
/// Samples land in one-second buckets; the reported rate is the windowed
/// total divided by the time actually covered, so the estimate is usable
/// from the first second onward.
pub struct Speedometer {
    inner: Mutex<Buckets>,
}

struct Buckets {
    slots: Vec<u64>,
    head: usize,
    last_tick: Instant,
    started: Instant,
}

impl Speedometer {
    /// Creates a speedometer with the default window.
    pub fn new() -> Self {
        Self::with_window(SPEED_WINDOW)
    }

    /// Creates a speedometer averaging over `window` (rounded to whole
    /// seconds, minimum one).
    pub fn with_window(window: Duration) -> Self {
        let slots = (window.as_secs() as usize).max(1);
        let now = Instant::now();
        Self {
            inner: Mutex::new(Buckets {
                slots: vec![0; slots],
                head: 0,
                last_tick: now,
                started: now,
            }),
        }
    }

    /// Records `bytes` transferred now.
    pub fn record(&self, bytes: u64) {
        let mut inner = self.inner.lock();
        inner.advance(Instant::now());
        let head = inner.head;
        inner.slots[head] += bytes;
    }

    /// Returns the current rate in bytes per second.
    pub fn rate(&self) -> f64 {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.advance(now);
        let total: u64 = inner.slots.iter().sum();
        let window = inner.slots.len() as f64;
        let covered = now
            .duration_since(inner.started)
            .as_secs_f64()
            .clamp(1.0, window);
        total as f64 / covered
    }
}

impl Default for Speedometer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buckets {
    /// Rotates expired buckets out of the window.
    fn advance(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_tick).as_secs();
        if elapsed == 0 {
            return;
        }
        let steps = (elapsed as usize).min(self.slots.len());
        for _ in 0..steps {
            self.head = (self.head + 1) % self.slots.len();
            self.slots[self.head] = 0;
        }
        self.last_tick += Duration::from_secs(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_steady_rate() {
        let speed = Speedometer::new();
        for _ in 0..10 {
            speed.record(1000);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        let rate = speed.rate();
        assert!((rate - 1000.0).abs() < 50.0, "rate was {rate}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_decays_to_zero() {
        let speed = Speedometer::new();
        speed.record(50_000);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(speed.rate(), 0.0);
    }

    #[test]
    fn test_initial_rate_uses_partial_window() {
        let speed = Speedometer::new();
        speed.record(5000);
        // Covered time is clamped to at least one second.
        assert!(speed.rate() <= 5000.0);
        assert!(speed.rate() > 0.0);
    }
}
