//! Sample-count time vs. wall-clock time.

use crate::lockfree::{Gauge, Signal};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

/// Transport-independent process clock.
///
/// `processed` counts the samples of every finished cycle. While cycles are
/// paced in real time the clock also interpolates inside the current cycle
/// from the wall-clock time since the cycle started.
#[derive(Debug)]
pub(crate) struct ProcessClock {
    epoch: Instant,
    processed: AtomicU64,
    cycle_start_nanos: AtomicU64,
    /// Highest value `sample_time` has reported.
    reported: AtomicU64,
    buffer_size: AtomicU32,
    sample_rate: Gauge,
    /// Set while cycles run at their nominal cadence.
    paced: Signal,
}

impl ProcessClock {
    pub(crate) fn new() -> Self {
        Self {
            epoch: Instant::now(),
            processed: AtomicU64::new(0),
            cycle_start_nanos: AtomicU64::new(0),
            reported: AtomicU64::new(0),
            buffer_size: AtomicU32::new(0),
            sample_rate: Gauge::new(0.0),
            paced: Signal::new(false),
        }
    }

    /// Called before the worker starts; time restarts at zero.
    pub(crate) fn reset(&self, buffer_size: u32, sample_rate: f32) {
        self.processed.store(0, Ordering::Release);
        self.reported.store(0, Ordering::Release);
        self.buffer_size.store(buffer_size, Ordering::Release);
        self.sample_rate.publish(sample_rate);
        self.cycle_start_nanos
            .store(self.nanos(Instant::now()), Ordering::Release);
    }

    pub(crate) fn set_paced(&self, paced: bool) {
        self.paced.set(paced);
    }

    pub(crate) fn begin_cycle(&self, now: Instant) {
        self.cycle_start_nanos
            .store(self.nanos(now), Ordering::Release);
    }

    /// Accounts a finished cycle. `next_start` is the nominal start of the
    /// next cycle.
    pub(crate) fn end_cycle(&self, next_start: Instant) {
        self.cycle_start_nanos
            .store(self.nanos(next_start), Ordering::Release);
        let buffer_size = self.buffer_size.load(Ordering::Acquire) as u64;
        self.processed.fetch_add(buffer_size, Ordering::AcqRel);
    }

    pub(crate) fn sample_time_at_cycle_start(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    /// Interpolated position inside the cycle, always below the buffer size.
    /// Zero unless cycles are paced in real time.
    pub(crate) fn samples_since_cycle_start(&self) -> u32 {
        if !self.paced.is_raised() {
            return 0;
        }
        let buffer_size = self.buffer_size.load(Ordering::Acquire);
        if buffer_size == 0 {
            return 0;
        }
        let start = self.cycle_start_nanos.load(Ordering::Acquire);
        let now = self.nanos(Instant::now());
        let elapsed = now.saturating_sub(start) as f64 * 1e-9;
        let samples = (elapsed * self.sample_rate.read() as f64) as u64;
        samples.min(buffer_size as u64 - 1) as u32
    }

    /// Never goes backwards.
    pub(crate) fn sample_time(&self) -> u64 {
        let t = self.sample_time_at_cycle_start() + self.samples_since_cycle_start() as u64;
        let prev = self.reported.fetch_max(t, Ordering::AcqRel);
        prev.max(t)
    }

    fn nanos(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.epoch).as_nanos() as u64
    }
}
