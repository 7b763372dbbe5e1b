//! DSP load tracking for the processing cycle.

use crate::lockfree::Gauge;
use core::time::Duration;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// DSP load snapshot. Loads are fractions of the nominal cycle time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DspMetrics {
    pub average: f32,
    pub peak: f32,
    pub current: f32,
    pub xruns: u64,
}

/// Callback-time meter.
///
/// Each cycle reports how long the host callback took; the load is that time
/// divided by the nominal period, averaged with a warm-up EMA.
#[derive(Debug, Default)]
pub struct DspLoadMeter {
    current: Gauge,
    peak: Gauge,
    average: Gauge,
    xruns: AtomicU64,
    samples: AtomicU32,
}

impl DspLoadMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one callback. Returns the instantaneous load.
    pub fn record(&self, elapsed: Duration, period: Duration) -> f32 {
        let period = period.as_secs_f64();
        if period <= 0.0 {
            return 0.0;
        }
        let load = (elapsed.as_secs_f64() / period) as f32;

        self.current.publish(load);
        self.peak.raise_to(load);

        let count = self.samples.fetch_add(1, Ordering::Relaxed);
        let alpha = 1.0 / (count.min(100) + 1) as f32;
        let avg = self.average.read();
        self.average.publish(avg * (1.0 - alpha) + load * alpha);

        load
    }

    pub fn record_xrun(&self) {
        self.xruns.fetch_add(1, Ordering::Relaxed);
    }

    /// Smoothed load.
    pub fn average(&self) -> f32 {
        self.average.read()
    }

    pub fn xruns(&self) -> u64 {
        self.xruns.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> DspMetrics {
        DspMetrics {
            average: self.average.read(),
            peak: self.peak.read(),
            current: self.current.read(),
            xruns: self.xruns(),
        }
    }

    pub fn reset(&self) {
        self.current.publish(0.0);
        self.peak.publish(0.0);
        self.average.publish(0.0);
        self.xruns.store(0, Ordering::Relaxed);
        self.samples.store(0, Ordering::Relaxed);
    }
}
