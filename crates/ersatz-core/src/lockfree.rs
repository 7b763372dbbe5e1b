//! Meter readings and worker signals polled across threads without locking.
//!
//! Each cell sits on its own cache line: the worker writes them every cycle
//! while control threads read them.

use atomic_float::AtomicF32;
use std::sync::atomic::{AtomicBool, Ordering};

/// A float reading published by one thread and polled by others.
#[derive(Debug)]
#[repr(align(64))]
pub(crate) struct Gauge(AtomicF32);

impl Gauge {
    pub(crate) fn new(value: f32) -> Self {
        Self(AtomicF32::new(value))
    }

    #[inline]
    pub(crate) fn read(&self) -> f32 {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn publish(&self, value: f32) {
        self.0.store(value, Ordering::Release);
    }

    /// Keeps the larger of the stored value and `value`.
    #[inline]
    pub(crate) fn raise_to(&self, value: f32) {
        self.0.fetch_max(value, Ordering::AcqRel);
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// A boolean the control thread raises and the worker observes or consumes.
#[derive(Debug, Default)]
#[repr(align(64))]
pub(crate) struct Signal(AtomicBool);

impl Signal {
    pub(crate) fn new(raised: bool) -> Self {
        Self(AtomicBool::new(raised))
    }

    #[inline]
    pub(crate) fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set(&self, raised: bool) {
        self.0.store(raised, Ordering::Release);
    }

    #[inline]
    pub(crate) fn raise(&self) {
        self.set(true);
    }

    /// Lowers the signal, returning whether it was raised.
    #[inline]
    pub(crate) fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}
