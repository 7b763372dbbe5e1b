//! Test helpers and fixtures for ersatz integration tests
//!
//! Each test file pulls this in with `mod helpers;`. Not every file uses
//! every helper.

#![allow(dead_code)]

use ersatz::prelude::*;
use ersatz::EngineState;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default test sample rate
pub const TEST_SAMPLE_RATE: f32 = 48000.0;

/// Standard buffer size for deterministic testing
pub const TEST_BUFFER_SIZE: u32 = 256;

/// Upper bound for anything a test waits on.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Samples below this magnitude count as silence.
pub const SILENCE_THRESHOLD: f32 = 1e-6;

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Backend with two capture and two playback ports and no MIDI.
pub fn test_backend() -> Backend {
    init_tracing();
    Backend::builder()
        .instance_name("test")
        .sample_rate(TEST_SAMPLE_RATE)
        .buffer_size(TEST_BUFFER_SIZE)
        .channels(2, 2)
        .build()
        .expect("Failed to create test backend")
}

/// Poll `cond` every millisecond until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

pub fn wait_for_state(backend: &Backend, expected: EngineState) -> bool {
    wait_until(TEST_TIMEOUT, || backend.state() == expected)
}

/// Everything a [`Recorder`] saw, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    PortsChanged,
    Connection(PortHandle, PortHandle, bool),
    Latency(bool),
    Freewheel(bool),
}

/// Shared view of what a [`Recorder`] observed.
#[derive(Debug, Default)]
pub struct Observed {
    /// `sample_time_at_cycle_start` of every cycle.
    pub cycle_starts: Vec<u64>,
    /// Whether the backend was freewheeling during each cycle.
    pub freewheeling: Vec<bool>,
    pub notifications: Vec<Notification>,
}

/// Handler that logs cycles and notifications, optionally quitting after a
/// fixed number of cycles.
pub struct Recorder {
    observed: Arc<Mutex<Observed>>,
    quit_after: Option<usize>,
    freewheeling: bool,
    work: Option<Duration>,
}

impl Recorder {
    pub fn new() -> (Self, Arc<Mutex<Observed>>) {
        let observed = Arc::new(Mutex::new(Observed::default()));
        let recorder = Self {
            observed: Arc::clone(&observed),
            quit_after: None,
            freewheeling: false,
            work: None,
        };
        (recorder, observed)
    }

    pub fn quit_after(mut self, cycles: usize) -> Self {
        self.quit_after = Some(cycles);
        self
    }

    /// Simulated callback cost per cycle.
    pub fn work(mut self, per_cycle: Duration) -> Self {
        self.work = Some(per_cycle);
        self
    }
}

impl ProcessHandler for Recorder {
    fn process(&mut self, scope: &ProcessScope<'_>) -> Control {
        if let Some(work) = self.work {
            std::thread::sleep(work);
        }
        let mut observed = self.observed.lock().unwrap();
        observed.cycle_starts.push(scope.sample_time_at_cycle_start());
        observed.freewheeling.push(self.freewheeling);
        match self.quit_after {
            Some(n) if observed.cycle_starts.len() >= n => Control::Quit,
            _ => Control::Continue,
        }
    }

    fn freewheel_changed(&mut self, freewheeling: bool) {
        self.freewheeling = freewheeling;
        self.push(Notification::Freewheel(freewheeling));
    }

    fn ports_changed(&mut self) {
        self.push(Notification::PortsChanged);
    }

    fn connection_changed(&mut self, a: PortHandle, b: PortHandle, connected: bool) {
        self.push(Notification::Connection(a, b, connected));
    }

    fn latency_changed(&mut self, for_playback: bool) {
        self.push(Notification::Latency(for_playback));
    }
}

impl Recorder {
    fn push(&self, notification: Notification) {
        self.observed.lock().unwrap().notifications.push(notification);
    }
}
