//! The host callback seam: handler trait and per-cycle scope.

use crate::error::{Error, Result};
use crate::port::{DataType, PortBuffer, PortFlags, PortHandle};
use crate::worker::Shared;
use ersatz_midi::MidiBuffer;
use parking_lot::{MappedMutexGuard, MutexGuard};

/// Returned by [`ProcessHandler::process`] to keep the worker cycling or end it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Host-side cycle callback.
///
/// Every method runs on the worker thread. The notification hooks are called
/// between cycles, never concurrently with `process`.
pub trait ProcessHandler: Send + 'static {
    /// Called once per cycle. Buffers taken from `scope` are only valid for
    /// the duration of the call.
    fn process(&mut self, scope: &ProcessScope<'_>) -> Control;

    fn freewheel_changed(&mut self, _freewheeling: bool) {}

    /// A port was registered, unregistered or renamed.
    fn ports_changed(&mut self) {}

    fn connection_changed(&mut self, _a: PortHandle, _b: PortHandle, _connected: bool) {}

    /// Raised by [`Backend::update_latencies`](crate::Backend::update_latencies);
    /// delivered once for capture (`false`) then once for playback (`true`).
    fn latency_changed(&mut self, _for_playback: bool) {}
}

/// Wraps a closure as a [`ProcessHandler`] with no-op notification hooks.
pub struct ClosureProcessHandler<F> {
    callback: F,
}

impl<F> ClosureProcessHandler<F>
where
    F: FnMut(&ProcessScope<'_>) -> Control + Send + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProcessHandler for ClosureProcessHandler<F>
where
    F: FnMut(&ProcessScope<'_>) -> Control + Send + 'static,
{
    fn process(&mut self, scope: &ProcessScope<'_>) -> Control {
        (self.callback)(scope)
    }
}

/// A port as seen by one cycle: taken from the registry at cycle start.
#[derive(Debug, Clone)]
pub(crate) struct CyclePort {
    pub(crate) generation: u32,
    pub(crate) flags: PortFlags,
    pub(crate) buffer: PortBuffer,
}

/// Access to port buffers and clock state during one cycle.
///
/// Ports registered after the cycle began are not visible until the next
/// cycle. Input buffers always read as silence / no events.
pub struct ProcessScope<'a> {
    shared: &'a Shared,
    ports: &'a [Option<CyclePort>],
    nframes: u32,
    cycle_start: u64,
}

impl<'a> ProcessScope<'a> {
    pub(crate) fn new(
        shared: &'a Shared,
        ports: &'a [Option<CyclePort>],
        nframes: u32,
        cycle_start: u64,
    ) -> Self {
        Self {
            shared,
            ports,
            nframes,
            cycle_start,
        }
    }

    /// Samples in this cycle.
    #[inline]
    pub fn nframes(&self) -> u32 {
        self.nframes
    }

    #[inline]
    pub fn sample_time_at_cycle_start(&self) -> u64 {
        self.cycle_start
    }

    pub fn sample_time(&self) -> u64 {
        self.shared.clock.sample_time()
    }

    pub fn samples_since_cycle_start(&self) -> u32 {
        self.shared.clock.samples_since_cycle_start()
    }

    fn cycle_port(&self, port: PortHandle) -> Result<&CyclePort> {
        self.ports
            .get(port.index())
            .and_then(Option::as_ref)
            .filter(|p| p.generation == port.generation())
            .ok_or(Error::InvalidHandle(port))
    }

    /// Exactly `nframes` samples of an audio port.
    pub fn audio_buffer(&self, port: PortHandle) -> Result<MappedMutexGuard<'_, [f32]>> {
        let p = self.cycle_port(port)?;
        let PortBuffer::Audio(buf) = &p.buffer else {
            return Err(Error::DataTypeMismatch {
                port,
                expected: DataType::Audio,
            });
        };
        let mut guard = buf.try_lock().ok_or(Error::BufferBusy(port))?;
        let nframes = self.nframes as usize;
        if p.flags.is_input() {
            guard.frames_mut(nframes).fill(0.0);
        }
        Ok(MutexGuard::map(guard, |b| b.frames_mut(nframes)))
    }

    /// Event list of a MIDI port.
    pub fn midi_buffer(&self, port: PortHandle) -> Result<MutexGuard<'_, MidiBuffer>> {
        let p = self.cycle_port(port)?;
        let PortBuffer::Midi(buf) = &p.buffer else {
            return Err(Error::DataTypeMismatch {
                port,
                expected: DataType::Midi,
            });
        };
        let mut guard = buf.try_lock().ok_or(Error::BufferBusy(port))?;
        if p.flags.is_input() {
            guard.clear();
        }
        Ok(guard)
    }

    pub fn port_by_name(&self, name: &str) -> Option<PortHandle> {
        self.shared.registry.read().lookup(name)
    }

    pub fn is_connected(&self, port: PortHandle) -> Result<bool> {
        self.shared.registry.read().is_connected(port)
    }

    pub fn is_connected_to(&self, a: PortHandle, b: PortHandle) -> Result<bool> {
        self.shared.registry.read().is_connected_to(a, b)
    }

    pub fn is_physically_connected(&self, port: PortHandle) -> Result<bool> {
        self.shared.registry.read().is_physically_connected(port)
    }
}
