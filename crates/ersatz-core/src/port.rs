//! Port identity, flags, latency metadata and the two buffer-bearing variants.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

use ersatz_midi::MidiBuffer;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

/// Largest cycle the backend can be configured for, in samples. Every audio
/// port buffer is allocated with this capacity.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Kind of data a port carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Audio,
    Midi,
}

/// Port property bitset. Immutable once the port is created.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PortFlags(u8);

impl PortFlags {
    pub const NONE: Self = Self(0);
    /// Receives data (a sink from the graph's point of view).
    pub const INPUT: Self = Self(1);
    /// Produces data.
    pub const OUTPUT: Self = Self(1 << 1);
    /// Represents (simulated) hardware I/O.
    pub const PHYSICAL: Self = Self(1 << 2);
    /// Data does not flow through the port to anything else.
    pub const TERMINAL: Self = Self(1 << 3);

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn is_input(self) -> bool {
        self.contains(Self::INPUT)
    }

    #[inline]
    pub const fn is_output(self) -> bool {
        self.contains(Self::OUTPUT)
    }

    #[inline]
    pub const fn is_physical(self) -> bool {
        self.contains(Self::PHYSICAL)
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        self.contains(Self::TERMINAL)
    }
}

impl BitOr for PortFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for PortFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PortFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(PortFlags, &str); 4] = [
            (PortFlags::INPUT, "INPUT"),
            (PortFlags::OUTPUT, "OUTPUT"),
            (PortFlags::PHYSICAL, "PHYSICAL"),
            (PortFlags::TERMINAL, "TERMINAL"),
        ];
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Delay in samples attributed to a port, `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LatencyRange {
    pub min: u32,
    pub max: u32,
}

impl LatencyRange {
    /// Bounds are swapped if given in the wrong order.
    pub fn new(a: u32, b: u32) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn fixed(samples: u32) -> Self {
        Self {
            min: samples,
            max: samples,
        }
    }
}

/// Opaque, generational reference to a registered port.
///
/// A handle stays tied to the port it was issued for: once that port is
/// unregistered the handle is rejected, even if the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortHandle {
    index: u32,
    generation: u32,
}

impl PortHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub(crate) fn generation(self) -> u32 {
        self.generation
    }
}

/// Per-type channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChanCount {
    pub audio: u32,
    pub midi: u32,
}

impl ChanCount {
    pub fn get(&self, data_type: DataType) -> u32 {
        match data_type {
            DataType::Audio => self.audio,
            DataType::Midi => self.midi,
        }
    }
}

/// Fixed-capacity sample storage of an audio port.
#[derive(Debug)]
pub struct AudioBuffer {
    samples: Box<[f32]>,
}

impl AudioBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn silence(&mut self) {
        self.samples.fill(0.0);
    }

    /// First `nframes` samples. `nframes` is clamped to the capacity.
    #[inline]
    pub fn frames(&self, nframes: usize) -> &[f32] {
        &self.samples[..nframes.min(self.samples.len())]
    }

    #[inline]
    pub fn frames_mut(&mut self, nframes: usize) -> &mut [f32] {
        let n = nframes.min(self.samples.len());
        &mut self.samples[..n]
    }
}

/// The buffer a port owns, tagged by data type.
///
/// Buffers are shared with the worker's per-cycle snapshot, so a port removed
/// mid-cycle keeps its storage alive until the cycle ends.
#[derive(Debug, Clone)]
pub(crate) enum PortBuffer {
    Audio(Arc<Mutex<AudioBuffer>>),
    Midi(Arc<Mutex<MidiBuffer>>),
}

impl PortBuffer {
    pub(crate) fn new(data_type: DataType, audio_capacity: usize, midi_capacity: usize) -> Self {
        match data_type {
            DataType::Audio => Self::Audio(Arc::new(Mutex::new(AudioBuffer::new(audio_capacity)))),
            DataType::Midi => Self::Midi(Arc::new(Mutex::new(MidiBuffer::new(midi_capacity)))),
        }
    }

    pub(crate) fn data_type(&self) -> DataType {
        match self {
            Self::Audio(_) => DataType::Audio,
            Self::Midi(_) => DataType::Midi,
        }
    }

    /// Cycle-start reset: `nframes` of silence for audio, empty list for MIDI.
    pub(crate) fn clear(&self, nframes: usize) {
        match self {
            Self::Audio(buf) => buf.lock().frames_mut(nframes).fill(0.0),
            Self::Midi(buf) => buf.lock().clear(),
        }
    }
}

/// A registered port. Owned by the registry; addressed through [`PortHandle`].
#[derive(Debug)]
pub(crate) struct Port {
    pub(crate) name: String,
    flags: PortFlags,
    capture_latency: LatencyRange,
    playback_latency: LatencyRange,
    /// Mirrored adjacency; only the graph's link/unlink touch it.
    pub(crate) connections: SmallVec<[PortHandle; 4]>,
    buffer: PortBuffer,
}

impl Port {
    pub(crate) fn new(name: String, flags: PortFlags, buffer: PortBuffer) -> Self {
        Self {
            name,
            flags,
            capture_latency: LatencyRange::default(),
            playback_latency: LatencyRange::default(),
            connections: SmallVec::new(),
            buffer,
        }
    }

    #[inline]
    pub(crate) fn flags(&self) -> PortFlags {
        self.flags
    }

    #[inline]
    pub(crate) fn data_type(&self) -> DataType {
        self.buffer.data_type()
    }

    #[inline]
    pub(crate) fn buffer(&self) -> &PortBuffer {
        &self.buffer
    }

    pub(crate) fn latency_range(&self, for_playback: bool) -> LatencyRange {
        if for_playback {
            self.playback_latency
        } else {
            self.capture_latency
        }
    }

    pub(crate) fn set_latency_range(&mut self, for_playback: bool, range: LatencyRange) {
        if for_playback {
            self.playback_latency = range;
        } else {
            self.capture_latency = range;
        }
    }
}
