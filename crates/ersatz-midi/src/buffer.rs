//! Per-cycle MIDI event buffer with a fixed byte capacity.

use crate::{Error, MidiEvent, Result};

/// Payload capacity (bytes) of a port's MIDI buffer unless configured otherwise.
pub const DEFAULT_MIDI_CAPACITY: usize = 8192;

/// Events reserved up front so typical cycles never reallocate.
const RESERVED_EVENTS: usize = 256;

/// The MIDI buffer owned by a MIDI port.
///
/// Events are kept sorted by timestamp at all times. Inserting an event whose
/// timestamp is earlier than ones already present places it in order; events
/// with equal timestamps keep their insertion order. The buffer is cleared by
/// the backend at the start of every cycle.
#[derive(Debug, Clone)]
pub struct MidiBuffer {
    events: Vec<MidiEvent>,
    bytes_used: usize,
    capacity: usize,
}

impl MidiBuffer {
    /// Create a buffer that accepts up to `capacity` payload bytes per cycle.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(RESERVED_EVENTS.min(capacity)),
            bytes_used: 0,
            capacity,
        }
    }

    /// Insert raw MIDI bytes at `timestamp` (`midi_event_put`).
    pub fn put(&mut self, timestamp: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::EmptyEvent);
        }
        self.reserve_bytes(data.len())?;
        let event = MidiEvent::new(timestamp, data)?;
        self.insert_sorted(event);
        Ok(())
    }

    /// Insert an already constructed event.
    pub fn push(&mut self, event: MidiEvent) -> Result<()> {
        self.reserve_bytes(event.size())?;
        self.insert_sorted(event);
        Ok(())
    }

    /// Event at `index` in ascending timestamp order (`midi_event_get`).
    pub fn get(&self, index: usize) -> Result<&MidiEvent> {
        self.events.get(index).ok_or(Error::EventIndex {
            index,
            count: self.events.len(),
        })
    }

    /// Number of events (`get_midi_event_count`).
    #[inline]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove every event (`midi_clear`). Keeps the allocation.
    pub fn clear(&mut self) {
        self.events.clear();
        self.bytes_used = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &MidiEvent> {
        self.events.iter()
    }

    #[inline]
    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn reserve_bytes(&mut self, needed: usize) -> Result<()> {
        let available = self.capacity - self.bytes_used;
        if needed > available {
            return Err(Error::BufferFull {
                needed,
                available,
                capacity: self.capacity,
            });
        }
        self.bytes_used += needed;
        Ok(())
    }

    fn insert_sorted(&mut self, event: MidiEvent) {
        let ts = event.timestamp();
        // Append fast path: events usually arrive in order.
        if self.events.last().map_or(true, |last| last.timestamp() <= ts) {
            self.events.push(event);
            return;
        }
        let pos = self.events.partition_point(|e| e.timestamp() <= ts);
        self.events.insert(pos, event);
    }
}

impl Default for MidiBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MIDI_CAPACITY)
    }
}

impl<'a> IntoIterator for &'a MidiBuffer {
    type Item = &'a MidiEvent;
    type IntoIter = core::slice::Iter<'a, MidiEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
