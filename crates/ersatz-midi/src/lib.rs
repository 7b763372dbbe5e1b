//! MIDI data types for the ersatz synthetic backend.
//!
//! - [`MidiEvent`]: an immutable, time-stamped MIDI message (timestamp in
//!   samples since the start of the cycle)
//! - [`MidiBuffer`]: the per-port, per-cycle event list with a fixed byte
//!   capacity, always readable in timestamp order
//!
//! # Example
//!
//! ```
//! use ersatz_midi::MidiBuffer;
//!
//! let mut buffer = MidiBuffer::new(1024);
//! buffer.put(50, &[0x90, 60, 100]).unwrap();
//! buffer.put(10, &[0x80, 60, 0]).unwrap();
//!
//! let stamps: Vec<u32> = buffer.iter().map(|e| e.timestamp()).collect();
//! assert_eq!(stamps, vec![10, 50]);
//! ```

pub mod error;
pub use error::{Error, Result};

mod buffer;
mod event;

pub use buffer::{MidiBuffer, DEFAULT_MIDI_CAPACITY};
pub use event::MidiEvent;

pub use midi_msg::{Channel, ChannelVoiceMsg, MidiMsg};
