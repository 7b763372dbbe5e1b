//! Error types for ersatz-midi.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("MIDI buffer full: {needed} bytes requested, {available} of {capacity} free")]
    BufferFull {
        needed: usize,
        available: usize,
        capacity: usize,
    },

    #[error("MIDI event payload is empty")]
    EmptyEvent,

    #[error("MIDI event index {index} out of range ({count} events)")]
    EventIndex { index: usize, count: usize },

    #[error("MIDI parse error: {0}")]
    Parse(String),
}

impl From<midi_msg::ParseError> for Error {
    fn from(e: midi_msg::ParseError) -> Self {
        Error::Parse(format!("{e:?}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
