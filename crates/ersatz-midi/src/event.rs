//! Time-stamped MIDI event with an owned byte payload.

use midi_msg::{Channel, ChannelVoiceMsg, ControlChange, MidiMsg};
use smallvec::SmallVec;

use crate::{Error, Result};

/// Payloads up to this many bytes are stored inline (no heap allocation).
const INLINE_BYTES: usize = 4;

/// A MIDI message stamped with its offset (in samples) from the start of the
/// cycle it belongs to.
///
/// Events are immutable once constructed; cloning copies the payload, so a
/// clone never observes later changes to the buffer it came from. Events are
/// ordered by timestamp only (see [`MidiEvent::by_timestamp`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    timestamp: u32,
    data: SmallVec<[u8; INLINE_BYTES]>,
}

impl MidiEvent {
    /// Create an event from raw MIDI bytes.
    ///
    /// Fails with [`Error::EmptyEvent`] if `data` is empty.
    pub fn new(timestamp: u32, data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::EmptyEvent);
        }
        Ok(Self {
            timestamp,
            data: SmallVec::from_slice(data),
        })
    }

    /// Encode a parsed [`MidiMsg`] into an event.
    pub fn from_msg(timestamp: u32, msg: &MidiMsg) -> Result<Self> {
        Self::new(timestamp, &msg.to_midi())
    }

    #[inline]
    pub fn note_on(timestamp: u32, channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel_voice(timestamp, channel, ChannelVoiceMsg::NoteOn { note, velocity })
    }

    #[inline]
    pub fn note_off(timestamp: u32, channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel_voice(timestamp, channel, ChannelVoiceMsg::NoteOff { note, velocity })
    }

    #[inline]
    pub fn control_change(timestamp: u32, channel: u8, control: u8, value: u8) -> Self {
        Self::channel_voice(
            timestamp,
            channel,
            ChannelVoiceMsg::ControlChange {
                control: ControlChange::CC { control, value },
            },
        )
    }

    fn channel_voice(timestamp: u32, channel: u8, msg: ChannelVoiceMsg) -> Self {
        let bytes = MidiMsg::ChannelVoice {
            channel: Channel::from_u8(channel),
            msg,
        }
        .to_midi();
        Self {
            timestamp,
            data: SmallVec::from_vec(bytes),
        }
    }

    /// Offset in samples from the start of the cycle.
    #[inline]
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Parse the payload back into a [`MidiMsg`].
    pub fn to_midi_msg(&self) -> Result<MidiMsg> {
        let (msg, _len) = MidiMsg::from_midi(&self.data)?;
        Ok(msg)
    }

    /// Ordering by timestamp only, ignoring the payload.
    #[inline]
    pub fn by_timestamp(a: &Self, b: &Self) -> core::cmp::Ordering {
        a.timestamp.cmp(&b.timestamp)
    }
}
