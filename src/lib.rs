//! # Ersatz - synthetic audio/MIDI backend
//!
//! Stands in for sound hardware behind a backend interface: virtual ports,
//! a connection graph, per-cycle audio and MIDI buffers and a clock-paced
//! worker thread, with no device underneath.
//!
//! ## Architecture
//!
//! Ersatz is an umbrella crate over:
//! - **ersatz-core** - port engine, connection graph, cycle clock, worker thread
//! - **ersatz-midi** - time-stamped MIDI events and the per-port event buffer
//!
//! ## Quick Start
//!
//! ```
//! use ersatz::prelude::*;
//!
//! let backend = Backend::builder()
//!     .sample_rate(48000.0)
//!     .buffer_size(256)
//!     .build()?;
//!
//! let midi_out = backend.register_port("midi_out", DataType::Midi, PortFlags::OUTPUT)?;
//! backend.set_process_handler(ClosureProcessHandler::new(move |scope| {
//!     if let Ok(mut events) = scope.midi_buffer(midi_out) {
//!         let _ = events.push(MidiEvent::note_on(0, 0, 60, 100));
//!     }
//!     Control::Continue
//! }))?;
//!
//! backend.start(false)?;
//! backend.stop()?;
//! # Ok::<(), ersatz::Error>(())
//! ```

/// Re-export of ersatz-core for direct access
pub use ersatz_core as core;

/// Re-export of ersatz-midi for direct access
pub use ersatz_midi as midi;

pub use ersatz_core::{
    // Facade
    Backend,
    BackendBuilder,
    BackendConfig,
    MidiOption,
    EngineState,

    // Ports
    ChanCount,
    DataType,
    LatencyRange,
    PortFlags,
    PortHandle,
    MAX_BUFFER_SIZE,

    // Matching
    Exact,
    PortMatcher,
    Prefix,

    // Processing
    ClosureProcessHandler,
    Control,
    ProcessHandler,
    ProcessScope,

    // Metering
    DspMetrics,

    // Catalog
    DeviceStatus,

    // Errors
    ConnectionError,
    Error,
    Result,
};

pub use ersatz_midi::{MidiBuffer, MidiEvent, DEFAULT_MIDI_CAPACITY};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        Backend, BackendConfig, ClosureProcessHandler, Control, DataType, LatencyRange,
        MidiBuffer, MidiEvent, MidiOption, PortFlags, PortHandle, ProcessHandler, ProcessScope,
    };
}
