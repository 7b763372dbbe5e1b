//! Synthetic audio/MIDI backend: ports, connection graph, cycle clock and
//! worker thread.
//!
//! # Primary API
//!
//! - [`Backend`] / [`BackendBuilder`]: configuration, lifecycle, port engine
//! - [`ProcessHandler`] / [`ProcessScope`]: the per-cycle callback and its
//!   buffer access
//! - [`PortMatcher`]: name predicates for [`Backend::get_ports`]
//!
//! # Example
//!
//! ```
//! use ersatz_core::{Backend, ClosureProcessHandler, Control, DataType, PortFlags};
//!
//! let backend = Backend::builder().instance_name("synth").buffer_size(128).build()?;
//! let out = backend.register_port("out_L", DataType::Audio, PortFlags::OUTPUT)?;
//!
//! backend.set_process_handler(ClosureProcessHandler::new(move |scope| {
//!     if let Ok(mut buf) = scope.audio_buffer(out) {
//!         buf.fill(0.1);
//!     }
//!     Control::Continue
//! }))?;
//!
//! backend.start(false)?;
//! backend.connect("synth:out_L", "system:playback_1")?;
//! backend.stop()?;
//! # Ok::<(), ersatz_core::Error>(())
//! ```

pub mod error;
pub use error::{ConnectionError, Error, Result};

pub mod catalog;
pub use catalog::DeviceStatus;

pub mod config;
pub use config::{BackendConfig, MidiOption};

mod port;
pub use port::{
    AudioBuffer, ChanCount, DataType, LatencyRange, PortFlags, PortHandle, MAX_BUFFER_SIZE,
};

mod matcher;
pub use matcher::{Exact, PortMatcher, Prefix};

mod registry;
mod graph;

mod lockfree;

mod metering;
pub use metering::{DspLoadMeter, DspMetrics};

mod clock;

mod process;
pub use process::{ClosureProcessHandler, Control, ProcessHandler, ProcessScope};

mod worker;
pub use worker::EngineState;

mod backend;
pub use backend::{Backend, BackendBuilder};

pub use ersatz_midi::{MidiBuffer, MidiEvent};
