//! Error types for ersatz-core.

use thiserror::Error;

use crate::port::{DataType, PortHandle};

/// Why a connection request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    TypeMismatch,
    BothInputs,
    BothOutputs,
    SelfConnection,
    AlreadyConnected,
}

impl core::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let reason = match self {
            Self::TypeMismatch => "ports have different data types",
            Self::BothInputs => "both ports are inputs",
            Self::BothOutputs => "both ports are outputs",
            Self::SelfConnection => "a port cannot connect to itself",
            Self::AlreadyConnected => "ports are already connected",
        };
        f.write_str(reason)
    }
}

/// Error type for backend operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Port name already registered: {0}")]
    DuplicateName(String),

    #[error("Invalid port handle: {0:?}")]
    InvalidHandle(PortHandle),

    #[error("Unknown port: {0}")]
    UnknownPort(String),

    #[error("Invalid port name '{name}': {reason}")]
    InvalidPortName { name: String, reason: &'static str },

    #[error("Invalid port flags: {0}")]
    InvalidFlags(&'static str),

    #[error("Cannot connect '{src}' to '{dst}': {reason}")]
    InvalidConnection {
        src: String,
        dst: String,
        reason: ConnectionError,
    },

    #[error("Port {port:?} is not a {expected:?} port")]
    DataTypeMismatch { port: PortHandle, expected: DataType },

    #[error("Buffer of port {0:?} is already borrowed this cycle")]
    BufferBusy(PortHandle),

    #[error("MIDI: {0}")]
    Midi(#[from] ersatz_midi::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Not permitted while the backend is running: {0}")]
    NotPermittedWhileRunning(&'static str),

    #[error("Backend is not running")]
    NotRunning,

    #[error("Backend is already running")]
    AlreadyRunning,

    #[error("Backend startup failed: {0}")]
    StartupFailed(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Not supported: {0}")]
    NotSupported(&'static str),

    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),

    #[error("Failed to join thread: {0}")]
    ThreadJoin(String),
}

impl Error {
    /// True for [`ersatz_midi::Error::BufferFull`].
    pub fn is_buffer_full(&self) -> bool {
        matches!(self, Error::Midi(ersatz_midi::Error::BufferFull { .. }))
    }
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
