//! Backend configuration.

use crate::catalog;
use crate::{Error, Result};
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Physical ports per direction when a channel count of 0 is configured.
pub const DEFAULT_CHANNELS: u32 = 8;

/// Smallest accepted process-thread stack.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Which physical MIDI ports the backend creates on start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MidiOption {
    #[default]
    #[serde(rename = "None")]
    None,
    #[serde(rename = "1 in, 1 out")]
    OneInOneOut,
    #[serde(rename = "2 in, 2 out")]
    TwoInTwoOut,
    #[serde(rename = "4 in, 4 out")]
    FourInFourOut,
}

impl MidiOption {
    pub const ALL: [MidiOption; 4] = [
        MidiOption::None,
        MidiOption::OneInOneOut,
        MidiOption::TwoInTwoOut,
        MidiOption::FourInFourOut,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::OneInOneOut => "1 in, 1 out",
            Self::TwoInTwoOut => "2 in, 2 out",
            Self::FourInFourOut => "4 in, 4 out",
        }
    }

    /// Physical MIDI ports per direction.
    pub fn ports(self) -> u32 {
        match self {
            Self::None => 0,
            Self::OneInOneOut => 1,
            Self::TwoInTwoOut => 2,
            Self::FourInFourOut => 4,
        }
    }
}

impl fmt::Display for MidiOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MidiOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|opt| opt.as_str() == s)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown MIDI option '{s}'")))
    }
}

/// Everything the backend needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Prefix of every port registered by the host (`"<instance>:<short>"`).
    pub instance_name: String,
    pub device_name: String,
    pub sample_rate: f32,
    pub buffer_size: u32,
    /// 0 selects [`DEFAULT_CHANNELS`].
    pub input_channels: u32,
    /// 0 selects [`DEFAULT_CHANNELS`].
    pub output_channels: u32,
    pub systemic_input_latency: u32,
    pub systemic_output_latency: u32,
    pub interleaved: bool,
    pub midi_option: MidiOption,
    pub process_thread_stack_size: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            instance_name: "ersatz".to_string(),
            device_name: catalog::DEVICE_NAME.to_string(),
            sample_rate: 48000.0,
            buffer_size: 1024,
            input_channels: 0,
            output_channels: 0,
            systemic_input_latency: 0,
            systemic_output_latency: 0,
            interleaved: false,
            midi_option: MidiOption::None,
            process_thread_stack_size: 512 * 1024,
        }
    }
}

impl BackendConfig {
    pub fn validate(&self) -> Result<()> {
        validate_instance_name(&self.instance_name)?;
        validate_device_name(&self.device_name)?;
        validate_sample_rate(self.sample_rate)?;
        validate_buffer_size(self.buffer_size)?;
        validate_channels(self.input_channels)?;
        validate_channels(self.output_channels)?;
        if self.process_thread_stack_size < MIN_STACK_SIZE {
            return Err(Error::InvalidConfig(format!(
                "process thread stack size {} below minimum {MIN_STACK_SIZE}",
                self.process_thread_stack_size
            )));
        }
        Ok(())
    }

    /// Capture ports created on start.
    pub fn effective_input_channels(&self) -> u32 {
        if self.input_channels == 0 {
            DEFAULT_CHANNELS
        } else {
            self.input_channels
        }
    }

    /// Playback ports created on start.
    pub fn effective_output_channels(&self) -> u32 {
        if self.output_channels == 0 {
            DEFAULT_CHANNELS
        } else {
            self.output_channels
        }
    }
}

pub(crate) fn validate_instance_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(':') {
        return Err(Error::InvalidConfig(format!(
            "instance name '{name}' must be non-empty and must not contain ':'"
        )));
    }
    if name == catalog::SYSTEM_PREFIX {
        return Err(Error::InvalidConfig(format!(
            "instance name '{name}' is reserved for physical ports"
        )));
    }
    Ok(())
}

pub(crate) fn validate_device_name(name: &str) -> Result<()> {
    if !catalog::enumerate_devices().iter().any(|d| d.name == name) {
        return Err(Error::DeviceUnavailable(name.to_string()));
    }
    Ok(())
}

pub(crate) fn validate_sample_rate(rate: f32) -> Result<()> {
    if !catalog::SAMPLE_RATES.contains(&rate) {
        return Err(Error::InvalidConfig(format!(
            "sample rate {rate} not supported"
        )));
    }
    Ok(())
}

pub(crate) fn validate_buffer_size(size: u32) -> Result<()> {
    if !catalog::BUFFER_SIZES.contains(&size) {
        return Err(Error::InvalidConfig(format!(
            "buffer size {size} must be a power of two between {} and {}",
            catalog::BUFFER_SIZES[0],
            catalog::BUFFER_SIZES[catalog::BUFFER_SIZES.len() - 1],
        )));
    }
    Ok(())
}

pub(crate) fn validate_channels(n: u32) -> Result<()> {
    if n > catalog::MAX_CHANNELS {
        return Err(Error::InvalidConfig(format!(
            "{n} channels exceeds maximum of {}",
            catalog::MAX_CHANNELS
        )));
    }
    Ok(())
}
