//! Read-only descriptive data the backend advertises to hosts.

use serde::{Deserialize, Serialize};

/// Backend name shown to hosts.
pub const BACKEND_NAME: &str = "None (Dummy)";

/// The only simulated device. Inputs deliver silence.
pub const DEVICE_NAME: &str = "Silence";

pub const SAMPLE_RATES: [f32; 9] = [
    8000.0, 22050.0, 24000.0, 44100.0, 48000.0, 88200.0, 96000.0, 176400.0, 192000.0,
];

pub const BUFFER_SIZES: [u32; 10] = [16, 32, 64, 128, 256, 512, 1024, 2048, 4096, 8192];

/// Client name of the backend-owned physical ports.
pub const SYSTEM_PREFIX: &str = "system";

/// Channels per direction a device can provide.
pub const MAX_CHANNELS: u32 = 128;

/// Longest full port name, in bytes.
pub const PORT_NAME_SIZE: usize = 256;

/// A device entry as reported by [`enumerate_devices`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub name: String,
    pub available: bool,
}

pub fn enumerate_devices() -> Vec<DeviceStatus> {
    vec![DeviceStatus {
        name: DEVICE_NAME.to_string(),
        available: true,
    }]
}
