use serde::{Deserialize, Serialize};

/// One power reading on a monitored channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumSample {
    pub channel: usize,
    pub timestamp: f64,
    pub frequency_mhz: f64,
    pub power_dbm: f64,
}

impl SpectrumSample {
    pub fn new(channel: usize, timestamp: f64, frequency_mhz: f64, power_dbm: f64) -> Self {
        Self {
            channel,
            timestamp,
            frequency_mhz,
            power_dbm,
        }
    }
}
