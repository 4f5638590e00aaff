use serde::{Deserialize, Serialize};

/// Noise and burst-injection settings for one simulated channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelProfile {
    pub frequency_mhz: f64,
    pub noise_floor_dbm: f64,
    /// Half-width of the uniform noise around the floor.
    pub noise_jitter_db: f64,
    /// Chance per sample of starting an injected burst.
    pub burst_probability: f64,
    /// Samples per injected burst.
    pub burst_length: usize,
    pub burst_gain_db: f64,
    /// Sample indexes where a burst is always injected.
    pub scheduled_bursts: Vec<u64>,
}

impl Default for ChannelProfile {
    fn default() -> Self {
        Self {
            frequency_mhz: 2442.0,
            noise_floor_dbm: -95.0,
            noise_jitter_db: 1.0,
            burst_probability: 0.02,
            burst_length: 4,
            burst_gain_db: 25.0,
            scheduled_bursts: Vec::new(),
        }
    }
}

impl ChannelProfile {
    pub fn at(frequency_mhz: f64) -> Self {
        Self {
            frequency_mhz,
            ..Default::default()
        }
    }

    /// Quiet channel: no random bursts.
    pub fn quiet(frequency_mhz: f64) -> Self {
        Self {
            burst_probability: 0.0,
            ..Self::at(frequency_mhz)
        }
    }

    pub fn with_scheduled_burst(mut self, sample_index: u64) -> Self {
        self.scheduled_bursts.push(sample_index);
        self
    }

    fn normalized(&self) -> Self {
        let defaults = Self::default();
        Self {
            frequency_mhz: self.frequency_mhz,
            noise_floor_dbm: self.noise_floor_dbm,
            noise_jitter_db: if self.noise_jitter_db.is_finite() {
                self.noise_jitter_db.abs()
            } else {
                defaults.noise_jitter_db
            },
            burst_probability: if self.burst_probability.is_finite() {
                self.burst_probability.clamp(0.0, 1.0)
            } else {
                0.0
            },
            burst_length: self.burst_length.max(1),
            burst_gain_db: if self.burst_gain_db.is_finite() {
                self.burst_gain_db
            } else {
                defaults.burst_gain_db
            },
            scheduled_bursts: self.scheduled_bursts.clone(),
        }
    }

    /// Reason this channel cannot be sampled, if any.
    pub fn problem(&self) -> Option<String> {
        if !self.frequency_mhz.is_finite() || self.frequency_mhz <= 0.0 {
            return Some(format!("invalid frequency {}", self.frequency_mhz));
        }
        if !self.noise_floor_dbm.is_finite() {
            return Some(format!("invalid noise floor {}", self.noise_floor_dbm));
        }
        None
    }
}

/// Configuration for the simulated spectrum scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub seed: u64,
    pub tick_seconds: f64,
    /// Timestamp of the first sample; wall-clock start when unset.
    pub start_time: Option<f64>,
    pub channels: Vec<ChannelProfile>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            seed: 4242,
            tick_seconds: 1.0,
            start_time: None,
            channels: vec![
                ChannelProfile::at(433.9),
                ChannelProfile::at(915.0),
                ChannelProfile::at(2442.0),
            ],
        }
    }
}

impl ScannerConfig {
    pub fn normalized(&self) -> Self {
        Self {
            seed: self.seed,
            tick_seconds: if self.tick_seconds.is_finite() && self.tick_seconds > 0.0 {
                self.tick_seconds
            } else {
                Self::default().tick_seconds
            },
            start_time: self.start_time.filter(|t| t.is_finite()),
            channels: self.channels.iter().map(ChannelProfile::normalized).collect(),
        }
    }

    pub fn frequencies(&self) -> Vec<f64> {
        self.channels.iter().map(|c| c.frequency_mhz).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_clamps_probability_and_length() {
        let cfg = ScannerConfig {
            tick_seconds: 0.0,
            channels: vec![ChannelProfile {
                burst_probability: 3.0,
                burst_length: 0,
                noise_jitter_db: -2.0,
                ..ChannelProfile::at(100.0)
            }],
            ..Default::default()
        }
        .normalized();
        assert_eq!(cfg.tick_seconds, 1.0);
        assert_eq!(cfg.channels[0].burst_probability, 1.0);
        assert_eq!(cfg.channels[0].burst_length, 1);
        assert_eq!(cfg.channels[0].noise_jitter_db, 2.0);
    }

    #[test]
    fn bad_frequency_is_reported() {
        assert!(ChannelProfile::at(-1.0).problem().is_some());
        assert!(ChannelProfile::at(f64::NAN).problem().is_some());
        assert!(ChannelProfile::at(433.9).problem().is_none());
    }
}
