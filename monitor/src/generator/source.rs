use rand::{rngs::StdRng, Rng, SeedableRng};
use skyripcore::interface::SpectrumSample;

use crate::generator::profile::ScannerConfig;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("unknown channel {0}")]
    UnknownChannel(usize),
    #[error("channel {channel}: {reason}")]
    InvalidChannel { channel: usize, reason: String },
}

const CHANNEL_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone)]
struct ChannelGenerator {
    rng: StdRng,
    index: u64,
    burst_remaining: usize,
}

/// Seeded synthetic power stream, one independent generator per channel.
///
/// The same seed and channel configuration always reproduce the same samples,
/// regardless of how often the other channels are read.
#[derive(Debug, Clone)]
pub struct SpectrumSource {
    config: ScannerConfig,
    generators: Vec<ChannelGenerator>,
    start_time: f64,
}

impl SpectrumSource {
    pub fn new(config: &ScannerConfig, start_time: f64) -> Self {
        let config = config.normalized();
        let generators = (0..config.channels.len())
            .map(|channel| ChannelGenerator {
                rng: StdRng::seed_from_u64(
                    config.seed ^ (channel as u64 + 1).wrapping_mul(CHANNEL_SEED_STRIDE),
                ),
                index: 0,
                burst_remaining: 0,
            })
            .collect();
        Self {
            config,
            generators,
            start_time,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.config.channels.len()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Produces the next sample on `channel`. A rejected channel keeps its
    /// generator state, so the call can simply be retried later.
    pub fn next_sample(&mut self, channel: usize) -> Result<SpectrumSample, SourceError> {
        let profile = self
            .config
            .channels
            .get(channel)
            .ok_or(SourceError::UnknownChannel(channel))?;
        if let Some(reason) = profile.problem() {
            return Err(SourceError::InvalidChannel { channel, reason });
        }
        let generator = self
            .generators
            .get_mut(channel)
            .ok_or(SourceError::UnknownChannel(channel))?;

        let index = generator.index;
        let roll: f64 = generator.rng.gen();
        let jitter: f64 = generator.rng.gen_range(-1.0..=1.0);

        if generator.burst_remaining == 0
            && (profile.scheduled_bursts.contains(&index) || roll < profile.burst_probability)
        {
            generator.burst_remaining = profile.burst_length;
        }

        let mut power = profile.noise_floor_dbm + jitter * profile.noise_jitter_db;
        if generator.burst_remaining > 0 {
            generator.burst_remaining -= 1;
            power += profile.burst_gain_db;
        }
        generator.index += 1;

        let timestamp = self.start_time + index as f64 * self.config.tick_seconds;
        Ok(SpectrumSample::new(
            channel,
            timestamp,
            profile.frequency_mhz,
            power,
        ))
    }
}
