//! Adaptive burst detection.
//!
//! Every channel runs its own two-state machine over a rolling baseline of the
//! last K samples. A burst opens after M consecutive samples above
//! `mean + t·stddev` and closes after M consecutive samples back below it.
//!
//! Samples of a short burst stay out of the window so the burst does not raise
//! its own threshold. Once a channel has been active for more than K samples
//! every sample enters the window again, so a lasting change of the noise
//! floor becomes the new baseline and closes the burst.

use std::collections::BTreeMap;

use crate::interface::{Burst, SpectrumSample};
use crate::math::stats::RollingStats;
use crate::prelude::DetectorConfig;
use crate::telemetry::log::LogManager;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("channel {channel}: timestamp {timestamp} precedes {previous}")]
    NonMonotonic {
        channel: usize,
        timestamp: f64,
        previous: f64,
    },
    #[error("channel {channel}: non-finite power reading {power}")]
    NonFinitePower { channel: usize, power: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Active,
}

/// Consecutive above-threshold samples seen while idle.
#[derive(Debug, Clone, Copy, Default)]
struct Run {
    count: usize,
    start_time: f64,
    peak: f64,
}

#[derive(Debug, Clone, Copy)]
struct OpenBurst {
    start_time: f64,
    peak: f64,
    baseline: f64,
    sample_count: usize,
    below: usize,
    closing_since: f64,
    /// Samples seen since the burst opened.
    held: usize,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle(Run),
    Active(OpenBurst),
}

#[derive(Debug, Clone)]
struct ChannelTracker {
    baseline: RollingStats,
    phase: Phase,
    last_timestamp: Option<f64>,
}

impl ChannelTracker {
    fn new(window: usize) -> Self {
        Self {
            baseline: RollingStats::new(window),
            phase: Phase::Idle(Run::default()),
            last_timestamp: None,
        }
    }

    fn state(&self) -> ChannelState {
        match self.phase {
            Phase::Idle(_) => ChannelState::Idle,
            Phase::Active(_) => ChannelState::Active,
        }
    }
}

fn adaptive_threshold(config: &DetectorConfig, baseline: &RollingStats) -> f64 {
    baseline.mean() + config.threshold_multiplier * baseline.stddev().max(config.min_stddev_db)
}

/// Per-channel hysteresis burst detector.
pub struct BurstDetector {
    config: DetectorConfig,
    channels: BTreeMap<usize, ChannelTracker>,
    next_id: u64,
    logger: LogManager,
}

impl BurstDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            config: config.normalized(),
            channels: BTreeMap::new(),
            next_id: 0,
            logger: LogManager::new("detector"),
        }
    }

    pub fn state(&self, channel: usize) -> Option<ChannelState> {
        self.channels.get(&channel).map(ChannelTracker::state)
    }

    /// Current detection threshold for a channel, `None` until its window is full.
    pub fn threshold(&self, channel: usize) -> Option<f64> {
        let tracker = self.channels.get(&channel)?;
        tracker
            .baseline
            .is_full()
            .then(|| adaptive_threshold(&self.config, &tracker.baseline))
    }

    /// Feeds one sample and returns a burst when this sample closes one.
    pub fn process(&mut self, sample: &SpectrumSample) -> Result<Option<Burst>, DetectorError> {
        if !sample.power_dbm.is_finite() {
            return Err(DetectorError::NonFinitePower {
                channel: sample.channel,
                power: sample.power_dbm,
            });
        }

        let window = self.config.window;
        let hysteresis = self.config.hysteresis;
        let tracker = self
            .channels
            .entry(sample.channel)
            .or_insert_with(|| ChannelTracker::new(window));

        if let Some(previous) = tracker.last_timestamp {
            if sample.timestamp < previous {
                return Err(DetectorError::NonMonotonic {
                    channel: sample.channel,
                    timestamp: sample.timestamp,
                    previous,
                });
            }
        }
        tracker.last_timestamp = Some(sample.timestamp);

        if !tracker.baseline.is_full() {
            tracker.baseline.push(sample.power_dbm);
            return Ok(None);
        }

        let baseline_mean = tracker.baseline.mean();
        let threshold = adaptive_threshold(&self.config, &tracker.baseline);
        let above = sample.power_dbm > threshold;

        match &mut tracker.phase {
            Phase::Idle(run) => {
                if !above {
                    *run = Run::default();
                    tracker.baseline.push(sample.power_dbm);
                    return Ok(None);
                }
                if run.count == 0 {
                    run.start_time = sample.timestamp;
                    run.peak = sample.power_dbm;
                } else {
                    run.peak = run.peak.max(sample.power_dbm);
                }
                run.count += 1;

                if run.count >= hysteresis {
                    let opened = OpenBurst {
                        start_time: run.start_time,
                        peak: run.peak,
                        baseline: baseline_mean,
                        sample_count: run.count,
                        below: 0,
                        closing_since: run.start_time,
                        held: 0,
                    };
                    tracker.phase = Phase::Active(opened);
                    self.logger.trace(&format!(
                        "channel {} active at {:.3} (threshold {:.2} dBm)",
                        sample.channel, sample.timestamp, threshold
                    ));
                }
                Ok(None)
            }
            Phase::Active(open) => {
                open.held += 1;
                if open.held > window {
                    tracker.baseline.push(sample.power_dbm);
                }
                if above {
                    open.below = 0;
                    open.peak = open.peak.max(sample.power_dbm);
                    open.sample_count += 1;
                    return Ok(None);
                }
                if open.below == 0 {
                    open.closing_since = sample.timestamp;
                }
                open.below += 1;
                if open.below < hysteresis {
                    return Ok(None);
                }

                let burst = Burst {
                    id: self.next_id,
                    channel: sample.channel,
                    frequency_mhz: sample.frequency_mhz,
                    start_time: open.start_time,
                    end_time: open.closing_since.max(open.start_time),
                    peak_power_dbm: open.peak,
                    baseline_dbm: open.baseline,
                    sample_count: open.sample_count,
                };
                self.next_id += 1;
                tracker.phase = Phase::Idle(Run::default());
                Ok(Some(burst))
            }
        }
    }

    /// Drops every burst still open, as when the stream ends. Returns how many.
    pub fn discard_in_progress(&mut self) -> usize {
        let mut discarded = 0;
        for (channel, tracker) in self.channels.iter_mut() {
            if let Phase::Active(open) = tracker.phase {
                self.logger.trace(&format!(
                    "discarding unfinished burst on channel {} opened at {:.3}",
                    channel, open.start_time
                ));
                tracker.phase = Phase::Idle(Run::default());
                discarded += 1;
            }
        }
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(window: usize, hysteresis: usize) -> DetectorConfig {
        DetectorConfig {
            window,
            threshold_multiplier: 3.0,
            hysteresis,
            min_stddev_db: 0.5,
        }
    }

    fn feed(detector: &mut BurstDetector, powers: &[f64]) -> Vec<(usize, Burst)> {
        powers
            .iter()
            .enumerate()
            .filter_map(|(idx, &power)| {
                let sample = SpectrumSample::new(0, idx as f64, 433.9, power);
                detector.process(&sample).unwrap().map(|burst| (idx, burst))
            })
            .collect()
    }

    fn noise_at(floor: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| floor + if i % 2 == 0 { 0.3 } else { -0.3 })
            .collect()
    }

    fn noise(len: usize) -> Vec<f64> {
        noise_at(-95.0, len)
    }

    #[test]
    fn warm_up_never_flags_a_burst() {
        let mut detector = BurstDetector::new(&config(10, 2));
        let mut powers = vec![-95.0; 3];
        powers.extend([-40.0; 6]);
        assert!(feed(&mut detector, &powers).is_empty());
        assert_eq!(detector.state(0), Some(ChannelState::Idle));
        assert_eq!(detector.threshold(0), None);
    }

    #[test]
    fn constant_input_stays_idle() {
        let mut detector = BurstDetector::new(&config(10, 2));
        assert!(feed(&mut detector, &[0.1; 500]).is_empty());
        assert_eq!(detector.state(0), Some(ChannelState::Idle));
    }

    #[test]
    fn burst_spans_the_elevated_samples() {
        let mut detector = BurstDetector::new(&config(10, 2));
        let mut powers = noise(15);
        powers.extend([-60.0, -55.0, -50.0, -58.0, -61.0]);
        powers.extend(noise(6));

        let bursts = feed(&mut detector, &powers);
        assert_eq!(bursts.len(), 1);
        let (emitted_at, burst) = &bursts[0];
        assert_eq!(*emitted_at, 21);
        assert_eq!(burst.start_time, 15.0);
        assert_eq!(burst.end_time, 20.0);
        assert!(burst.end_time > burst.start_time);
        assert_eq!(burst.peak_power_dbm, -50.0);
        assert_eq!(burst.sample_count, 5);
        assert!((burst.baseline_dbm + 95.0).abs() < 0.5);
    }

    #[test]
    fn single_sample_spike_does_not_open_a_burst() {
        let mut detector = BurstDetector::new(&config(10, 2));
        let mut powers = noise(12);
        powers.push(-40.0);
        powers.extend(noise(10));
        assert!(feed(&mut detector, &powers).is_empty());
    }

    #[test]
    fn single_dip_while_active_does_not_close() {
        let mut detector = BurstDetector::new(&config(10, 2));
        let mut powers = noise(10);
        powers.extend([-50.0, -50.0, -95.0, -50.0, -50.0]);
        powers.extend(noise(4));
        let bursts = feed(&mut detector, &powers);
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].1.start_time, 10.0);
        assert_eq!(bursts[0].1.end_time, 15.0);
        assert_eq!(bursts[0].1.sample_count, 4);
    }

    #[test]
    fn stream_ending_while_active_discards_burst() {
        let mut detector = BurstDetector::new(&config(10, 2));
        let mut powers = noise(10);
        powers.extend([-50.0; 4]);
        assert!(feed(&mut detector, &powers).is_empty());
        assert_eq!(detector.state(0), Some(ChannelState::Active));
        assert_eq!(detector.discard_in_progress(), 1);
        assert_eq!(detector.state(0), Some(ChannelState::Idle));
    }

    #[test]
    fn consecutive_bursts_get_increasing_ids() {
        let mut detector = BurstDetector::new(&config(10, 2));
        let mut powers = noise(10);
        powers.extend([-50.0; 3]);
        powers.extend(noise(4));
        powers.extend([-52.0; 3]);
        powers.extend(noise(4));
        let bursts = feed(&mut detector, &powers);
        assert_eq!(bursts.len(), 2);
        assert_eq!(bursts[0].1.id, 0);
        assert_eq!(bursts[1].1.id, 1);
    }

    #[test]
    fn out_of_order_sample_is_rejected() {
        let mut detector = BurstDetector::new(&config(4, 1));
        detector
            .process(&SpectrumSample::new(2, 5.0, 915.0, -90.0))
            .unwrap();
        let err = detector
            .process(&SpectrumSample::new(2, 4.0, 915.0, -90.0))
            .unwrap_err();
        assert!(matches!(err, DetectorError::NonMonotonic { channel: 2, .. }));
        assert!(detector
            .process(&SpectrumSample::new(2, 5.0, 915.0, -90.0))
            .is_ok());
    }

    #[test]
    fn channels_are_tracked_independently() {
        let mut detector = BurstDetector::new(&config(4, 1));
        for idx in 0..4 {
            detector
                .process(&SpectrumSample::new(0, idx as f64, 433.9, -95.0))
                .unwrap();
        }
        assert!(detector.threshold(0).is_some());
        assert!(detector.threshold(1).is_none());
        assert!(detector
            .process(&SpectrumSample::new(1, 0.0, 915.0, f64::INFINITY))
            .is_err());
    }

    #[test]
    fn lasting_floor_step_yields_one_burst_and_recovers() {
        let mut detector = BurstDetector::new(&config(10, 2));
        let mut powers = noise(20);
        powers.extend(noise_at(-80.0, 1980));

        let bursts = feed(&mut detector, &powers);
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].1.start_time, 20.0);
        assert_eq!(detector.state(0), Some(ChannelState::Idle));
        let threshold = detector.threshold(0).unwrap();
        assert!((threshold + 78.5).abs() < 1e-6, "threshold {threshold}");
    }

    #[test]
    fn burst_on_shifted_floor_uses_new_baseline() {
        let mut detector = BurstDetector::new(&config(10, 2));
        let mut powers = noise(20);
        powers.extend(noise_at(-80.0, 200));
        powers.extend([-55.0; 4]);
        powers.extend(noise_at(-80.0, 6));

        let bursts = feed(&mut detector, &powers);
        assert_eq!(bursts.len(), 2);
        let (emitted_at, burst) = &bursts[1];
        assert_eq!(*emitted_at, 225);
        assert_eq!(burst.start_time, 220.0);
        assert_eq!(burst.end_time, 224.0);
        assert_eq!(burst.sample_count, 4);
        assert!((burst.baseline_dbm + 80.0).abs() < 0.5);
        assert_eq!(detector.state(0), Some(ChannelState::Idle));
    }
}
