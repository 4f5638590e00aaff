use skyripcore::interface::{Burst, CorrelatedEvent};
use skyripcore::processing::{BurstDetector, BurstScorer, Classifier, CorrelationEngine};
use skyripcore::store::{DetectionStore, DeviceStore};
use skyripcore::telemetry::{LogManager, MetricsRecorder};
use std::sync::Arc;

use crate::generator::source::SpectrumSource;
use crate::workflow::config::MonitorConfig;

/// Stores and counters shared between the tick loop, ingest loop and API.
#[derive(Clone)]
pub struct SharedState {
    pub detections: Arc<DetectionStore>,
    pub devices: Arc<DeviceStore>,
    pub metrics: Arc<MetricsRecorder>,
}

impl SharedState {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            detections: Arc::new(DetectionStore::new(config.detections)),
            devices: Arc::new(DeviceStore::new(config.kismet.retention())),
            metrics: Arc::new(MetricsRecorder::new()),
        }
    }
}

/// Everything one tick produced.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub tick: u64,
    pub timestamp: f64,
    pub bursts: Vec<Burst>,
    pub events: Vec<CorrelatedEvent>,
    pub channel_errors: usize,
}

/// Sample → detect → classify → correlate → store, once per tick.
pub struct Runner {
    source: SpectrumSource,
    detector: BurstDetector,
    classifier: Classifier,
    correlator: CorrelationEngine,
    state: SharedState,
    min_confidence: f64,
    tick_seconds: f64,
    start_time: f64,
    tick: u64,
    logger: LogManager,
}

impl Runner {
    pub fn new(config: &MonitorConfig, start_time: f64, state: SharedState) -> Self {
        let classifier_config = config.classifier.normalized();
        let source = SpectrumSource::new(&config.scanner, start_time);
        let tick_seconds = source.config().tick_seconds;
        Self {
            source,
            detector: BurstDetector::new(&config.detector),
            classifier: Classifier::from_config(&classifier_config),
            correlator: CorrelationEngine::new(&config.correlation),
            state,
            min_confidence: classifier_config.min_confidence,
            tick_seconds,
            start_time,
            tick: 0,
            logger: LogManager::new("runner"),
        }
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn ticks_run(&self) -> u64 {
        self.tick
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome {
            tick: self.tick,
            timestamp: self.start_time + self.tick as f64 * self.tick_seconds,
            ..Default::default()
        };
        let metrics = Arc::clone(&self.state.metrics);

        for channel in 0..self.source.channel_count() {
            let sample = match self.source.next_sample(channel) {
                Ok(sample) => sample,
                Err(err) => {
                    self.logger
                        .warn(&format!("tick {}: skipping channel: {}", self.tick, err));
                    metrics.record_channel_error();
                    outcome.channel_errors += 1;
                    continue;
                }
            };
            metrics.record_sample();

            match self.detector.process(&sample) {
                Ok(Some(burst)) => outcome.bursts.push(burst),
                Ok(None) => {}
                Err(err) => {
                    self.logger.warn(&format!("tick {}: {}", self.tick, err));
                    metrics.record_channel_error();
                    outcome.channel_errors += 1;
                }
            }
        }

        if !outcome.bursts.is_empty() {
            let devices = self.state.devices.list();
            for burst in &outcome.bursts {
                metrics.record_burst();
                let detection = self.classifier.classify(burst.clone());
                if detection.confidence < self.min_confidence {
                    metrics.record_filtered();
                    self.logger.trace(&format!(
                        "burst {} below min confidence ({:.3})",
                        burst.id, detection.confidence
                    ));
                    continue;
                }
                let event = self.correlator.correlate(detection, &devices);
                metrics.record_detection(event.is_matched());
                self.state.detections.record(event.clone());
                outcome.events.push(event);
            }
        }

        self.state.detections.prune_expired(outcome.timestamp);
        metrics.record_tick();
        self.tick += 1;
        outcome
    }

    /// Ends the stream: bursts still open are discarded, never stored.
    pub fn finish(&mut self) -> usize {
        let discarded = self.detector.discard_in_progress();
        if discarded > 0 {
            self.logger
                .record(&format!("discarded {} unfinished burst(s)", discarded));
        }
        discarded
    }
}
