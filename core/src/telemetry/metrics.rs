use serde::Serialize;
use std::sync::Mutex;

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub samples: u64,
    pub channel_errors: u64,
    pub bursts: u64,
    pub detections: u64,
    pub filtered_detections: u64,
    pub matched: u64,
    pub kismet_ingested: u64,
    pub kismet_skipped: u64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_tick(&self) {
        self.update(|m| m.ticks += 1);
    }

    pub fn record_sample(&self) {
        self.update(|m| m.samples += 1);
    }

    pub fn record_channel_error(&self) {
        self.update(|m| m.channel_errors += 1);
    }

    pub fn record_burst(&self) {
        self.update(|m| m.bursts += 1);
    }

    pub fn record_detection(&self, matched: bool) {
        self.update(|m| {
            m.detections += 1;
            if matched {
                m.matched += 1;
            }
        });
    }

    pub fn record_filtered(&self) {
        self.update(|m| m.filtered_detections += 1);
    }

    pub fn record_kismet(&self, ingested: usize, skipped: usize) {
        self.update(|m| {
            m.kismet_ingested += ingested as u64;
            m.kismet_skipped += skipped as u64;
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
