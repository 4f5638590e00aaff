use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::interface::{
    Burst, CorrelatedEvent, Correlation, Detection, DeviceSighting, Score, SpectrumSample,
};

/// Records that carry a time used for TTL eviction.
pub trait Timestamped {
    fn timestamp(&self) -> f64;
}

impl Timestamped for DeviceSighting {
    fn timestamp(&self) -> f64 {
        self.last_seen
    }
}

impl Timestamped for CorrelatedEvent {
    fn timestamp(&self) -> f64 {
        self.detection.timestamp
    }
}

/// Rolling-baseline and hysteresis parameters for the burst detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Rolling window size (K).
    pub window: usize,
    /// Threshold multiplier on the standard deviation (t).
    pub threshold_multiplier: f64,
    /// Consecutive samples needed to open or close a burst (M).
    pub hysteresis: usize,
    /// Floor applied to the standard deviation when forming the threshold.
    pub min_stddev_db: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window: 10,
            threshold_multiplier: 3.0,
            hysteresis: 2,
            min_stddev_db: 0.75,
        }
    }
}

impl DetectorConfig {
    pub fn normalized(&self) -> Self {
        let defaults = Self::default();
        Self {
            window: self.window.max(2),
            threshold_multiplier: if self.threshold_multiplier.is_finite()
                && self.threshold_multiplier > 0.0
            {
                self.threshold_multiplier
            } else {
                defaults.threshold_multiplier
            },
            hysteresis: self.hysteresis.max(1),
            min_stddev_db: if self.min_stddev_db.is_finite() {
                self.min_stddev_db.max(0.0)
            } else {
                defaults.min_stddev_db
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Checkpoint for the model variant; `None` selects the heuristic directly.
    pub model_path: Option<PathBuf>,
    /// Detections scoring below this are dropped.
    pub min_confidence: f64,
    /// Confidence at which a burst is labelled as a drone.
    pub label_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            min_confidence: 0.0,
            label_threshold: 0.5,
        }
    }
}

impl ClassifierConfig {
    pub fn normalized(&self) -> Self {
        let clamp = |value: f64, fallback: f64| {
            if value.is_finite() {
                value.clamp(0.0, 1.0)
            } else {
                fallback
            }
        };
        Self {
            model_path: self.model_path.clone(),
            min_confidence: clamp(self.min_confidence, 0.0),
            label_threshold: clamp(self.label_threshold, 0.5),
        }
    }
}

/// Circular area gating correlation matches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFence {
    pub lat: f64,
    pub lon: f64,
    pub radius_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Maximum |Δt| in seconds between detection and sighting (T).
    pub window_seconds: f64,
    pub geofence: Option<GeoFence>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            window_seconds: 5.0,
            geofence: None,
        }
    }
}

impl CorrelationConfig {
    pub fn normalized(&self) -> Self {
        Self {
            window_seconds: if self.window_seconds.is_finite() {
                self.window_seconds.max(0.0)
            } else {
                Self::default().window_seconds
            },
            geofence: self
                .geofence
                .filter(|fence| fence.radius_m.is_finite() && fence.radius_m >= 0.0),
        }
    }
}

/// Bounds applied to a snapshot store. Both limits may be active at once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    pub capacity: usize,
    pub ttl_seconds: Option<f64>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl_seconds: None,
        }
    }
}

impl RetentionPolicy {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl_seconds: None,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: f64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    pub fn normalized(&self) -> Self {
        Self {
            capacity: self.capacity.max(1),
            ttl_seconds: self
                .ttl_seconds
                .filter(|ttl| ttl.is_finite() && *ttl >= 0.0),
        }
    }
}
