use anyhow::Context;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use skyripcore::prelude::{
    ClassifierConfig, CorrelationConfig, DetectorConfig, RetentionPolicy,
};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::generator::profile::ScannerConfig;

const SECTIONS: [&str; 7] = [
    "scanner",
    "detector",
    "classifier",
    "kismet",
    "correlation",
    "detections",
    "api",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KismetConfig {
    pub data_path: PathBuf,
    pub poll_seconds: f64,
    pub stale_after_seconds: f64,
    pub capacity: usize,
}

impl Default for KismetConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/kismet_devices.jsonl"),
            poll_seconds: 5.0,
            stale_after_seconds: 300.0,
            capacity: 512,
        }
    }
}

impl KismetConfig {
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::with_capacity(self.capacity).with_ttl(self.stale_after_seconds)
    }

    fn normalized(&self) -> Self {
        let defaults = Self::default();
        let positive = |value: f64, fallback: f64| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };
        Self {
            data_path: self.data_path.clone(),
            poll_seconds: positive(self.poll_seconds, defaults.poll_seconds),
            stale_after_seconds: positive(self.stale_after_seconds, defaults.stale_after_seconds),
            capacity: self.capacity.max(1),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind: SocketAddr,
    /// Most recent detections returned by the API and offline report.
    pub limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 9000)),
            limit: 15,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub scanner: ScannerConfig,
    pub detector: DetectorConfig,
    pub classifier: ClassifierConfig,
    pub kismet: KismetConfig,
    pub correlation: CorrelationConfig,
    pub detections: RetentionPolicy,
    pub api: ApiConfig,
}

/// Deserializes one top-level section. Keys that fail to deserialize are
/// dropped with a warning and take their default; valid siblings are kept.
fn section<T: DeserializeOwned + Serialize + Default>(map: &Mapping, key: &str) -> T {
    let value = match map.get(key) {
        None | Some(Value::Null) => return T::default(),
        Some(value) => value,
    };
    if let Ok(parsed) = serde_yaml::from_value(value.clone()) {
        return parsed;
    }
    let (Value::Mapping(fields), Ok(Value::Mapping(mut merged))) =
        (value, serde_yaml::to_value(T::default()))
    else {
        warn!("config section `{}` is not a mapping; using defaults", key);
        return T::default();
    };

    for (field, field_value) in fields {
        let mut candidate = merged.clone();
        candidate.insert(field.clone(), field_value.clone());
        match serde_yaml::from_value::<T>(Value::Mapping(candidate.clone())) {
            Ok(_) => merged = candidate,
            Err(err) => warn!(
                "config field `{}.{}` is invalid ({}); using its default",
                key,
                field.as_str().unwrap_or("?"),
                err
            ),
        }
    }
    serde_yaml::from_value(Value::Mapping(merged)).unwrap_or_default()
}

fn adjusted<T: PartialEq>(key: &str, raw: T, normalized: T) -> T {
    if raw != normalized {
        warn!("config section `{}` had out-of-range values; adjusted", key);
    }
    normalized
}

impl MonitorConfig {
    /// Reads the YAML file at `path`. The file itself is mandatory; invalid
    /// sections inside it fall back to their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading monitor config {}", path_ref.display()))?;
        let value: Value = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing monitor config {}", path_ref.display()))?;
        Ok(Self::from_value(value))
    }

    pub fn from_value(value: Value) -> Self {
        let map = match value {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            other => {
                warn!("config root is not a mapping ({:?}); using defaults", other);
                Mapping::new()
            }
        };
        for key in map.keys() {
            if !key.as_str().is_some_and(|k| SECTIONS.contains(&k)) {
                debug!("ignoring unknown config key {:?}", key);
            }
        }

        let raw = Self {
            scanner: section(&map, "scanner"),
            detector: section(&map, "detector"),
            classifier: section(&map, "classifier"),
            kismet: section(&map, "kismet"),
            correlation: section(&map, "correlation"),
            detections: section(&map, "detections"),
            api: section(&map, "api"),
        };
        raw.normalized()
    }

    pub fn normalized(self) -> Self {
        Self {
            scanner: adjusted("scanner", self.scanner.clone(), self.scanner.normalized()),
            detector: adjusted("detector", self.detector.clone(), self.detector.normalized()),
            classifier: adjusted(
                "classifier",
                self.classifier.clone(),
                self.classifier.normalized(),
            ),
            kismet: adjusted("kismet", self.kismet.clone(), self.kismet.normalized()),
            correlation: adjusted(
                "correlation",
                self.correlation.clone(),
                self.correlation.normalized(),
            ),
            detections: adjusted("detections", self.detections, self.detections.normalized()),
            api: self.api,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        if let Some(seed) = seed {
            self.scanner.seed = seed;
        }
        self
    }
}
