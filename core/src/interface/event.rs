use serde::{Deserialize, Serialize};

use super::{Detection, DeviceSighting};

/// Outcome of joining a detection against the device store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Correlation {
    Matched {
        sighting: DeviceSighting,
        delta_seconds: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        distance_m: Option<f64>,
    },
    Unmatched,
}

/// Detection annotated with its correlation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedEvent {
    pub detection: Detection,
    pub correlation: Correlation,
}

impl CorrelatedEvent {
    pub fn unmatched(detection: Detection) -> Self {
        Self {
            detection,
            correlation: Correlation::Unmatched,
        }
    }

    pub fn matched(&self) -> Option<&DeviceSighting> {
        match &self.correlation {
            Correlation::Matched { sighting, .. } => Some(sighting),
            Correlation::Unmatched => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.matched().is_some()
    }
}
