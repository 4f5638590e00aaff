use serde::{Deserialize, Serialize};
use skyripcore::interface::{CorrelatedEvent, DeviceSighting};
use skyripcore::prelude::GeoFence;
use skyripcore::telemetry::MetricsSnapshot;

/// One entry of `GET /api/detections`, also used for console lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionView {
    pub timestamp: f64,
    pub frequency_mhz: f64,
    pub power_dbm: f64,
    pub confidence: f64,
    pub label: String,
    pub classifier: String,
    pub matched_mac: Option<String>,
}

impl From<&CorrelatedEvent> for DetectionView {
    fn from(event: &CorrelatedEvent) -> Self {
        let detection = &event.detection;
        Self {
            timestamp: detection.timestamp,
            frequency_mhz: detection.frequency_mhz,
            power_dbm: detection.power_dbm,
            confidence: detection.confidence,
            label: detection.label.clone(),
            classifier: detection.classifier.clone(),
            matched_mac: event.matched().map(|s| s.mac.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionsResponse {
    pub detections: Vec<DetectionView>,
}

impl DetectionsResponse {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a CorrelatedEvent>) -> Self {
        Self {
            detections: events.into_iter().map(DetectionView::from).collect(),
        }
    }
}

/// One entry of `GET /api/kismet`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceView {
    pub mac: String,
    pub ssid: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub last_seen: f64,
}

impl From<&DeviceSighting> for DeviceView {
    fn from(sighting: &DeviceSighting) -> Self {
        Self {
            mac: sighting.mac.clone(),
            ssid: sighting.ssid.clone(),
            lat: sighting.lat,
            lon: sighting.lon,
            last_seen: sighting.last_seen,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub devices: Vec<DeviceView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub classifier: String,
    pub metrics: MetricsSnapshot,
    pub geofence: Option<GeoFence>,
}
