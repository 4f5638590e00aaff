use serde::{Deserialize, Serialize};

/// Latest known state of a Wi-Fi device reported by Kismet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSighting {
    pub mac: String,
    pub ssid: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub last_seen: f64,
}

impl DeviceSighting {
    /// Both coordinates, if the sighting carries a position.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}
