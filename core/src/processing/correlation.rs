//! Time and geo-fence join between detections and Kismet device sightings.

use std::cmp::Ordering;

use crate::interface::{CorrelatedEvent, Correlation, Detection, DeviceSighting};
use crate::math::geo::haversine_m;
use crate::prelude::{CorrelationConfig, GeoFence};

/// Why a sighting was not considered for a detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Exclusion {
    OutsideWindow,
    OutsideFence,
    PlaceholderPosition,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate<'a> {
    sighting: &'a DeviceSighting,
    delta_seconds: f64,
    distance_m: Option<f64>,
}

pub struct CorrelationEngine {
    config: CorrelationConfig,
}

impl CorrelationEngine {
    pub fn new(config: &CorrelationConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    /// Distance to the fence centre when the sighting passes the geo-fence.
    ///
    /// Sightings without coordinates pass on time alone. Sightings reporting
    /// exactly (0, 0) carry a placeholder fix and never pass an active fence.
    fn fence_check(
        fence: &GeoFence,
        sighting: &DeviceSighting,
    ) -> Result<Option<f64>, Exclusion> {
        match sighting.position() {
            None => Ok(None),
            Some((lat, lon)) if lat == 0.0 && lon == 0.0 => Err(Exclusion::PlaceholderPosition),
            Some((lat, lon)) => {
                let distance = haversine_m(fence.lat, fence.lon, lat, lon);
                if distance <= fence.radius_m {
                    Ok(Some(distance))
                } else {
                    Err(Exclusion::OutsideFence)
                }
            }
        }
    }

    fn candidate<'a>(
        &self,
        detection: &Detection,
        sighting: &'a DeviceSighting,
    ) -> Result<Candidate<'a>, Exclusion> {
        let delta_seconds = (sighting.last_seen - detection.timestamp).abs();
        if delta_seconds.is_nan() || delta_seconds > self.config.window_seconds {
            return Err(Exclusion::OutsideWindow);
        }
        let distance_m = match &self.config.geofence {
            Some(fence) => Self::fence_check(fence, sighting)?,
            None => None,
        };
        Ok(Candidate {
            sighting,
            delta_seconds,
            distance_m,
        })
    }

    /// Reason a sighting would be skipped for this detection, if any.
    pub fn exclusion(&self, detection: &Detection, sighting: &DeviceSighting) -> Option<Exclusion> {
        self.candidate(detection, sighting).err()
    }

    /// Picks the eligible sighting nearest in time; ties go to the smallest MAC.
    pub fn correlate(&self, detection: Detection, sightings: &[DeviceSighting]) -> CorrelatedEvent {
        let best = sightings
            .iter()
            .filter_map(|sighting| self.candidate(&detection, sighting).ok())
            .min_by(|a, b| match a.delta_seconds.total_cmp(&b.delta_seconds) {
                Ordering::Equal => a.sighting.mac.cmp(&b.sighting.mac),
                other => other,
            });

        let correlation = match best {
            Some(candidate) => Correlation::Matched {
                sighting: candidate.sighting.clone(),
                delta_seconds: candidate.delta_seconds,
                distance_m: candidate.distance_m,
            },
            None => Correlation::Unmatched,
        };

        CorrelatedEvent {
            detection,
            correlation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{Burst, Score};

    fn detection_at(timestamp: f64) -> Detection {
        let burst = Burst {
            id: 1,
            channel: 0,
            frequency_mhz: 2442.0,
            start_time: timestamp - 2.0,
            end_time: timestamp,
            peak_power_dbm: -60.0,
            baseline_dbm: -95.0,
            sample_count: 3,
        };
        Detection::from_burst(burst, Score::new(0.9, "drone"), "heuristic-fallback")
    }

    fn sighting(mac: &str, last_seen: f64, position: Option<(f64, f64)>) -> DeviceSighting {
        DeviceSighting {
            mac: mac.into(),
            ssid: None,
            lat: position.map(|p| p.0),
            lon: position.map(|p| p.1),
            last_seen,
        }
    }

    fn fenced(window_seconds: f64) -> CorrelationEngine {
        CorrelationEngine::new(&CorrelationConfig {
            window_seconds,
            geofence: Some(GeoFence {
                lat: 1.0,
                lon: 2.0,
                radius_m: 500.0,
            }),
        })
    }

    #[test]
    fn sighting_within_window_and_fence_matches() {
        let engine = fenced(5.0);
        let store = vec![sighting("AA:BB:CC:DD:EE:FF", 101.0, Some((1.0, 2.0)))];
        let event = engine.correlate(detection_at(100.0), &store);
        assert_eq!(event.matched(), Some(&store[0]));
        match event.correlation {
            Correlation::Matched {
                delta_seconds,
                distance_m,
                ..
            } => {
                assert_eq!(delta_seconds, 1.0);
                assert_eq!(distance_m, Some(0.0));
            }
            Correlation::Unmatched => panic!("expected a match"),
        }
    }

    #[test]
    fn nearest_in_time_wins_and_ties_go_to_smallest_mac() {
        let engine = CorrelationEngine::new(&CorrelationConfig::default());
        let store = vec![
            sighting("CC:00:00:00:00:01", 97.0, None),
            sighting("BB:00:00:00:00:01", 102.0, None),
            sighting("AA:00:00:00:00:01", 98.0, None),
        ];
        let event = engine.correlate(detection_at(100.0), &store);
        assert_eq!(event.matched().map(|s| s.mac.as_str()), Some("AA:00:00:00:00:01"));
    }

    #[test]
    fn out_of_window_sightings_leave_event_unmatched() {
        let engine = CorrelationEngine::new(&CorrelationConfig::default());
        let store = vec![sighting("AA:00:00:00:00:01", 90.0, None)];
        let event = engine.correlate(detection_at(100.0), &store);
        assert!(!event.is_matched());
        assert_eq!(event.correlation, Correlation::Unmatched);
        assert_eq!(
            engine.exclusion(&event.detection, &store[0]),
            Some(Exclusion::OutsideWindow)
        );
    }

    #[test]
    fn fence_excludes_closer_in_time_sighting_outside_radius() {
        let engine = fenced(5.0);
        let store = vec![
            sighting("AA:00:00:00:00:01", 100.0, Some((10.0, 20.0))),
            sighting("BB:00:00:00:00:01", 104.0, Some((1.001, 2.0))),
        ];
        let event = engine.correlate(detection_at(100.0), &store);
        assert_eq!(event.matched().map(|s| s.mac.as_str()), Some("BB:00:00:00:00:01"));
        assert_eq!(
            engine.exclusion(&event.detection, &store[0]),
            Some(Exclusion::OutsideFence)
        );
    }

    #[test]
    fn fence_keeps_sightings_without_position_and_drops_zero_fix() {
        let engine = fenced(5.0);
        let zero = sighting("AA:00:00:00:00:01", 100.0, Some((0.0, 0.0)));
        let unknown = sighting("BB:00:00:00:00:01", 103.0, None);
        let event = engine.correlate(detection_at(100.0), &[zero.clone(), unknown.clone()]);
        assert_eq!(event.matched(), Some(&unknown));
        assert_eq!(
            engine.exclusion(&event.detection, &zero),
            Some(Exclusion::PlaceholderPosition)
        );

        let only_zero = engine.correlate(detection_at(100.0), &[zero]);
        assert!(!only_zero.is_matched());
    }

    #[test]
    fn empty_store_is_a_normal_unmatched_outcome() {
        let engine = CorrelationEngine::new(&CorrelationConfig::default());
        assert!(!engine.correlate(detection_at(100.0), &[]).is_matched());
    }
}
