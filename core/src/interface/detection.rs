use serde::{Deserialize, Serialize};

/// Closed span of elevated power on one channel, emitted by the burst detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Burst {
    pub id: u64,
    pub channel: usize,
    pub frequency_mhz: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub peak_power_dbm: f64,
    /// Rolling mean of the channel when the burst opened.
    pub baseline_dbm: f64,
    pub sample_count: usize,
}

impl Burst {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Peak level above the noise baseline, never negative.
    pub fn excess_db(&self) -> f64 {
        (self.peak_power_dbm - self.baseline_dbm).max(0.0)
    }
}

/// Classifier output for a single burst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub confidence: f64,
    pub label: String,
}

impl Score {
    /// Builds a score with the confidence clamped into `[0, 1]`.
    ///
    /// NaN collapses to zero so a degenerate input can never escape the range.
    pub fn new(confidence: f64, label: impl Into<String>) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            confidence,
            label: label.into(),
        }
    }
}

/// Classified burst, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub burst: Burst,
    pub timestamp: f64,
    pub frequency_mhz: f64,
    pub power_dbm: f64,
    pub confidence: f64,
    pub label: String,
    pub classifier: String,
}

impl Detection {
    pub fn from_burst(burst: Burst, score: Score, classifier: &str) -> Self {
        Self {
            timestamp: burst.end_time,
            frequency_mhz: burst.frequency_mhz,
            power_dbm: burst.peak_power_dbm,
            confidence: score.confidence,
            label: score.label,
            classifier: classifier.to_string(),
            burst,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burst() -> Burst {
        Burst {
            id: 7,
            channel: 1,
            frequency_mhz: 915.0,
            start_time: 10.0,
            end_time: 14.0,
            peak_power_dbm: -60.0,
            baseline_dbm: -95.0,
            sample_count: 4,
        }
    }

    #[test]
    fn score_clamps_out_of_range_confidence() {
        assert_eq!(Score::new(1.7, "drone").confidence, 1.0);
        assert_eq!(Score::new(-0.2, "background").confidence, 0.0);
        assert_eq!(Score::new(f64::NAN, "background").confidence, 0.0);
    }

    #[test]
    fn detection_takes_timing_and_power_from_burst() {
        let detection = Detection::from_burst(burst(), Score::new(0.8, "drone"), "heuristic");
        assert_eq!(detection.timestamp, 14.0);
        assert_eq!(detection.power_dbm, -60.0);
        assert_eq!(detection.frequency_mhz, 915.0);
        assert_eq!(detection.burst.duration(), 4.0);
        assert_eq!(detection.burst.excess_db(), 35.0);
    }
}
