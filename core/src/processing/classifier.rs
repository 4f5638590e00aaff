//! Burst scoring.
//!
//! Two variants sit behind [`BurstScorer`]: a small dense network loaded from a
//! JSON checkpoint and a rule-based fallback. [`Classifier::from_config`]
//! picks one at startup and the choice is fixed for the rest of the run.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::interface::{Burst, Detection, Score};
use crate::math::matrix::MatrixHelper;
use crate::prelude::ClassifierConfig;
use crate::telemetry::log::LogManager;

pub const FEATURE_COUNT: usize = 4;
pub const DRONE_LABEL: &str = "drone";
pub const BACKGROUND_LABEL: &str = "background";
pub const HEURISTIC_NAME: &str = "heuristic-fallback";
const FALLBACK_WARNING: &str = "model-fallback";

#[derive(thiserror::Error, Debug)]
pub enum ClassifierError {
    #[error("checkpoint {path} not found")]
    Missing { path: String },
    #[error("checkpoint {path} is empty")]
    Empty { path: String },
    #[error("failed to read checkpoint {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse checkpoint {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("checkpoint shape mismatch: {0}")]
    Shape(String),
}

/// Common scoring interface for both classifier variants.
pub trait BurstScorer {
    fn name(&self) -> &str;
    fn score(&self, burst: &Burst) -> Score;
}

/// Feature vector fed to the model: excess over baseline (per 10 dB), duration
/// in seconds, absolute peak level relative to -100 dBm (per 10 dB) and a
/// frequency harmonic in `[0, 1]`.
pub fn burst_features(burst: &Burst) -> [f64; FEATURE_COUNT] {
    [
        burst.excess_db() / 10.0,
        burst.duration().max(0.0),
        (burst.peak_power_dbm + 100.0) / 10.0,
        0.5 + 0.5 * (burst.frequency_mhz / 25.0).sin(),
    ]
}

fn scored(raw: f64, label_threshold: f64) -> Score {
    let mut score = Score::new(raw, BACKGROUND_LABEL);
    if score.confidence >= label_threshold {
        score.label = DRONE_LABEL.to_string();
    }
    score
}

/// On-disk checkpoint: one ReLU hidden layer and a sigmoid output unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    pub hidden_weights: Vec<Vec<f64>>,
    pub hidden_bias: Vec<f64>,
    pub output_weights: Vec<f64>,
    pub output_bias: f64,
}

pub struct ModelClassifier {
    name: String,
    hidden: Array2<f64>,
    hidden_bias: Array1<f64>,
    output: Array1<f64>,
    output_bias: f64,
    label_threshold: f64,
}

impl ModelClassifier {
    pub fn load<P: AsRef<Path>>(path: P, label_threshold: f64) -> Result<Self, ClassifierError> {
        let path_ref = path.as_ref();
        let display = path_ref.display().to_string();
        let contents = fs::read_to_string(path_ref).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ClassifierError::Missing {
                    path: display.clone(),
                }
            } else {
                ClassifierError::Read {
                    path: display.clone(),
                    source,
                }
            }
        })?;
        if contents.trim().is_empty() {
            return Err(ClassifierError::Empty { path: display });
        }
        let checkpoint: Checkpoint =
            serde_json::from_str(&contents).map_err(|source| ClassifierError::Parse {
                path: display,
                source,
            })?;
        Self::from_checkpoint(checkpoint, label_threshold)
    }

    pub fn from_checkpoint(
        checkpoint: Checkpoint,
        label_threshold: f64,
    ) -> Result<Self, ClassifierError> {
        let units = checkpoint.hidden_weights.len();
        if units == 0 {
            return Err(ClassifierError::Shape("no hidden units".into()));
        }
        if let Some(row) = checkpoint
            .hidden_weights
            .iter()
            .position(|row| row.len() != FEATURE_COUNT)
        {
            return Err(ClassifierError::Shape(format!(
                "hidden row {} has {} weights, expected {}",
                row,
                checkpoint.hidden_weights[row].len(),
                FEATURE_COUNT
            )));
        }
        if checkpoint.hidden_bias.len() != units || checkpoint.output_weights.len() != units {
            return Err(ClassifierError::Shape(format!(
                "expected {} hidden biases and output weights, got {} and {}",
                units,
                checkpoint.hidden_bias.len(),
                checkpoint.output_weights.len()
            )));
        }

        let flat: Vec<f64> = checkpoint.hidden_weights.into_iter().flatten().collect();
        let all_finite = flat
            .iter()
            .chain(&checkpoint.hidden_bias)
            .chain(&checkpoint.output_weights)
            .chain(std::iter::once(&checkpoint.output_bias))
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ClassifierError::Shape("non-finite parameter".into()));
        }

        let hidden = Array2::from_shape_vec((units, FEATURE_COUNT), flat)
            .map_err(|err| ClassifierError::Shape(err.to_string()))?;

        Ok(Self {
            name: format!("mlp:{}", checkpoint.name),
            hidden,
            hidden_bias: Array1::from(checkpoint.hidden_bias),
            output: Array1::from(checkpoint.output_weights),
            output_bias: checkpoint.output_bias,
            label_threshold,
        })
    }
}

impl BurstScorer for ModelClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, burst: &Burst) -> Score {
        let features = Array1::from(burst_features(burst).to_vec());
        let hidden = MatrixHelper::relu(MatrixHelper::affine(
            &self.hidden,
            features.view(),
            &self.hidden_bias,
        ));
        let logit = self.output.dot(&hidden) + self.output_bias;
        scored(MatrixHelper::sigmoid(logit), self.label_threshold)
    }
}

/// Rule-based scorer: stronger and longer bursts score higher.
pub struct HeuristicClassifier {
    label_threshold: f64,
}

impl HeuristicClassifier {
    pub const STRENGTH_SPAN_DB: f64 = 30.0;
    pub const PERSISTENCE_SPAN_S: f64 = 5.0;

    pub fn new(label_threshold: f64) -> Self {
        Self { label_threshold }
    }
}

impl BurstScorer for HeuristicClassifier {
    fn name(&self) -> &str {
        HEURISTIC_NAME
    }

    fn score(&self, burst: &Burst) -> Score {
        let strength = (burst.excess_db() / Self::STRENGTH_SPAN_DB).clamp(0.0, 1.0);
        let persistence = (burst.duration() / Self::PERSISTENCE_SPAN_S).clamp(0.0, 1.0);
        scored(0.65 * strength + 0.35 * persistence, self.label_threshold)
    }
}

/// Scorer variant resolved once at startup.
pub enum Classifier {
    Model(ModelClassifier),
    Heuristic(HeuristicClassifier),
}

impl Classifier {
    /// Loads the configured checkpoint, falling back to the heuristic when it
    /// is absent or unusable. Never fails.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let config = config.normalized();
        let logger = LogManager::new("classifier");
        let Some(path) = config.model_path.as_ref() else {
            logger.record("no model checkpoint configured, using heuristic scorer");
            return Classifier::Heuristic(HeuristicClassifier::new(config.label_threshold));
        };

        match ModelClassifier::load(path, config.label_threshold) {
            Ok(model) => {
                logger.record(&format!("loaded checkpoint {}", model.name()));
                Classifier::Model(model)
            }
            Err(err) => {
                logger.warn_once(
                    FALLBACK_WARNING,
                    &format!("{}; falling back to heuristic scorer", err),
                );
                Classifier::Heuristic(HeuristicClassifier::new(config.label_threshold))
            }
        }
    }

    pub fn is_model(&self) -> bool {
        matches!(self, Classifier::Model(_))
    }

    /// Scores a burst into a detection.
    pub fn classify(&self, burst: Burst) -> Detection {
        let score = self.score(&burst);
        Detection::from_burst(burst, score, self.name())
    }
}

impl BurstScorer for Classifier {
    fn name(&self) -> &str {
        match self {
            Classifier::Model(model) => model.name(),
            Classifier::Heuristic(heuristic) => heuristic.name(),
        }
    }

    fn score(&self, burst: &Burst) -> Score {
        match self {
            Classifier::Model(model) => model.score(burst),
            Classifier::Heuristic(heuristic) => heuristic.score(burst),
        }
    }
}
