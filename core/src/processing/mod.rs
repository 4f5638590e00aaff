pub mod burst;
pub mod classifier;
pub mod correlation;

pub use burst::{BurstDetector, ChannelState, DetectorError};
pub use classifier::{
    BurstScorer, Classifier, ClassifierError, HeuristicClassifier, ModelClassifier,
};
pub use correlation::{CorrelationEngine, Exclusion};
