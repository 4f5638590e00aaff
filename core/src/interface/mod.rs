pub mod detection;
pub mod event;
pub mod sighting;
pub mod spectrum;

pub use detection::{Burst, Detection, Score};
pub use event::{CorrelatedEvent, Correlation};
pub use sighting::DeviceSighting;
pub use spectrum::SpectrumSample;
