//! Core of the SkyRipper monitor: adaptive RF burst detection, burst scoring,
//! Kismet device ingestion and the time/geo-fence join between the two.
//!
//! Components are plain state objects; the monitor binary owns them and drives
//! them from its tick and ingest loops. Shared state lives in the snapshot
//! stores so that readers never wait on the pipeline.

pub mod ingest;
pub mod interface;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod store;
pub mod telemetry;

pub use prelude::{
    ClassifierConfig, CorrelationConfig, DetectorConfig, GeoFence, RetentionPolicy, Timestamped,
};
