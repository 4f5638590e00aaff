pub mod detections;
pub mod devices;
pub mod snapshot;

pub use detections::DetectionStore;
pub use devices::{DeviceStore, UpsertSummary};
pub use snapshot::SnapshotStore;
