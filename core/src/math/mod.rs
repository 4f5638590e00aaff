pub mod geo;
pub mod matrix;
pub mod stats;

pub use geo::haversine_m;
pub use matrix::MatrixHelper;
pub use stats::RollingStats;
