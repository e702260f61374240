//! Spatial feature machinery: coordinate standardization and the
//! RBF proximity kernel between sensors and reference stations.

pub mod kernel;
pub mod scaler;

pub use kernel::{proximity_score, rbf_weight};
pub use scaler::{CoordinateScalers, ScalerState};
