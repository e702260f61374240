//! Radial-basis-function proximity weighting.
//!
//! A station's influence on a sensor decays with the squared Euclidean
//! distance between their scaled coordinates: `exp(-gamma * d^2)`. The
//! weight is 1.0 exactly at zero distance and falls toward 0 as distance
//! grows. Multiplying by the station's passenger volume gives the
//! proximity score fed to the model.

/// Default kernel bandwidth: 1 / n_features for 2-D coordinates, matching
/// the convention of the reference implementation's kernel library.
pub const DEFAULT_GAMMA: f64 = 0.5;

/// RBF kernel weight between two scaled (longitude, latitude) points.
///
/// Identical points yield exactly 1.0; the value is always in (0, 1].
pub fn rbf_weight(a: (f64, f64), b: (f64, f64), gamma: f64) -> f64 {
    let d2 = (a.0 - b.0).powi(2) + (a.1 - b.1).powi(2);
    (-gamma * d2).exp()
}

/// Proximity score: kernel weight scaled by the station's passenger
/// volume (arrivals + departures) for the row.
pub fn proximity_score(weight: f64, passengers: f64) -> f64 {
    weight * passengers
}
