//! Event listing ingestion.
//!
//! The events file is a JSON array in which each event carries its dates in
//! one of two layouts (a start/end pair, or a list of single dates) and a
//! location with decimal-comma coordinates. Only events inside the
//! configured bounding box and date window survive; what remains is a bag
//! of dates, one per event occurrence.

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use super::{EventObservation, parse_coordinate};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::temporal::parse_date;

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[allow(dead_code)]
    title: String,
    dates: RawDates,
    location: RawLocation,
}

/// The two date layouts seen in the source file.
#[derive(Debug, Deserialize)]
struct RawDates {
    startdate: Option<String>,
    enddate: Option<String>,
    #[serde(default)]
    singles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    latitude: String,
    longitude: String,
}

impl RawDates {
    /// The raw date strings this event occurs on. A start/end pair
    /// contributes exactly its two endpoint dates, matching the source
    /// data's convention.
    fn occurrences(&self) -> Vec<&str> {
        if let (Some(start), Some(end)) = (self.startdate.as_deref(), self.enddate.as_deref()) {
            vec![start, end]
        } else {
            self.singles.iter().map(String::as_str).collect()
        }
    }
}

/// Loads the events JSON and returns one observation per in-bounds,
/// in-window event date, sorted by date. Duplicate dates are kept; the
/// fusion join collapses them into a single flag.
pub fn load_event_observations(
    path: &Path,
    config: &PipelineConfig,
) -> Result<Vec<EventObservation>, PipelineError> {
    let content = std::fs::read_to_string(path)?;
    let raw_events: Vec<RawEvent> = serde_json::from_str(&content)?;

    let mut observations = Vec::new();
    let mut out_of_bounds = 0usize;

    for event in &raw_events {
        let latitude = parse_coordinate(&event.location.latitude)?;
        let longitude = parse_coordinate(&event.location.longitude)?;

        if !config.bounds.contains(longitude, latitude) {
            out_of_bounds += 1;
            continue;
        }

        for raw_date in event.dates.occurrences() {
            let date = parse_date(raw_date)?;
            if date >= config.events.start && date <= config.events.end {
                observations.push(EventObservation { date });
            }
        }
    }

    observations.sort();
    if out_of_bounds > 0 {
        debug!(out_of_bounds, "Dropped events outside the bounding box");
    }
    info!(
        observations = observations.len(),
        raw_events = raw_events.len(),
        "Events ingested"
    );
    Ok(observations)
}
