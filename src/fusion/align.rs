//! Temporal range intersection across the three input series.
//!
//! Transit and event archives usually span a wider calendar range than the
//! sensor feed; rows outside the common range would come out of the join
//! as unjoinable all-zero padding. Every series is therefore truncated to
//! the intersection of the covered ranges before fusing.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::ingest::{EventObservation, SensorObservation, StationObservation};

/// Inclusive date range shared by all input series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// The three series truncated to their common range.
#[derive(Debug)]
pub struct AlignedSeries {
    pub sensors: Vec<SensorObservation>,
    pub stations: Vec<StationObservation>,
    pub events: Vec<EventObservation>,
    /// `None` when the ranges were disjoint (or everything was empty);
    /// all three vectors are empty in that case.
    pub range: Option<DateRange>,
}

fn bounds(dates: impl Iterator<Item = NaiveDate>) -> Option<(NaiveDate, NaiveDate)> {
    dates.fold(None, |acc, d| match acc {
        None => Some((d, d)),
        Some((min, max)) => Some((min.min(d), max.max(d))),
    })
}

/// Computes the common range (`start` = latest per-series minimum, `end` =
/// earliest per-series maximum) over the non-empty dense series and
/// filters every series to it.
///
/// Only the sensor and station feeds contribute bounds; the event series
/// is a sparse handful of dates and is merely truncated, never allowed to
/// narrow the range. Disjoint ranges are a valid, if useless, outcome:
/// every output is empty and no error is raised.
pub fn align(
    sensors: Vec<SensorObservation>,
    stations: Vec<StationObservation>,
    events: Vec<EventObservation>,
) -> AlignedSeries {
    let mut per_series = Vec::new();
    per_series.extend(bounds(sensors.iter().map(|o| o.time.date)));
    per_series.extend(bounds(stations.iter().map(|o| o.time.date)));

    let start = per_series.iter().map(|(min, _)| *min).max();
    let end = per_series.iter().map(|(_, max)| *max).min();

    let range = match (start, end) {
        (Some(start), Some(end)) if start <= end => Some(DateRange { start, end }),
        _ => None,
    };

    let Some(range) = range else {
        if !per_series.is_empty() {
            warn!("Input series cover disjoint date ranges; nothing to fuse");
        }
        return AlignedSeries {
            sensors: Vec::new(),
            stations: Vec::new(),
            events: Vec::new(),
            range: None,
        };
    };

    let aligned = AlignedSeries {
        sensors: sensors
            .into_iter()
            .filter(|o| range.contains(o.time.date))
            .collect(),
        stations: stations
            .into_iter()
            .filter(|o| range.contains(o.time.date))
            .collect(),
        events: events
            .into_iter()
            .filter(|o| range.contains(o.date))
            .collect(),
        range: Some(range),
    };

    info!(
        start = %range.start,
        end = %range.end,
        sensors = aligned.sensors.len(),
        stations = aligned.stations.len(),
        events = aligned.events.len(),
        "Series aligned to common date range"
    );
    aligned
}
