use crate::error::{MeterError, Result};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Textual form used for every timestamp written to disk. Fractional seconds
/// are printed only when present.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%MZ",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a meter timestamp, returning `None` when no known layout matches.
///
/// Offsets are folded into UTC and then dropped, so every reading lives on a
/// single naive timeline. Date-only values resolve to midnight. Timestamps
/// whose week would end past the last representable date are rejected.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    parse_any_layout(text.trim()).filter(|timestamp| has_week_ending(*timestamp))
}

/// True when the Sunday closing this timestamp's week is a valid date.
pub fn has_week_ending(timestamp: NaiveDateTime) -> bool {
    timestamp.date().checked_add_days(Days::new(6)).is_some()
}

fn parse_any_layout(text: &str) -> Option<NaiveDateTime> {
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Coerce a cell to a finite kWh value.
pub fn parse_kwh(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// `YYYY-MM` label of the month a timestamp falls in.
pub fn month_label(timestamp: NaiveDateTime) -> String {
    timestamp.format("%Y-%m").to_string()
}

pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

fn serialize_timestamp<S: Serializer>(
    timestamp: &NaiveDateTime,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
}

/// One validated kWh observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    timestamp: NaiveDateTime,
    kwh: f64,
}

impl Reading {
    pub fn new(timestamp: NaiveDateTime, kwh: f64) -> Result<Self> {
        if !has_week_ending(timestamp) {
            return Err(MeterError::Parse(format!(
                "timestamp {} is too close to the end of the calendar",
                timestamp
            )));
        }
        if !kwh.is_finite() {
            return Err(MeterError::Parse(format!(
                "kwh value {} at {} is not a finite number",
                kwh, timestamp
            )));
        }
        Ok(Self { timestamp, kwh })
    }

    /// Build a reading from raw cell text.
    pub fn parse(timestamp: &str, kwh: &str) -> Result<Self> {
        let ts = parse_timestamp(timestamp)
            .ok_or_else(|| MeterError::Parse(format!("unrecognised timestamp '{}'", timestamp)))?;
        let value = parse_kwh(kwh)
            .ok_or_else(|| MeterError::Parse(format!("kwh value '{}' is not numeric", kwh)))?;
        Self::new(ts, value)
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn kwh(&self) -> f64 {
        self.kwh
    }
}

/// All readings attributed to one building, in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct BuildingSeries {
    name: String,
    readings: Vec<Reading>,
}

impl BuildingSeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            readings: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add(&mut self, reading: Reading) {
        self.readings.push(reading);
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.readings.iter().map(Reading::kwh).sum()
    }

    /// Readings in ascending timestamp order; equal timestamps keep insertion
    /// order and the stored sequence is left untouched.
    pub fn sorted_view(&self) -> impl Iterator<Item = &Reading> + '_ {
        let mut order: Vec<usize> = (0..self.readings.len()).collect();
        order.sort_by_key(|&idx| self.readings[idx].timestamp);
        order.into_iter().map(move |idx| &self.readings[idx])
    }
}

/// Normalized row: a reading tagged with its building and month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterRecord {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub kwh: f64,
    pub building: String,
    pub month: String,
}

impl MeterRecord {
    pub fn new(reading: Reading, building: impl Into<String>) -> Self {
        Self {
            timestamp: reading.timestamp,
            kwh: reading.kwh,
            building: building.into(),
            month: month_label(reading.timestamp),
        }
    }

    pub fn reading(&self) -> Reading {
        Reading {
            timestamp: self.timestamp,
            kwh: self.kwh,
        }
    }
}

/// Time-sorted union of every building's records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnifiedDataset {
    records: Vec<MeterRecord>,
}

impl UnifiedDataset {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Concatenate per-file batches and sort them by timestamp. The sort is
    /// stable, so ties keep arrival order (file order, then row order).
    pub fn from_batches<I>(batches: I) -> Self
    where
        I: IntoIterator<Item = Vec<MeterRecord>>,
    {
        let mut records: Vec<MeterRecord> = batches.into_iter().flatten().collect();
        records.retain(|record| record.kwh.is_finite());
        records.sort_by_key(|record| record.timestamp);
        Self { records }
    }

    pub fn records(&self) -> &[MeterRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_kwh(&self) -> f64 {
        self.records.iter().map(|record| record.kwh).sum()
    }

    /// Distinct building names in order of first appearance.
    pub fn buildings(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for record in &self.records {
            if !seen.contains(&record.building.as_str()) {
                seen.push(record.building.as_str());
            }
        }
        seen
    }
}

/// Per-building reading collections built in one pass over a dataset.
#[derive(Debug, Clone, Default)]
pub struct BuildingCatalog {
    buildings: Vec<BuildingSeries>,
}

impl BuildingCatalog {
    pub fn from_dataset(dataset: &UnifiedDataset) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut buildings: Vec<BuildingSeries> = Vec::new();

        for record in dataset.records() {
            let slot = *index.entry(record.building.as_str()).or_insert_with(|| {
                buildings.push(BuildingSeries::new(record.building.clone()));
                buildings.len() - 1
            });
            buildings[slot].add(record.reading());
        }

        Self { buildings }
    }

    pub fn get(&self, name: &str) -> Option<&BuildingSeries> {
        self.buildings.iter().find(|series| series.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildingSeries> {
        self.buildings.iter()
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    /// Total consumption per building, in discovery order.
    pub fn totals(&self) -> Vec<(&str, f64)> {
        self.buildings
            .iter()
            .map(|series| (series.name(), series.total()))
            .collect()
    }
}
