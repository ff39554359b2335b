use crate::models::{parse_timestamp, MeterRecord, Reading, UnifiedDataset};
use chrono::NaiveDateTime;

pub fn ts(text: &str) -> NaiveDateTime {
    parse_timestamp(text).expect("test timestamp should parse")
}

pub fn record(timestamp: &str, kwh: f64, building: &str) -> MeterRecord {
    MeterRecord::new(Reading::new(ts(timestamp), kwh).unwrap(), building)
}

pub fn dataset(rows: &[(&str, f64, &str)]) -> UnifiedDataset {
    let records: Vec<MeterRecord> = rows
        .iter()
        .map(|(timestamp, kwh, building)| record(timestamp, *kwh, building))
        .collect();
    UnifiedDataset::from_batches(vec![records])
}

/// The three-reading building used across the report scenarios.
pub fn single_building() -> UnifiedDataset {
    dataset(&[
        ("2024-01-01T00:00", 10.0, "bldgA"),
        ("2024-01-01T12:00", 5.0, "bldgA"),
        ("2024-01-02T00:00", 7.0, "bldgA"),
    ])
}
