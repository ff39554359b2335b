//! Calendar-bucketed totals and per-building statistics.
//!
//! Every function here is a pure function of a [`UnifiedDataset`]. Buckets
//! without readings are omitted, and results are ordered by building name and
//! then bucket.

use crate::models::UnifiedDataset;
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketTotal<K> {
    pub building: String,
    pub bucket: K,
    pub kwh: f64,
}

pub type DailyTotals = Vec<BucketTotal<NaiveDate>>;
/// Keyed by the Sunday that ends each week.
pub type WeeklyTotals = Vec<BucketTotal<NaiveDate>>;
pub type HourlyTotals = Vec<BucketTotal<NaiveDateTime>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingSummary {
    pub building: String,
    pub mean_kwh: f64,
    pub min_kwh: f64,
    pub max_kwh: f64,
    pub total_kwh: f64,
    #[serde(skip)]
    pub readings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyAverage {
    pub building: String,
    pub avg_weekly_kwh: f64,
}

pub fn day_bucket(timestamp: NaiveDateTime) -> NaiveDate {
    timestamp.date()
}

/// Weeks run Monday to Sunday and are labelled by their Sunday. A week that
/// would close past the end of the calendar is labelled by the last date.
pub fn week_ending(timestamp: NaiveDateTime) -> NaiveDate {
    let date = timestamp.date();
    let days_to_sunday = 6 - u64::from(date.weekday().num_days_from_monday());
    date.checked_add_days(Days::new(days_to_sunday))
        .unwrap_or(NaiveDate::MAX)
}

pub fn hour_bucket(timestamp: NaiveDateTime) -> NaiveDateTime {
    NaiveTime::from_hms_opt(timestamp.hour(), 0, 0)
        .map(|time| timestamp.date().and_time(time))
        .unwrap_or(timestamp)
}

fn bucket_totals<K, F>(dataset: &UnifiedDataset, bucket_of: F) -> Vec<BucketTotal<K>>
where
    K: Ord + Copy,
    F: Fn(NaiveDateTime) -> K,
{
    let mut sums: BTreeMap<(&str, K), f64> = BTreeMap::new();
    for record in dataset.records() {
        *sums
            .entry((record.building.as_str(), bucket_of(record.timestamp)))
            .or_insert(0.0) += record.kwh;
    }

    sums.into_iter()
        .map(|((building, bucket), kwh)| BucketTotal {
            building: building.to_string(),
            bucket,
            kwh,
        })
        .collect()
}

pub fn daily_totals(dataset: &UnifiedDataset) -> DailyTotals {
    bucket_totals(dataset, day_bucket)
}

pub fn weekly_totals(dataset: &UnifiedDataset) -> WeeklyTotals {
    bucket_totals(dataset, week_ending)
}

pub fn hourly_totals(dataset: &UnifiedDataset) -> HourlyTotals {
    bucket_totals(dataset, hour_bucket)
}

/// Mean, min, max and sum of raw readings per building.
pub fn building_summary(dataset: &UnifiedDataset) -> Vec<BuildingSummary> {
    let mut stats: BTreeMap<&str, BuildingSummary> = BTreeMap::new();

    for record in dataset.records() {
        let entry = stats
            .entry(record.building.as_str())
            .or_insert_with(|| BuildingSummary {
                building: record.building.clone(),
                mean_kwh: 0.0,
                min_kwh: f64::INFINITY,
                max_kwh: f64::NEG_INFINITY,
                total_kwh: 0.0,
                readings: 0,
            });
        entry.min_kwh = entry.min_kwh.min(record.kwh);
        entry.max_kwh = entry.max_kwh.max(record.kwh);
        entry.total_kwh += record.kwh;
        entry.readings += 1;
    }

    stats
        .into_values()
        .map(|mut summary| {
            summary.mean_kwh = summary.total_kwh / summary.readings as f64;
            summary
        })
        .collect()
}

/// Mean of each building's per-week mean reading.
pub fn weekly_average(dataset: &UnifiedDataset) -> Vec<WeeklyAverage> {
    let mut weeks: BTreeMap<(&str, NaiveDate), (f64, usize)> = BTreeMap::new();
    for record in dataset.records() {
        let slot = weeks
            .entry((record.building.as_str(), week_ending(record.timestamp)))
            .or_insert((0.0, 0));
        slot.0 += record.kwh;
        slot.1 += 1;
    }

    let mut per_building: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for ((building, _), (sum, count)) in weeks {
        let slot = per_building.entry(building).or_insert((0.0, 0));
        slot.0 += sum / count as f64;
        slot.1 += 1;
    }

    per_building
        .into_iter()
        .map(|(building, (sum_of_means, weeks))| WeeklyAverage {
            building: building.to_string(),
            avg_weekly_kwh: sum_of_means / weeks as f64,
        })
        .collect()
}

/// Largest kWh first; equal values fall back to the earlier hour, then the
/// building name.
fn by_load_descending(a: &BucketTotal<NaiveDateTime>, b: &BucketTotal<NaiveDateTime>) -> Ordering {
    b.kwh
        .total_cmp(&a.kwh)
        .then_with(|| a.bucket.cmp(&b.bucket))
        .then_with(|| a.building.cmp(&b.building))
}

/// The single busiest building-hour.
pub fn peak_hour(hourly: &[BucketTotal<NaiveDateTime>]) -> Option<&BucketTotal<NaiveDateTime>> {
    hourly.iter().min_by(|a, b| by_load_descending(a, b))
}

/// The `limit` busiest building-hours, busiest first.
pub fn top_hourly_points(hourly: &[BucketTotal<NaiveDateTime>], limit: usize) -> HourlyTotals {
    let mut points = hourly.to_vec();
    points.sort_by(by_load_descending);
    points.truncate(limit);
    points
}
