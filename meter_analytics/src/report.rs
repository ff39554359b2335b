use crate::aggregator::{
    building_summary, daily_totals, hourly_totals, peak_hour, top_hourly_points, weekly_average,
    weekly_totals, BucketTotal, BuildingSummary, DailyTotals, HourlyTotals, WeeklyAverage,
    WeeklyTotals,
};
use crate::error::Result;
use crate::models::{format_timestamp, UnifiedDataset};
use chrono::{NaiveDate, NaiveDateTime};
use log::info;
use serde::Serialize;

pub const DEFAULT_TOP_POINTS: usize = 200;

const NULL_LABEL: &str = "None";
const TRENDS_TRAILER: &str = "weekly_and_daily_trends_described_in_csv_files";

/// Shortest round-trip form, keeping a trailing `.0` on integral values.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Scalar headline facts of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampusFacts {
    pub total_campus_consumption: f64,
    pub highest_consuming_building: Option<String>,
    pub peak_load_time: Option<NaiveDateTime>,
}

impl CampusFacts {
    pub fn summary_lines(&self) -> [String; 4] {
        [
            format!(
                "total_campus_consumption,{}",
                format_float(self.total_campus_consumption)
            ),
            format!(
                "highest_consuming_building,{}",
                self.highest_consuming_building.as_deref().unwrap_or(NULL_LABEL)
            ),
            format!(
                "peak_load_time,{}",
                self.peak_load_time
                    .map(format_timestamp)
                    .unwrap_or_else(|| NULL_LABEL.to_string())
            ),
            TRENDS_TRAILER.to_string(),
        ]
    }
}

/// Building with the largest total; on ties the first in name order wins.
fn highest_consumer(summary: &[BuildingSummary]) -> Option<String> {
    summary
        .iter()
        .fold(None, |best: Option<&BuildingSummary>, candidate| match best {
            Some(current) if candidate.total_kwh <= current.total_kwh => Some(current),
            _ => Some(candidate),
        })
        .map(|s| s.building.clone())
}

/// Series handed to a chart renderer.
#[derive(Debug, Clone, Copy)]
pub struct DashboardSeries<'a> {
    /// Buildings in order of first appearance in the dataset.
    pub buildings: &'a [String],
    pub daily: &'a [BucketTotal<NaiveDate>],
    pub weekly_average: &'a [WeeklyAverage],
    pub top_hourly: &'a [BucketTotal<NaiveDateTime>],
}

/// Persistence collaborator.
pub trait ReportSink {
    fn write_cleaned(&mut self, dataset: &UnifiedDataset) -> Result<()>;
    fn write_summary(&mut self, summary: &[BuildingSummary]) -> Result<()>;
    fn write_facts(&mut self, facts: &CampusFacts) -> Result<()>;
}

/// Chart collaborator.
pub trait ChartRenderer {
    fn render(&self, series: &DashboardSeries<'_>) -> Result<()>;
}

/// Everything a run produces, computed from one dataset.
#[derive(Debug, Clone)]
pub struct CampusReport {
    pub dataset: UnifiedDataset,
    pub buildings: Vec<String>,
    pub daily: DailyTotals,
    pub weekly: WeeklyTotals,
    pub hourly: HourlyTotals,
    pub summary: Vec<BuildingSummary>,
    pub weekly_average: Vec<WeeklyAverage>,
    pub top_hourly: HourlyTotals,
    pub facts: CampusFacts,
}

impl CampusReport {
    pub fn dashboard_series(&self) -> DashboardSeries<'_> {
        DashboardSeries {
            buildings: &self.buildings,
            daily: &self.daily,
            weekly_average: &self.weekly_average,
            top_hourly: &self.top_hourly,
        }
    }

    /// Hand tables and facts to the sink, and series to the renderer if any.
    pub fn deliver(&self, sink: &mut dyn ReportSink, renderer: Option<&dyn ChartRenderer>) -> Result<()> {
        sink.write_cleaned(&self.dataset)?;
        sink.write_summary(&self.summary)?;
        sink.write_facts(&self.facts)?;

        if let Some(renderer) = renderer {
            renderer.render(&self.dashboard_series())?;
        }
        Ok(())
    }
}

pub struct ReportAssembler {
    top_points: usize,
}

impl Default for ReportAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_POINTS)
    }
}

impl ReportAssembler {
    pub fn new(top_points: usize) -> Self {
        Self { top_points }
    }

    pub fn assemble(&self, dataset: UnifiedDataset) -> CampusReport {
        let daily = daily_totals(&dataset);
        let weekly = weekly_totals(&dataset);
        let hourly = hourly_totals(&dataset);
        let summary = building_summary(&dataset);
        let weekly_average = weekly_average(&dataset);

        let facts = CampusFacts {
            total_campus_consumption: dataset.total_kwh(),
            highest_consuming_building: highest_consumer(&summary),
            peak_load_time: peak_hour(&hourly).map(|peak| peak.bucket),
        };
        let top_hourly = top_hourly_points(&hourly, self.top_points);
        let buildings = dataset.buildings().into_iter().map(str::to_string).collect();

        info!(
            "Aggregated {} readings: {} daily, {} weekly and {} hourly buckets across {} buildings",
            dataset.len(),
            daily.len(),
            weekly.len(),
            hourly.len(),
            summary.len()
        );

        CampusReport {
            dataset,
            buildings,
            daily,
            weekly,
            hourly,
            summary,
            weekly_average,
            top_hourly,
            facts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeterError;
    use crate::test_support::{dataset, single_building, ts};
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<String>,
        cleaned_rows: usize,
        facts: Option<CampusFacts>,
    }

    impl ReportSink for RecordingSink {
        fn write_cleaned(&mut self, dataset: &UnifiedDataset) -> Result<()> {
            self.calls.push("cleaned".to_string());
            self.cleaned_rows = dataset.len();
            Ok(())
        }

        fn write_summary(&mut self, summary: &[BuildingSummary]) -> Result<()> {
            self.calls.push(format!("summary:{}", summary.len()));
            Ok(())
        }

        fn write_facts(&mut self, facts: &CampusFacts) -> Result<()> {
            self.calls.push("facts".to_string());
            self.facts = Some(facts.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingRenderer {
        seen: RefCell<Option<(usize, usize, usize, usize)>>,
    }

    impl ChartRenderer for RecordingRenderer {
        fn render(&self, series: &DashboardSeries<'_>) -> Result<()> {
            *self.seen.borrow_mut() = Some((
                series.buildings.len(),
                series.daily.len(),
                series.weekly_average.len(),
                series.top_hourly.len(),
            ));
            Ok(())
        }
    }

    struct FailingRenderer;

    impl ChartRenderer for FailingRenderer {
        fn render(&self, _series: &DashboardSeries<'_>) -> Result<()> {
            Err(MeterError::Render("backend unavailable".to_string()))
        }
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(22.0), "22.0");
        assert_eq!(format_float(7.5), "7.5");
        assert_eq!(format_float(1.0 / 3.0), "0.3333333333333333");
        assert_eq!(format_float(-4.0), "-4.0");
    }

    #[test]
    fn test_empty_input_report() {
        let report = ReportAssembler::default().assemble(UnifiedDataset::empty());
        assert!(report.summary.is_empty());
        assert!(report.daily.is_empty());
        assert!(report.buildings.is_empty());
        assert_eq!(
            report.facts.summary_lines(),
            [
                "total_campus_consumption,0.0".to_string(),
                "highest_consuming_building,None".to_string(),
                "peak_load_time,None".to_string(),
                "weekly_and_daily_trends_described_in_csv_files".to_string(),
            ]
        );
    }

    #[test]
    fn test_single_building_report() {
        let report = ReportAssembler::default().assemble(single_building());
        assert_eq!(report.facts.total_campus_consumption, 22.0);
        assert_eq!(report.facts.highest_consuming_building.as_deref(), Some("bldgA"));
        assert_eq!(report.facts.peak_load_time, Some(ts("2024-01-01T00:00")));

        let lines = report.facts.summary_lines();
        assert_eq!(lines[0], "total_campus_consumption,22.0");
        assert_eq!(lines[1], "highest_consuming_building,bldgA");
        assert_eq!(lines[2], "peak_load_time,2024-01-01 00:00:00");
    }

    #[test]
    fn test_tied_buildings_resolve_by_name() {
        let build = || {
            dataset(&[
                ("2024-01-01T00:00", 5.0, "zeta"),
                ("2024-01-01T01:00", 5.0, "alpha"),
                ("2024-01-01T02:00", 3.0, "mid"),
            ])
        };

        for _ in 0..5 {
            let report = ReportAssembler::default().assemble(build());
            assert_eq!(report.facts.highest_consuming_building.as_deref(), Some("alpha"));
        }
    }

    #[test]
    fn test_highest_consumer_picks_largest_total() {
        let report = ReportAssembler::default().assemble(dataset(&[
            ("2024-01-01T00:00", 5.0, "alpha"),
            ("2024-01-01T01:00", 9.0, "beta"),
            ("2024-01-01T02:00", 1.0, "alpha"),
        ]));
        assert_eq!(report.facts.highest_consuming_building.as_deref(), Some("beta"));
        assert_eq!(report.facts.peak_load_time, Some(ts("2024-01-01T01:00")));
    }

    #[test]
    fn test_top_points_limit() {
        let report = ReportAssembler::new(2).assemble(dataset(&[
            ("2024-01-01T00:00", 1.0, "a"),
            ("2024-01-01T01:00", 3.0, "a"),
            ("2024-01-01T02:00", 2.0, "b"),
        ]));
        assert_eq!(report.hourly.len(), 3);
        let top: Vec<f64> = report.top_hourly.iter().map(|t| t.kwh).collect();
        assert_eq!(top, vec![3.0, 2.0]);
    }

    #[test]
    fn test_deliver_hands_off_in_order() {
        let report = ReportAssembler::default().assemble(single_building());
        let mut sink = RecordingSink::default();
        let renderer = RecordingRenderer::default();

        report.deliver(&mut sink, Some(&renderer)).unwrap();

        assert_eq!(sink.calls, vec!["cleaned", "summary:1", "facts"]);
        assert_eq!(sink.cleaned_rows, 3);
        assert_eq!(sink.facts.as_ref(), Some(&report.facts));
        assert_eq!(*renderer.seen.borrow(), Some((1, 2, 1, 3)));
    }

    #[test]
    fn test_deliver_without_renderer_and_renderer_errors() {
        let report = ReportAssembler::default().assemble(single_building());
        let mut sink = RecordingSink::default();
        report.deliver(&mut sink, None).unwrap();
        assert_eq!(sink.calls.len(), 3);

        let err = report.deliver(&mut sink, Some(&FailingRenderer)).unwrap_err();
        assert!(matches!(err, MeterError::Render(_)));
    }

    #[test]
    fn test_facts_serialize_to_json() {
        let report = ReportAssembler::default().assemble(single_building());
        let json = serde_json::to_value(&report.facts).unwrap();
        assert_eq!(json["total_campus_consumption"], 22.0);
        assert_eq!(json["highest_consuming_building"], "bldgA");
        assert_eq!(json["peak_load_time"], "2024-01-01T00:00:00");
    }
}
