use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use meter_analytics::{ChartRenderer, DashboardSeries, MeterError};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::PathBuf;

pub const DASHBOARD_FILE: &str = "dashboard.png";

type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Three stacked panels: daily trend lines, weekly-average bars and a
/// scatter of the busiest building-hours.
pub struct DashboardRenderer {
    output_path: PathBuf,
    size: (u32, u32),
}

impl DashboardRenderer {
    pub fn new(output_path: PathBuf) -> Self {
        Self {
            output_path,
            size: (1200, 900),
        }
    }

    pub fn output_path(&self) -> &PathBuf {
        &self.output_path
    }

    fn draw(&self, series: &DashboardSeries<'_>) -> Result<()> {
        let root = BitMapBackend::new(&self.output_path, self.size).into_drawing_area();
        root.fill(&WHITE)?;

        let panels = root.split_evenly((3, 1));
        draw_daily_panel(&panels[0], series)?;
        draw_weekly_panel(&panels[1], series)?;
        draw_peak_panel(&panels[2], series)?;

        root.present()?;
        Ok(())
    }
}

impl ChartRenderer for DashboardRenderer {
    fn render(&self, series: &DashboardSeries<'_>) -> meter_analytics::Result<()> {
        self.draw(series)
            .map_err(|e| MeterError::Render(format!("{}: {}", self.output_path.display(), e)))
    }
}

fn color_for(idx: usize) -> RGBAColor {
    Palette99::pick(idx).to_rgba()
}

/// Zero-based value axis with headroom; a flat or empty series still gets a
/// usable range.
fn value_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (low, high) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let high = if high > 0.0 { high * 1.1 } else { 1.0 };
    let low = if low < 0.0 { low * 1.1 } else { 0.0 };
    low..high
}

fn date_range(dates: impl Iterator<Item = NaiveDate>) -> Range<NaiveDate> {
    let bounds = dates.fold(None, |acc: Option<(NaiveDate, NaiveDate)>, d| match acc {
        Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        None => Some((d, d)),
    });
    match bounds {
        Some((lo, hi)) if lo < hi => lo..hi,
        Some((lo, _)) => lo..lo + Duration::days(1),
        None => {
            let today = Utc::now().date_naive();
            today..today + Duration::days(1)
        }
    }
}

fn time_range(times: impl Iterator<Item = DateTime<Utc>>) -> Range<DateTime<Utc>> {
    let bounds = times.fold(None, |acc: Option<(DateTime<Utc>, DateTime<Utc>)>, t| match acc {
        Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        None => Some((t, t)),
    });
    match bounds {
        Some((lo, hi)) if lo < hi => lo..hi,
        Some((lo, _)) => lo - Duration::hours(1)..lo + Duration::hours(1),
        None => {
            let now = Utc::now();
            now..now + Duration::days(1)
        }
    }
}

fn draw_daily_panel(area: &Panel<'_>, series: &DashboardSeries<'_>) -> Result<()> {
    let lines: Vec<(&str, Vec<(NaiveDate, f64)>)> = series
        .buildings
        .iter()
        .map(|building| {
            let points = series
                .daily
                .iter()
                .filter(|total| &total.building == building)
                .map(|total| (total.bucket, total.kwh))
                .collect();
            (building.as_str(), points)
        })
        .collect();

    let mut chart = ChartBuilder::on(area)
        .caption("Daily consumption trend", ("sans-serif", 22).into_font())
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(60)
        .build_cartesian_2d(
            date_range(series.daily.iter().map(|t| t.bucket)),
            value_range(series.daily.iter().map(|t| t.kwh)),
        )?;

    chart.configure_mesh().x_desc("Date").y_desc("kWh").draw()?;

    for (idx, (building, points)) in lines.iter().enumerate() {
        let color = color_for(idx);
        chart
            .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
            .label(*building)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 15, y)], color.stroke_width(2)));
    }

    if !lines.is_empty() {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    Ok(())
}

fn draw_weekly_panel(area: &Panel<'_>, series: &DashboardSeries<'_>) -> Result<()> {
    let names: Vec<&str> = series
        .weekly_average
        .iter()
        .map(|avg| avg.building.as_str())
        .collect();
    let slots = names.len().max(1);

    let mut chart = ChartBuilder::on(area)
        .caption("Average weekly usage by building", ("sans-serif", 22).into_font())
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(60)
        .build_cartesian_2d(
            (0..slots).into_segmented(),
            value_range(series.weekly_average.iter().map(|avg| avg.avg_weekly_kwh)),
        )?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Building")
        .y_desc("Avg weekly kWh")
        .x_labels(slots)
        .x_label_formatter(&|value: &SegmentValue<usize>| match value {
            SegmentValue::CenterOf(idx) => names.get(*idx).map(|n| n.to_string()).unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(series.weekly_average.iter().enumerate().map(|(idx, avg)| {
        // Match the colour the building got in the daily panel
        let colour_idx = series
            .buildings
            .iter()
            .position(|b| *b == avg.building)
            .unwrap_or(idx);
        let mut bar = Rectangle::new(
            [
                (SegmentValue::Exact(idx), 0.0),
                (SegmentValue::Exact(idx + 1), avg.avg_weekly_kwh),
            ],
            color_for(colour_idx).filled(),
        );
        bar.set_margin(0, 0, 8, 8);
        bar
    }))?;

    Ok(())
}

fn draw_peak_panel(area: &Panel<'_>, series: &DashboardSeries<'_>) -> Result<()> {
    let mut chart = ChartBuilder::on(area)
        .caption("Peak-hour consumption scatter", ("sans-serif", 22).into_font())
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(60)
        .build_cartesian_2d(
            time_range(series.top_hourly.iter().map(|t| t.bucket.and_utc())),
            value_range(series.top_hourly.iter().map(|t| t.kwh)),
        )?;

    chart.configure_mesh().x_desc("Time").y_desc("kWh").draw()?;

    // One colour per building, in the order buildings first appear among the peaks
    let mut seen: Vec<&str> = Vec::new();
    for point in series.top_hourly {
        if !seen.contains(&point.building.as_str()) {
            seen.push(point.building.as_str());
        }
    }

    for (idx, building) in seen.iter().enumerate() {
        let color = color_for(idx);
        chart
            .draw_series(
                series
                    .top_hourly
                    .iter()
                    .filter(|point| point.building == *building)
                    .map(|point| Circle::new((point.bucket.and_utc(), point.kwh), 3, color.filled())),
            )?
            .label(*building)
            .legend(move |(x, y)| Circle::new((x + 7, y), 3, color.filled()));
    }

    if !seen.is_empty() {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_range_has_headroom() {
        let range = value_range([2.0, 10.0].into_iter());
        assert_eq!(range.start, 0.0);
        assert!((range.end - 11.0).abs() < 1e-9);

        let empty = value_range(std::iter::empty());
        assert_eq!(empty, 0.0..1.0);

        let negative = value_range([-5.0, 4.0].into_iter());
        assert!(negative.start < -5.0);
    }

    #[test]
    fn test_date_range_widens_single_day() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let range = date_range(std::iter::once(day));
        assert_eq!(range.start, day);
        assert_eq!(range.end, day + Duration::days(1));

        let span = date_range([day + Duration::days(3), day].into_iter());
        assert_eq!(span, day..day + Duration::days(3));
    }

    #[test]
    fn test_time_range_widens_single_point() {
        let t = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            .and_utc();
        let range = time_range(std::iter::once(t));
        assert_eq!(range.end - range.start, Duration::hours(2));
    }
}
