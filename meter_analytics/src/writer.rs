use crate::aggregator::BuildingSummary;
use crate::error::Result;
use crate::models::UnifiedDataset;
use crate::report::{CampusFacts, ReportSink};
use log::info;
use std::fs;
use std::path::PathBuf;

pub const CLEANED_FILE: &str = "cleaned_energy_data.csv";
pub const SUMMARY_TABLE_FILE: &str = "building_summary.csv";
pub const SUMMARY_REPORT_FILE: &str = "summary.txt";

const CLEANED_HEADER: [&str; 4] = ["timestamp", "kwh", "building", "month"];
const SUMMARY_HEADER: [&str; 5] = ["building", "mean_kwh", "min_kwh", "max_kwh", "total_kwh"];

/// Writes the cleaned dataset, the building summary and the plain-text
/// report into one output directory.
pub struct CsvReportWriter {
    output_dir: PathBuf,
    written: Vec<PathBuf>,
}

impl CsvReportWriter {
    pub fn create(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            written: Vec::new(),
        })
    }

    /// Files written so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn record_write(&mut self, path: PathBuf) {
        info!("Saved {}", path.display());
        self.written.push(path);
    }
}

impl ReportSink for CsvReportWriter {
    fn write_cleaned(&mut self, dataset: &UnifiedDataset) -> Result<()> {
        let path = self.output_dir.join(CLEANED_FILE);
        // Header is written explicitly so an empty dataset still gets one
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(&path)?;
        writer.write_record(CLEANED_HEADER)?;
        for record in dataset.records() {
            writer.serialize(record)?;
        }
        writer.flush()?;
        self.record_write(path);
        Ok(())
    }

    fn write_summary(&mut self, summary: &[BuildingSummary]) -> Result<()> {
        let path = self.output_dir.join(SUMMARY_TABLE_FILE);
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(&path)?;
        writer.write_record(SUMMARY_HEADER)?;
        for row in summary {
            writer.serialize(row)?;
        }
        writer.flush()?;
        self.record_write(path);
        Ok(())
    }

    fn write_facts(&mut self, facts: &CampusFacts) -> Result<()> {
        let path = self.output_dir.join(SUMMARY_REPORT_FILE);
        let mut contents = facts.summary_lines().join("\n");
        contents.push('\n');
        fs::write(&path, contents)?;
        self.record_write(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::{discover_files, ingest_files};
    use crate::normalizer::NormalizerConfig;
    use crate::report::ReportAssembler;
    use crate::test_support::single_building;
    use std::path::Path;
    use tempfile::TempDir;

    fn run(dataset: UnifiedDataset, dir: &Path) -> CsvReportWriter {
        let report = ReportAssembler::default().assemble(dataset);
        let mut writer = CsvReportWriter::create(dir).unwrap();
        report.deliver(&mut writer, None).unwrap();
        writer
    }

    #[test]
    fn test_writes_all_three_outputs() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("output");
        let writer = run(single_building(), &out);
        assert_eq!(writer.written().len(), 3);

        let cleaned = fs::read_to_string(out.join(CLEANED_FILE)).unwrap();
        assert_eq!(
            cleaned,
            "timestamp,kwh,building,month\n\
             2024-01-01 00:00:00,10.0,bldgA,2024-01\n\
             2024-01-01 12:00:00,5.0,bldgA,2024-01\n\
             2024-01-02 00:00:00,7.0,bldgA,2024-01\n"
        );

        let summary = fs::read_to_string(out.join(SUMMARY_TABLE_FILE)).unwrap();
        let mut lines = summary.lines();
        assert_eq!(lines.next(), Some("building,mean_kwh,min_kwh,max_kwh,total_kwh"));
        assert_eq!(lines.next(), Some("bldgA,7.333333333333333,5.0,10.0,22.0"));
        assert_eq!(lines.next(), None);

        let report = fs::read_to_string(out.join(SUMMARY_REPORT_FILE)).unwrap();
        assert_eq!(
            report,
            "total_campus_consumption,22.0\n\
             highest_consuming_building,bldgA\n\
             peak_load_time,2024-01-01 00:00:00\n\
             weekly_and_daily_trends_described_in_csv_files\n"
        );
    }

    #[test]
    fn test_empty_dataset_still_writes_headers() {
        let dir = TempDir::new().unwrap();
        run(UnifiedDataset::empty(), dir.path());

        let cleaned = fs::read_to_string(dir.path().join(CLEANED_FILE)).unwrap();
        assert_eq!(cleaned, "timestamp,kwh,building,month\n");
        let summary = fs::read_to_string(dir.path().join(SUMMARY_TABLE_FILE)).unwrap();
        assert_eq!(summary, "building,mean_kwh,min_kwh,max_kwh,total_kwh\n");
        let report = fs::read_to_string(dir.path().join(SUMMARY_REPORT_FILE)).unwrap();
        assert!(report.starts_with("total_campus_consumption,0.0\nhighest_consuming_building,None\npeak_load_time,None\n"));
    }

    #[test]
    fn test_pipeline_from_files_reruns_are_byte_identical() {
        let data = TempDir::new().unwrap();
        fs::write(
            data.path().join("library.csv"),
            "timestamp,kwh\n2024-01-01 08:00,4.5\n2024-01-02 09:15,3\nbroken,7\n2024-01-08 10:00,6.25\n",
        )
        .unwrap();
        fs::write(
            data.path().join("gym.csv"),
            "date,meter,usage\n2024-01-01,M-1,2\n2024-01-03,M-1,\n2024-01-07,M-1,8.5\n",
        )
        .unwrap();

        let pipeline = |out: &Path| {
            let files = discover_files(data.path(), "*.csv", false).unwrap();
            let outcome = ingest_files(&files, &NormalizerConfig::default(), false);
            run(outcome.dataset, out)
        };

        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        pipeline(first.path());
        pipeline(second.path());

        for name in [CLEANED_FILE, SUMMARY_TABLE_FILE, SUMMARY_REPORT_FILE] {
            let a = fs::read(first.path().join(name)).unwrap();
            let b = fs::read(second.path().join(name)).unwrap();
            assert_eq!(a, b, "{} differs between runs", name);
        }

        let cleaned = fs::read_to_string(first.path().join(CLEANED_FILE)).unwrap();
        assert_eq!(cleaned.lines().count(), 6);
        let report = fs::read_to_string(first.path().join(SUMMARY_REPORT_FILE)).unwrap();
        assert!(report.starts_with("total_campus_consumption,24.25\nhighest_consuming_building,library\n"));
    }

    #[test]
    fn test_reruns_are_byte_identical() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        run(single_building(), first.path());
        run(single_building(), second.path());

        for name in [CLEANED_FILE, SUMMARY_TABLE_FILE, SUMMARY_REPORT_FILE] {
            let a = fs::read(first.path().join(name)).unwrap();
            let b = fs::read(second.path().join(name)).unwrap();
            assert_eq!(a, b, "{} differs between runs", name);
        }
    }
}
