pub mod aggregator;
pub mod data_loader;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod report;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregator::{BucketTotal, BuildingSummary, WeeklyAverage};
pub use data_loader::{discover_files, ingest_files, ingest_files_with, IngestOutcome, IngestStats};
pub use error::{MeterError, Result};
pub use models::{BuildingCatalog, BuildingSeries, MeterRecord, Reading, UnifiedDataset};
pub use normalizer::{ColumnStrategy, Normalizer, NormalizerConfig, RawTable};
pub use report::{CampusFacts, CampusReport, ChartRenderer, DashboardSeries, ReportAssembler, ReportSink};
pub use writer::CsvReportWriter;
