use crate::error::{MeterError, Result};
use crate::models::{parse_kwh, parse_timestamp, MeterRecord, Reading};
use chrono::NaiveDateTime;
use log::debug;
use std::fmt;
use std::path::Path;

/// Header-driven rows of one input file, as handed over by the reader.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Logical source name; becomes the building key.
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Header names are trimmed and short rows padded with empty cells.
    pub fn new(source: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();

        Self {
            source: source.into(),
            headers,
            rows,
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// True when the column has at least one value and every non-empty value
    /// parses as a number.
    pub fn is_numeric_column(&self, column: usize) -> bool {
        let mut seen_value = false;
        for row in 0..self.rows.len() {
            let cell = self.cell(row, column).trim();
            if cell.is_empty() {
                continue;
            }
            if cell.parse::<f64>().is_err() {
                return false;
            }
            seen_value = true;
        }
        seen_value
    }
}

/// One way of locating a column in a [`RawTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnStrategy {
    /// A header with exactly this name.
    Named(String),
    /// The first column holding only numbers.
    FirstNumeric,
    /// A zero-based column position.
    Positional(usize),
}

impl ColumnStrategy {
    pub fn named(name: impl Into<String>) -> Self {
        ColumnStrategy::Named(name.into())
    }

    pub fn resolve(&self, table: &RawTable) -> Option<usize> {
        match self {
            ColumnStrategy::Named(name) => table.headers.iter().position(|h| h == name),
            ColumnStrategy::FirstNumeric => {
                (0..table.headers.len()).find(|&idx| table.is_numeric_column(idx))
            }
            ColumnStrategy::Positional(idx) => (*idx < table.headers.len()).then_some(*idx),
        }
    }
}

impl fmt::Display for ColumnStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnStrategy::Named(name) => write!(f, "named column '{}'", name),
            ColumnStrategy::FirstNumeric => write!(f, "first numeric column"),
            ColumnStrategy::Positional(idx) => write!(f, "column #{}", idx),
        }
    }
}

/// Ordered strategy chains for the timestamp and value columns.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizerConfig {
    pub timestamp_strategies: Vec<ColumnStrategy>,
    pub value_strategies: Vec<ColumnStrategy>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            timestamp_strategies: vec![
                ColumnStrategy::named("timestamp"),
                ColumnStrategy::named("date"),
                ColumnStrategy::named("datetime"),
                ColumnStrategy::Positional(0),
            ],
            value_strategies: vec![
                ColumnStrategy::named("kwh"),
                ColumnStrategy::FirstNumeric,
                ColumnStrategy::Positional(1),
            ],
        }
    }
}

impl NormalizerConfig {
    /// Try `name` before any of the built-in timestamp strategies.
    pub fn with_timestamp_column(mut self, name: impl Into<String>) -> Self {
        self.timestamp_strategies.insert(0, ColumnStrategy::named(name));
        self
    }

    /// Try `name` before any of the built-in value strategies.
    pub fn with_value_column(mut self, name: impl Into<String>) -> Self {
        self.value_strategies.insert(0, ColumnStrategy::named(name));
        self
    }
}

/// Per-file row accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub rows_read: usize,
    pub dropped_timestamp: usize,
    pub dropped_kwh: usize,
}

impl NormalizeStats {
    pub fn rows_kept(&self) -> usize {
        self.rows_read - self.dropped_timestamp - self.dropped_kwh
    }
}

/// Normalized output of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileBatch {
    pub building: String,
    pub records: Vec<MeterRecord>,
    pub stats: NormalizeStats,
}

#[derive(Debug, Clone, Copy)]
struct NormalizedRow {
    timestamp: Option<NaiveDateTime>,
    kwh: Option<f64>,
}

pub struct Normalizer {
    config: NormalizerConfig,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Resolve the timestamp and value columns, coerce every row once, then
    /// keep only rows with both a timestamp and a finite kWh value.
    pub fn normalize(&self, table: &RawTable) -> Result<FileBatch> {
        let ts_col = select_column(table, &self.config.timestamp_strategies, "timestamp")?;
        let kwh_col = select_column(table, &self.config.value_strategies, "kwh")?;

        let rows: Vec<NormalizedRow> = (0..table.rows.len())
            .map(|row| NormalizedRow {
                timestamp: parse_timestamp(table.cell(row, ts_col)),
                kwh: parse_kwh(table.cell(row, kwh_col)),
            })
            .collect();

        let mut stats = NormalizeStats {
            rows_read: rows.len(),
            ..Default::default()
        };
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            let Some(timestamp) = row.timestamp else {
                stats.dropped_timestamp += 1;
                continue;
            };
            let Some(kwh) = row.kwh else {
                stats.dropped_kwh += 1;
                continue;
            };
            records.push(MeterRecord::new(Reading::new(timestamp, kwh)?, table.source.as_str()));
        }

        debug!(
            "{}: kept {} of {} rows ({} without timestamp, {} without kwh)",
            table.source,
            records.len(),
            stats.rows_read,
            stats.dropped_timestamp,
            stats.dropped_kwh
        );

        Ok(FileBatch {
            building: table.source.clone(),
            records,
            stats,
        })
    }
}

fn select_column(table: &RawTable, strategies: &[ColumnStrategy], role: &str) -> Result<usize> {
    for strategy in strategies {
        if let Some(idx) = strategy.resolve(table) {
            debug!(
                "{}: {} column '{}' chosen by {}",
                table.source, role, table.headers[idx], strategy
            );
            return Ok(idx);
        }
    }
    Err(MeterError::processing(
        table.source.as_str(),
        format!("no {} column could be resolved", role),
    ))
}

/// Building key for a file: its name without directory or extension.
pub fn building_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}
