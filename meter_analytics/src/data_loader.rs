use crate::error::{MeterError, Result};
use crate::models::UnifiedDataset;
use crate::normalizer::{building_name, FileBatch, Normalizer, NormalizerConfig, RawTable};
use glob::glob;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Find meter files under `dir` whose names match `pattern`, in sorted path
/// order. A missing directory is not an error; it simply holds no files.
pub fn discover_files(dir: &Path, pattern: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        warn!("Data directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = if recursive {
        let matcher = glob::Pattern::new(pattern)?;
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map_or(false, |name| matcher.matches(name))
            })
            .map(|entry| entry.into_path())
            .collect()
    } else {
        // Only the file pattern is a glob; the directory is taken literally
        let full_pattern = Path::new(&glob::Pattern::escape(&dir.to_string_lossy())).join(pattern);
        glob(&full_pattern.to_string_lossy())?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect()
    };

    files.sort();
    Ok(files)
}

/// Read one CSV file into a [`RawTable`] named after the file.
pub fn read_table(path: &Path) -> Result<RawTable> {
    let source = building_name(path)
        .ok_or_else(|| MeterError::processing(path.display().to_string(), "file has no usable name"))?;

    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => MeterError::FileMissing(path.to_path_buf()),
        _ => MeterError::processing(source.as_str(), e),
    })?;

    read_table_from(file, source)
}

/// Read header-driven CSV rows from any reader. Rows wider than the header
/// are malformed and skipped.
pub fn read_table_from<R: Read>(reader: R, source: impl Into<String>) -> Result<RawTable> {
    let source = source.into();
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| MeterError::processing(source.as_str(), e))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(MeterError::processing(source.as_str(), "no columns to parse from file"));
    }

    let mut rows = Vec::new();
    let mut malformed = 0usize;

    for result in csv_reader.records() {
        match result {
            Ok(record) if record.len() <= headers.len() => {
                rows.push(record.iter().map(str::to_string).collect());
            }
            Ok(_) => malformed += 1,
            Err(e) if e.is_io_error() => return Err(MeterError::processing(source.as_str(), e)),
            Err(_) => malformed += 1,
        }
    }

    if malformed > 0 {
        debug!("{}: skipped {} malformed rows", source, malformed);
    }

    Ok(RawTable::new(source, headers, rows))
}

/// Read and normalize a single file.
pub fn load_file(path: &Path, normalizer: &Normalizer) -> Result<FileBatch> {
    let table = read_table(path)?;
    normalizer.normalize(&table)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub files_seen: usize,
    pub files_loaded: usize,
    pub files_failed: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub dataset: UnifiedDataset,
    pub stats: IngestStats,
}

pub fn ingest_files(paths: &[PathBuf], config: &NormalizerConfig, parallel: bool) -> IngestOutcome {
    ingest_files_with(paths, config, parallel, |_| {})
}

/// Load every file into one [`UnifiedDataset`]. Files are independent, so the
/// parallel path yields exactly what the sequential one does. Failures are
/// logged and the file contributes nothing.
pub fn ingest_files_with<F>(
    paths: &[PathBuf],
    config: &NormalizerConfig,
    parallel: bool,
    on_file: F,
) -> IngestOutcome
where
    F: Fn(&Path) + Sync,
{
    let normalizer = Normalizer::new(config.clone());
    let load = |path: &PathBuf| {
        let result = load_file(path, &normalizer);
        on_file(path);
        result
    };

    let results: Vec<Result<FileBatch>> = if parallel {
        paths.par_iter().map(load).collect()
    } else {
        paths.iter().map(load).collect()
    };

    let mut stats = IngestStats {
        files_seen: paths.len(),
        ..Default::default()
    };
    let mut batches = Vec::with_capacity(results.len());

    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(batch) => {
                debug!(
                    "{}: {} readings from {}",
                    batch.building,
                    batch.records.len(),
                    path.display()
                );
                stats.files_loaded += 1;
                stats.rows_kept += batch.records.len();
                stats.rows_dropped += batch.stats.dropped_timestamp + batch.stats.dropped_kwh;
                batches.push(batch.records);
            }
            Err(MeterError::FileMissing(missing)) => {
                stats.files_failed += 1;
                error!("{} not found", missing.display());
            }
            Err(e) => {
                stats.files_failed += 1;
                error!("error reading {}: {}", path.display(), e);
            }
        }
    }

    let dataset = UnifiedDataset::from_batches(batches);
    info!(
        "Loaded {} of {} files: {} readings kept, {} rows dropped",
        stats.files_loaded,
        stats.files_seen,
        stats.rows_kept,
        stats.rows_dropped
    );

    IngestOutcome { dataset, stats }
}
