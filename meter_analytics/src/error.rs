use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, normalizing and reporting meter data.
#[derive(Error, Debug)]
pub enum MeterError {
    /// A reading could not be built from the supplied values.
    #[error("Invalid reading: {0}")]
    Parse(String),

    /// The file disappeared between discovery and read.
    #[error("{} not found", .0.display())]
    FileMissing(PathBuf),

    /// Anything else that stops a single file from being used.
    #[error("error reading {file}: {reason}")]
    FileProcessing { file: String, reason: String },

    /// A discovery pattern was rejected by the glob matcher.
    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The chart renderer failed to produce the dashboard.
    #[error("Render error: {0}")]
    Render(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MeterError {
    pub(crate) fn processing(file: impl Into<String>, reason: impl ToString) -> Self {
        MeterError::FileProcessing {
            file: file.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MeterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_missing_display() {
        let err = MeterError::FileMissing(PathBuf::from("data/bldgA.csv"));
        assert_eq!(err.to_string(), "data/bldgA.csv not found");
    }

    #[test]
    fn test_processing_display() {
        let err = MeterError::processing("bldgA", "no timestamp column could be resolved");
        assert_eq!(
            err.to_string(),
            "error reading bldgA: no timestamp column could be resolved"
        );
    }
}
