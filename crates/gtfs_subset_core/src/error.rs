use std::path::PathBuf;

/// Error taxonomy for the extraction engine. Every pass failure surfaces as one of
/// these variants and is fatal to the run — there is no retry.
#[derive(Debug, thiserror::Error)]
pub enum SubsetError {
    #[error("feed is missing required file(s): {missing}")]
    FeedIncomplete { missing: String },

    #[error("referenced file does not exist: {0}")]
    FileMissing(PathBuf),

    #[error("input {path} is not a readable .zip archive: {reason}")]
    BadZip { path: PathBuf, reason: String },

    #[error("date string '{0}' does not match YYYYMMDD")]
    BadDate(String),

    #[error("bbox string '{0}' could not be parsed into four floats")]
    BadBbox(String),

    #[error("extraction was cancelled")]
    Cancelled,

    #[error("i/o failure on {path}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv failure on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("zip failure: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, SubsetError>;

impl SubsetError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SubsetError::IoFailure {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        SubsetError::Csv {
            path: path.into(),
            source,
        }
    }
}
