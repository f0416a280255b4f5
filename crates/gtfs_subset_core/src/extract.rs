use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::info;

use crate::bbox::Bbox;
use crate::cancel::CancellationToken;
use crate::error::{Result, SubsetError};
use crate::feed::FeedLayout;
use crate::progress::{NoOpProgressHandler, ProgressHandler};
use crate::referential_filter::ReferentialFilter;

fn ensure_output_dir(output_folder: &Path) -> Result<()> {
    if output_folder.exists() {
        info!(path = %output_folder.display(), "reusing existing output folder");
        Ok(())
    } else {
        fs::create_dir_all(output_folder).map_err(|e| SubsetError::io(output_folder, e))
    }
}

fn list_output_files(output_folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(output_folder).map_err(|e| SubsetError::io(output_folder, e))? {
        let entry = entry.map_err(|e| SubsetError::io(output_folder, e))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("txt") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Bbox-specific entry point: seeds the referential filter from stops inside
/// `bbox` and returns the `*.txt` files present in `output_folder` afterwards.
pub struct ExtractByBbox;

impl ExtractByBbox {
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        input: &Path,
        output_folder: &Path,
        bbox: &Bbox,
        cores: usize,
        cancel: CancellationToken,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<Vec<PathBuf>> {
        let feed = FeedLayout::open(input)?;
        ensure_output_dir(output_folder)?;
        let no_op = NoOpProgressHandler;
        let progress = progress.unwrap_or(&no_op);
        let filter = ReferentialFilter::new(&feed, output_folder, cores, cancel, progress)?;
        filter.extract_by_bbox(bbox)?;
        list_output_files(output_folder)
    }
}

/// Date-window entry point: seeds the referential filter from `calendar` ∪
/// `calendar_dates` rows overlapping `[start, end]`.
pub struct ExtractByDate;

impl ExtractByDate {
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        input: &Path,
        output_folder: &Path,
        start: NaiveDateTime,
        end: NaiveDateTime,
        cores: usize,
        cancel: CancellationToken,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<Vec<PathBuf>> {
        let feed = FeedLayout::open(input)?;
        ensure_output_dir(output_folder)?;
        let no_op = NoOpProgressHandler;
        let progress = progress.unwrap_or(&no_op);
        let filter = ReferentialFilter::new(&feed, output_folder, cores, cancel, progress)?;
        filter.extract_by_date(start, end)?;
        list_output_files(output_folder)
    }
}

/// Reads the feed's service-date window without writing any output.
pub struct Metadata;

impl Metadata {
    pub fn service_date_window(input: &Path, cores: usize) -> Result<(NaiveDateTime, NaiveDateTime)> {
        let feed = FeedLayout::open(input)?;
        let no_op = NoOpProgressHandler;
        // No output is written by a metadata probe; reuse the feed's own
        // directory as a placeholder output root that is never written to.
        let filter = ReferentialFilter::new(&feed, feed.dir(), cores, CancellationToken::new(), &no_op)?;
        filter.service_date_window()
    }
}
