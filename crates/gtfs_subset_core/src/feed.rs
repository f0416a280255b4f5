use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, SubsetError};

pub const AGENCY_FILE: &str = "agency.txt";
pub const CALENDAR_FILE: &str = "calendar.txt";
pub const CALENDAR_DATES_FILE: &str = "calendar_dates.txt";
pub const FEED_INFO_FILE: &str = "feed_info.txt";
pub const ROUTES_FILE: &str = "routes.txt";
pub const STOPS_FILE: &str = "stops.txt";
pub const STOP_TIMES_FILE: &str = "stop_times.txt";
pub const TRIPS_FILE: &str = "trips.txt";
pub const SHAPES_FILE: &str = "shapes.txt";
pub const FREQUENCIES_FILE: &str = "frequencies.txt";
pub const TRANSFERS_FILE: &str = "transfers.txt";

/// Files a feed must carry for `FeedLayout::open` to succeed.
pub const REQUIRED_FILES: &[&str] = &[
    AGENCY_FILE,
    STOPS_FILE,
    ROUTES_FILE,
    TRIPS_FILE,
    STOP_TIMES_FILE,
    CALENDAR_FILE,
    CALENDAR_DATES_FILE,
    FEED_INFO_FILE,
];

/// Files recognized at all, required or not. Order is significant: it is the
/// order substring recognition is attempted in, most-specific first so that e.g.
/// `calendar_dates.txt` is not mistaken for `calendar.txt`.
pub const GTFS_FILE_NAMES: &[&str] = &[
    AGENCY_FILE,
    CALENDAR_DATES_FILE,
    CALENDAR_FILE,
    FEED_INFO_FILE,
    ROUTES_FILE,
    STOP_TIMES_FILE,
    STOPS_FILE,
    TRIPS_FILE,
    FREQUENCIES_FILE,
    SHAPES_FILE,
    TRANSFERS_FILE,
];

/// Recognizes which canonical GTFS file `candidate` (a path or bare file name)
/// corresponds to, by substring match in `GTFS_FILE_NAMES` order. Returns `None`
/// for anything unrecognized (e.g. `_INDEX.md`, stray vendor files).
pub fn recognize_file_name(candidate: &str) -> Option<&'static str> {
    let lower = candidate.to_ascii_lowercase();
    GTFS_FILE_NAMES
        .iter()
        .find(|name| lower.contains(**name))
        .copied()
}

/// Owns a scratch directory holding an unpacked feed. The directory (and everything
/// under it) is removed when this value drops, regardless of how the scope exits.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn new_under(root: &Path, prefix: &str) -> io::Result<Self> {
        let unique = format!(
            "{prefix}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let path = root.join(unique);
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// A located, validated GTFS feed: an unpacked directory plus the recognized
/// mapping of canonical file name to on-disk path.
pub struct FeedLayout {
    // Held only to keep the scratch directory alive for the lifetime of the
    // layout when the feed was unpacked from a zip; `None` when `dir` is a
    // caller-owned directory that already existed on disk.
    _scratch: Option<ScratchDir>,
    dir: PathBuf,
    files: Vec<(&'static str, PathBuf)>,
}

impl FeedLayout {
    /// Opens a feed from either a `.zip` archive or an already-unpacked directory,
    /// and checks that every entry in [`REQUIRED_FILES`] is present.
    pub fn open(input: &Path) -> Result<Self> {
        let (scratch, dir) = if input.is_dir() {
            (None, input.to_path_buf())
        } else {
            let scratch = Self::unzip(input)?;
            let dir = scratch.path().to_path_buf();
            (Some(scratch), dir)
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| SubsetError::io(dir.clone(), e))? {
            let entry = entry.map_err(|e| SubsetError::io(dir.clone(), e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(canonical) = recognize_file_name(name) {
                files.push((canonical, path));
            }
        }

        let layout = Self {
            _scratch: scratch,
            dir,
            files,
        };
        layout.check_required()?;
        Ok(layout)
    }

    fn unzip(archive_path: &Path) -> Result<ScratchDir> {
        if archive_path.extension().and_then(|ext| ext.to_str()) != Some("zip") {
            return Err(SubsetError::BadZip {
                path: archive_path.to_path_buf(),
                reason: "input file does not have a .zip extension".to_string(),
            });
        }

        let file = File::open(archive_path).map_err(|e| SubsetError::BadZip {
            path: archive_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| SubsetError::BadZip {
            path: archive_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let scratch_root = std::env::temp_dir();
        let scratch = ScratchDir::new_under(&scratch_root, "gtfs-subset")
            .map_err(|e| SubsetError::io(scratch_root.clone(), e))?;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let Some(name) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
                continue;
            };
            if entry.is_dir() {
                continue;
            }
            let Some(file_name) = name.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let out_path = scratch.path().join(file_name);
            let mut out_file =
                File::create(&out_path).map_err(|e| SubsetError::io(out_path.clone(), e))?;
            io::copy(&mut entry, &mut out_file).map_err(|e| SubsetError::io(out_path, e))?;
        }

        Ok(scratch)
    }

    fn check_required(&self) -> Result<()> {
        let missing: Vec<&str> = REQUIRED_FILES
            .iter()
            .filter(|required| !self.files.iter().any(|(name, _)| name == *required))
            .copied()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SubsetError::FeedIncomplete {
                missing: missing.join(", "),
            })
        }
    }

    /// Directory this feed's files live under (either the caller's directory, or
    /// this layout's own scratch directory when unpacked from a zip).
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to `canonical_name` if the feed carries that file.
    pub fn path_of(&self, canonical_name: &str) -> Option<&Path> {
        self.files
            .iter()
            .find(|(name, _)| *name == canonical_name)
            .map(|(_, path)| path.as_path())
    }

    pub fn has_file(&self, canonical_name: &str) -> bool {
        self.path_of(canonical_name).is_some()
    }

    /// Requires `canonical_name` to be present, for drivers that read an optional
    /// file only after already confirming (elsewhere) that it should exist.
    pub fn require_path(&self, canonical_name: &str) -> Result<&Path> {
        self.path_of(canonical_name)
            .ok_or_else(|| SubsetError::FileMissing(self.dir.join(canonical_name)))
    }

    pub fn present_files(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.files.iter().map(|(name, _)| *name)
    }
}
