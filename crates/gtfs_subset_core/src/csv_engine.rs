use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::NaiveDateTime;
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use rayon::prelude::*;

use crate::cancel::CancellationToken;
use crate::date::DateParser;
use crate::error::{Result, SubsetError};
use crate::idset::IdSet;
use crate::schema::{ColumnType, FileSchema};

/// Row count per unit of parallel work. Chosen for cache friendliness only; it is
/// not observable in output (chunks are always concatenated back in input order).
const CHUNK_ROWS: usize = 8192;

/// A contiguous run of rows sharing one file's header. Chunks never leave the
/// engine; predicates only ever see a `&StringRecord` row plus the shared header.
pub struct Chunk<'h> {
    header: &'h StringRecord,
    rows: Vec<StringRecord>,
}

impl<'h> Chunk<'h> {
    pub fn header(&self) -> &StringRecord {
        self.header
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }
}

/// Looks up `column` by name in `header` and returns the matching field of `row`,
/// or `None` if the column is absent from this file or the row is short.
pub fn cell<'a>(header: &StringRecord, row: &'a StringRecord, column: &str) -> Option<&'a str> {
    header.iter().position(|h| h == column).and_then(|i| row.get(i))
}

/// A pure, side-effect-free row predicate evaluated once per surviving row.
pub trait Predicate: Send + Sync {
    fn keep(&self, header: &StringRecord, row: &StringRecord) -> bool;
}

/// Keeps every row. Used for unfiltered full-file scans, e.g. the metadata probe.
pub struct KeepAll;

impl Predicate for KeepAll {
    fn keep(&self, _header: &StringRecord, _row: &StringRecord) -> bool {
        true
    }
}

/// Keeps a row only if every named column's value is a member of `ids`. With a
/// single column this is simple membership; with several it is their conjunction
/// (used for `transfers`, which must match on both endpoints).
pub struct KeepIfIn<'a> {
    pub columns: &'a [&'a str],
    pub ids: &'a IdSet,
}

impl Predicate for KeepIfIn<'_> {
    fn keep(&self, header: &StringRecord, row: &StringRecord) -> bool {
        self.columns.iter().all(|column| match cell(header, row, column) {
            Some(value) => self.ids.contains(value),
            None => false,
        })
    }
}

/// Keeps a row if `(stop_lat, stop_lon)` falls inside `bbox`. Rows with
/// unparseable coordinates do not match.
pub struct KeepIfBboxContains<'a> {
    pub bbox: &'a crate::bbox::Bbox,
}

impl Predicate for KeepIfBboxContains<'_> {
    fn keep(&self, header: &StringRecord, row: &StringRecord) -> bool {
        let lat = cell(header, row, "stop_lat").and_then(|v| v.trim().parse::<f64>().ok());
        let lon = cell(header, row, "stop_lon").and_then(|v| v.trim().parse::<f64>().ok());
        match (lat, lon) {
            (Some(lat), Some(lon)) => self.bbox.contains(lat, lon),
            _ => false,
        }
    }
}

/// Keeps a row if `start <= row[column] <= end`, comparing `column` as a
/// `YYYYMMDD` date. Rows whose value fails to parse do not match.
pub struct KeepIfDateInRange<'a> {
    pub column: &'a str,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Predicate for KeepIfDateInRange<'_> {
    fn keep(&self, header: &StringRecord, row: &StringRecord) -> bool {
        let Some(value) = cell(header, row, self.column) else {
            return false;
        };
        match DateParser::parse(value) {
            Ok(ts) => ts >= self.start && ts <= self.end,
            Err(_) => false,
        }
    }
}

/// Keeps a row if `row[start_col] >= start` and `row[end_col] <= end`. Named for
/// the source system's "window overlap" step, which actually enforces
/// containment; this is intentional, not a bug — see calendar-window handling.
pub struct KeepIfWindowOverlap<'a> {
    pub start_col: &'a str,
    pub end_col: &'a str,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Predicate for KeepIfWindowOverlap<'_> {
    fn keep(&self, header: &StringRecord, row: &StringRecord) -> bool {
        let start_value = cell(header, row, self.start_col).and_then(|v| DateParser::parse(v).ok());
        let end_value = cell(header, row, self.end_col).and_then(|v| DateParser::parse(v).ok());
        match (start_value, end_value) {
            (Some(s), Some(e)) => s >= self.start && e <= self.end,
            _ => false,
        }
    }
}

/// Streams `path` in chunks, applies `predicate` to each chunk across a worker
/// pool, optionally writes the surviving rows back out with normalized quoting,
/// and collects the distinct non-empty values of each column in `return_columns`.
///
/// `use_columns`, when `Some`, projects the file down to just those columns at
/// read time (in the file's own column order); columns it names that are
/// absent from the file are silently dropped from the projection, the same
/// way an unnamed column is simply unavailable. `None` reads every column.
/// This is a performance knob only — predicates and `return_columns` only see
/// whatever columns survive the projection, so a caller must name every
/// column its predicate or `return_columns` actually needs.
///
/// Returns one [`IdSet`] per entry of `return_columns`, in the same order;
/// columns absent from the file (or projected out) contribute an empty set
/// rather than an error.
pub fn filter_file(
    path: &Path,
    schema: FileSchema,
    predicate: &dyn Predicate,
    write_to: Option<&Path>,
    use_columns: Option<&[&str]>,
    return_columns: &[&str],
    cancel: &CancellationToken,
    pool: &rayon::ThreadPool,
) -> Result<Vec<IdSet>> {
    if !path.exists() {
        return Err(SubsetError::FileMissing(path.to_path_buf()));
    }
    if cancel.is_cancelled() {
        return Err(SubsetError::Cancelled);
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| SubsetError::csv(path, e))?;
    let full_header = reader
        .headers()
        .map_err(|e| SubsetError::csv(path, e))?
        .clone();

    let projection = use_columns.map(|wanted| {
        full_header
            .iter()
            .enumerate()
            .filter(|(_, name)| wanted.contains(name))
            .map(|(index, _)| index)
            .collect::<Vec<_>>()
    });
    let header = match &projection {
        Some(indices) => indices.iter().map(|&i| &full_header[i]).collect(),
        None => full_header.clone(),
    };

    let mut raw_chunks: Vec<Vec<StringRecord>> = Vec::new();
    let mut current = Vec::with_capacity(CHUNK_ROWS);
    for record in reader.records() {
        let record = record.map_err(|e| SubsetError::csv(path, e))?;
        let record = match &projection {
            Some(indices) => indices.iter().map(|&i| &record[i]).collect(),
            None => record,
        };
        current.push(record);
        if current.len() == CHUNK_ROWS {
            raw_chunks.push(std::mem::replace(&mut current, Vec::with_capacity(CHUNK_ROWS)));
        }
    }
    if !current.is_empty() {
        raw_chunks.push(current);
    }

    let filtered: Vec<Vec<StringRecord>> = pool.install(|| {
        raw_chunks
            .into_par_iter()
            .map(|rows| {
                let chunk = Chunk {
                    header: &header,
                    rows,
                };
                chunk
                    .rows()
                    .iter()
                    .filter(|row| predicate.keep(chunk.header(), row))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    });

    if let Some(out_path) = write_to {
        write_rfc4180(out_path, &header, filtered.iter().flatten())?;
    }

    let mut id_sets = Vec::with_capacity(return_columns.len());
    for column in return_columns {
        let index = header.iter().position(|h| h == *column);
        let column_type = schema.type_of(column);
        let set = match index {
            Some(index) => filtered
                .iter()
                .flatten()
                .filter_map(|row| row.get(index))
                .filter(|value| !value.is_empty())
                .filter(|value| cell_is_present(column_type, value))
                .map(str::to_string)
                .collect::<IdSet>(),
            None => IdSet::new(),
        };
        id_sets.push(set);
    }

    Ok(id_sets)
}

/// A declared `int64`/`float64` cell that fails to parse is missing, not an
/// error; it is excluded from distinct-value collection the same way it would
/// fail any predicate that compared it numerically. `text` cells are always
/// present once non-empty.
fn cell_is_present(column_type: ColumnType, value: &str) -> bool {
    match column_type {
        ColumnType::Text => true,
        ColumnType::Int64 => value.trim().parse::<i64>().is_ok(),
        ColumnType::Float64 => value.trim().parse::<f64>().is_ok(),
    }
}

/// Copies `from` to `to` byte-for-byte, used for `feed_info.txt` which the
/// driver passes through unfiltered.
pub fn copy_unmodified(from: &Path, to: &Path) -> Result<()> {
    std::fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| SubsetError::io(from, e))
}

fn write_rfc4180<'a>(
    out_path: &Path,
    header: &StringRecord,
    rows: impl Iterator<Item = &'a StringRecord>,
) -> Result<()> {
    let file = File::create(out_path).map_err(|e| SubsetError::io(out_path, e))?;
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(BufWriter::new(file));
    writer
        .write_record(header)
        .map_err(|e| SubsetError::csv(out_path, e))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| SubsetError::csv(out_path, e))?;
    }
    writer
        .flush()
        .map_err(|e| SubsetError::io(out_path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::Bbox;
    use crate::schema::schema_for_file;
    use std::io::Write as _;

    fn thread_pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .expect("build test pool")
    }

    fn write_fixture(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).expect("create fixture");
        file.write_all(contents.as_bytes()).expect("write fixture");
        path
    }

    #[test]
    fn keep_if_in_filters_and_preserves_order() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = write_fixture(
            &tmp,
            "stops.txt",
            "stop_id,stop_name\ns1,Alpha\ns2,Beta\ns3,Gamma\n",
        );
        let ids: IdSet = ["s1".to_string(), "s3".to_string()].into_iter().collect();
        let predicate = KeepIfIn {
            columns: &["stop_id"],
            ids: &ids,
        };
        let out = tmp.path().join("out.txt");
        let cancel = CancellationToken::new();
        let pool = thread_pool();
        filter_file(
            &path,
            schema_for_file("stops.txt"),
            &predicate,
            Some(&out),
            None,
            &["stop_id"],
            &cancel,
            &pool,
        )
        .expect("filter_file");
        let contents = std::fs::read_to_string(&out).expect("read output");
        assert_eq!(
            contents,
            "\"stop_id\",\"stop_name\"\n\"s1\",\"Alpha\"\n\"s3\",\"Gamma\"\n"
        );
    }

    #[test]
    fn missing_file_fails_with_file_missing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cancel = CancellationToken::new();
        let pool = thread_pool();
        let ids = IdSet::new();
        let predicate = KeepIfIn {
            columns: &["stop_id"],
            ids: &ids,
        };
        let err = filter_file(
            &tmp.path().join("missing.txt"),
            schema_for_file("stops.txt"),
            &predicate,
            None,
            None,
            &[],
            &cancel,
            &pool,
        )
        .unwrap_err();
        assert!(matches!(err, SubsetError::FileMissing(_)));
    }

    #[test]
    fn return_columns_absent_from_file_yield_empty_sets() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = write_fixture(&tmp, "agency.txt", "agency_id,agency_name\na1,ACME\n");
        let ids: IdSet = ["a1".to_string()].into_iter().collect();
        let predicate = KeepIfIn {
            columns: &["agency_id"],
            ids: &ids,
        };
        let cancel = CancellationToken::new();
        let pool = thread_pool();
        let sets = filter_file(
            &path,
            schema_for_file("agency.txt"),
            &predicate,
            None,
            None,
            &["agency_id", "does_not_exist"],
            &cancel,
            &pool,
        )
        .expect("filter_file");
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].len(), 1);
        assert!(sets[1].is_empty());
    }

    #[test]
    fn bbox_predicate_is_inclusive_on_edges() {
        let bbox = Bbox::new(0.0, 0.0, 10.0, 10.0);
        let predicate = KeepIfBboxContains { bbox: &bbox };
        let header = StringRecord::from(vec!["stop_id", "stop_lat", "stop_lon"]);
        let inside = StringRecord::from(vec!["s1", "10", "10"]);
        let outside = StringRecord::from(vec!["s2", "10.0001", "10"]);
        assert!(predicate.keep(&header, &inside));
        assert!(!predicate.keep(&header, &outside));
    }

    #[test]
    fn window_overlap_is_containment_not_overlap() {
        let start = DateParser::parse("20221001").unwrap();
        let end = DateParser::parse("20221010").unwrap();
        let predicate = KeepIfWindowOverlap {
            start_col: "start_date",
            end_col: "end_date",
            start,
            end,
        };
        let header = StringRecord::from(vec!["start_date", "end_date"]);
        let exact_bounds = StringRecord::from(vec!["20221001", "20221010"]);
        let overlapping_but_wider = StringRecord::from(vec!["20220901", "20221015"]);
        assert!(predicate.keep(&header, &exact_bounds));
        assert!(!predicate.keep(&header, &overlapping_but_wider));
    }
}
