use std::path::Path;

use chrono::NaiveDateTime;

use crate::bbox::Bbox;
use crate::cancel::CancellationToken;
use crate::csv_engine::{
    copy_unmodified, filter_file, KeepAll, KeepIfBboxContains, KeepIfDateInRange, KeepIfIn,
    KeepIfWindowOverlap, Predicate,
};
use crate::date::DateParser;
use crate::error::{Result, SubsetError};
use crate::feed::{
    FeedLayout, AGENCY_FILE, CALENDAR_DATES_FILE, CALENDAR_FILE, FEED_INFO_FILE, FREQUENCIES_FILE,
    ROUTES_FILE, SHAPES_FILE, STOPS_FILE, STOP_TIMES_FILE, TRANSFERS_FILE, TRIPS_FILE,
};
use crate::idset::IdSet;
use crate::progress::ProgressHandler;
use crate::schema::schema_for_file;

/// Orchestrates the fixed pass order that walks the GTFS relationship graph,
/// feeding each pass's emitted id-sets into the next. One instance per extraction.
pub struct ReferentialFilter<'a> {
    feed: &'a FeedLayout,
    output_dir: &'a Path,
    cancel: CancellationToken,
    progress: &'a dyn ProgressHandler,
    pool: rayon::ThreadPool,
}

impl<'a> ReferentialFilter<'a> {
    pub fn new(
        feed: &'a FeedLayout,
        output_dir: &'a Path,
        cores: usize,
        cancel: CancellationToken,
        progress: &'a dyn ProgressHandler,
    ) -> Result<Self> {
        // Pool construction only fails if the platform refuses to spawn any
        // thread at all; there is no dedicated taxonomy kind for that, so it
        // is folded into IoFailure rather than growing the error enum for an
        // effectively unreachable case.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(cores.max(1))
            .build()
            .map_err(|e| {
                SubsetError::io(
                    output_dir,
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                )
            })?;
        Ok(Self {
            feed,
            output_dir,
            cancel,
            progress,
            pool,
        })
    }

    fn guard_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(SubsetError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn output_path(&self, file: &str) -> std::path::PathBuf {
        self.output_dir.join(file)
    }

    /// Runs one pass of `file`, applying `predicate`, writing output when
    /// `write` is true, and collecting the distinct values of `return_columns`.
    fn pass(
        &self,
        file: &str,
        predicate: &dyn Predicate,
        write: bool,
        return_columns: &[&str],
    ) -> Result<Vec<IdSet>> {
        self.guard_cancelled()?;
        self.progress.on_start_pass(file);
        let path = self.feed.require_path(file)?;
        let out_path = self.output_path(file);
        let write_to = if write { Some(out_path.as_path()) } else { None };
        let sets = filter_file(
            path,
            schema_for_file(file),
            predicate,
            write_to,
            None,
            return_columns,
            &self.cancel,
            &self.pool,
        )?;
        self.progress.on_finish_pass(file);
        Ok(sets)
    }

    /// Runs one pass of an optional `file` if it is present in the feed; a no-op
    /// returning `None` when it is absent.
    fn optional_pass(
        &self,
        file: &str,
        predicate: &dyn Predicate,
        write: bool,
        return_columns: &[&str],
    ) -> Result<Option<Vec<IdSet>>> {
        if !self.feed.has_file(file) {
            return Ok(None);
        }
        self.pass(file, predicate, write, return_columns).map(Some)
    }

    /// The sequence of passes shared by both drivers: closes the loop over
    /// stops/transfers and copies `feed_info` unmodified.
    fn common_files_tail(&self, service_ids: &IdSet, trip_ids: &IdSet) -> Result<()> {
        let by_service = KeepIfIn {
            columns: &["service_id"],
            ids: service_ids,
        };
        self.pass(CALENDAR_DATES_FILE, &by_service, true, &[])?;
        self.pass(CALENDAR_FILE, &by_service, true, &[])?;

        let by_trip = KeepIfIn {
            columns: &["trip_id"],
            ids: trip_ids,
        };
        self.optional_pass(FREQUENCIES_FILE, &by_trip, true, &[])?;

        let stop_ids_sets = self.pass(STOP_TIMES_FILE, &by_trip, true, &["stop_id"])?;
        let stop_ids = stop_ids_sets.into_iter().next().unwrap_or_default();

        let by_stop = KeepIfIn {
            columns: &["stop_id"],
            ids: &stop_ids,
        };
        self.pass(STOPS_FILE, &by_stop, true, &[])?;

        let by_transfer_endpoints = KeepIfIn {
            columns: &["from_stop_id", "to_stop_id"],
            ids: &stop_ids,
        };
        self.optional_pass(TRANSFERS_FILE, &by_transfer_endpoints, true, &[])?;

        self.guard_cancelled()?;
        let feed_info_in = self.feed.require_path(FEED_INFO_FILE)?;
        copy_unmodified(feed_info_in, &self.output_path(FEED_INFO_FILE))?;

        Ok(())
    }

    /// Seeds the referential filter from the set of stops inside `bbox`, then
    /// propagates through trips/routes/agency/shapes and the common tail.
    pub fn extract_by_bbox(&self, bbox: &Bbox) -> Result<()> {
        let in_bbox = KeepIfBboxContains { bbox };
        let stop_ids_in_bbox = self
            .pass(STOPS_FILE, &in_bbox, false, &["stop_id"])?
            .into_iter()
            .next()
            .unwrap_or_default();

        let by_stop = KeepIfIn {
            columns: &["stop_id"],
            ids: &stop_ids_in_bbox,
        };
        let trip_ids = self
            .pass(STOP_TIMES_FILE, &by_stop, false, &["trip_id"])?
            .into_iter()
            .next()
            .unwrap_or_default();

        let by_trip = KeepIfIn {
            columns: &["trip_id"],
            ids: &trip_ids,
        };
        let mut trip_collected =
            self.pass(TRIPS_FILE, &by_trip, true, &["route_id", "service_id", "shape_id"])?;
        let shape_ids = trip_collected.pop().unwrap_or_default();
        let service_ids = trip_collected.pop().unwrap_or_default();
        let route_ids = trip_collected.pop().unwrap_or_default();

        self.extract_common_downstream(&route_ids, &shape_ids)?;
        self.common_files_tail(&service_ids, &trip_ids)
    }

    /// Seeds the referential filter from `calendar` ∪ `calendar_dates` rows
    /// overlapping `[start, end]`, then propagates the same way as the bbox
    /// driver before running the common tail.
    pub fn extract_by_date(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<()> {
        let window = KeepIfWindowOverlap {
            start_col: "start_date",
            end_col: "end_date",
            start,
            end,
        };
        let mut service_ids = self
            .pass(CALENDAR_FILE, &window, true, &["service_id"])?
            .into_iter()
            .next()
            .unwrap_or_default();

        let in_range = KeepIfDateInRange {
            column: "date",
            start,
            end,
        };
        if let Some(mut sets) = self.optional_pass(CALENDAR_DATES_FILE, &in_range, true, &["service_id"])? {
            service_ids.union_with(sets.pop().unwrap_or_default());
        }

        let by_service = KeepIfIn {
            columns: &["service_id"],
            ids: &service_ids,
        };
        let mut trips_collected = self.pass(
            TRIPS_FILE,
            &by_service,
            true,
            &["route_id", "trip_id", "shape_id"],
        )?;
        let shape_ids = trips_collected.pop().unwrap_or_default();
        let trip_ids = trips_collected.pop().unwrap_or_default();
        let route_ids = trips_collected.pop().unwrap_or_default();

        self.extract_common_downstream(&route_ids, &shape_ids)?;
        self.common_files_tail(&service_ids, &trip_ids)
    }

    /// `routes` -> `agency`, plus the optional `shapes` pass. Shared by both
    /// drivers once they have settled on `route_ids`/`shape_ids`.
    fn extract_common_downstream(&self, route_ids: &IdSet, shape_ids: &IdSet) -> Result<()> {
        let by_route = KeepIfIn {
            columns: &["route_id"],
            ids: route_ids,
        };
        let agency_ids = self
            .pass(ROUTES_FILE, &by_route, true, &["agency_id"])?
            .into_iter()
            .next()
            .unwrap_or_default();

        let by_agency = KeepIfIn {
            columns: &["agency_id"],
            ids: &agency_ids,
        };
        self.pass(AGENCY_FILE, &by_agency, true, &[])?;

        let by_shape = KeepIfIn {
            columns: &["shape_id"],
            ids: shape_ids,
        };
        self.optional_pass(SHAPES_FILE, &by_shape, true, &[])?;

        Ok(())
    }

    /// Reads `calendar.start_date` min and `calendar.end_date` max across the
    /// whole (unfiltered) file.
    pub fn service_date_window(&self) -> Result<(NaiveDateTime, NaiveDateTime)> {
        let path = self.feed.require_path(CALENDAR_FILE)?;
        let sets = filter_file(
            path,
            schema_for_file(CALENDAR_FILE),
            &KeepAll,
            None,
            Some(&["start_date", "end_date"]),
            &["start_date", "end_date"],
            &self.cancel,
            &self.pool,
        )?;
        let mut iter = sets.into_iter();
        let start_values = iter.next().unwrap_or_default();
        let end_values = iter.next().unwrap_or_default();

        let min_start = start_values
            .iter()
            .filter_map(|v| DateParser::parse(v).ok())
            .min()
            .ok_or_else(|| SubsetError::BadDate("calendar.start_date".to_string()))?;
        let max_end = end_values
            .iter()
            .filter_map(|v| DateParser::parse(v).ok())
            .max()
            .ok_or_else(|| SubsetError::BadDate("calendar.end_date".to_string()))?;
        Ok((min_start, max_end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoOpProgressHandler;
    use std::fs;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut f = fs::File::create(dir.join(name)).expect("create fixture");
        f.write_all(contents.as_bytes()).expect("write fixture");
    }

    fn build_fixture(dir: &Path) {
        write_file(dir, AGENCY_FILE, "agency_id,agency_name\na1,ACME\n");
        write_file(
            dir,
            STOPS_FILE,
            "stop_id,stop_name,stop_lat,stop_lon\ns1,In,5,5\ns2,Out,50,50\n",
        );
        write_file(
            dir,
            ROUTES_FILE,
            "route_id,agency_id,route_type\nr1,a1,3\n",
        );
        write_file(
            dir,
            TRIPS_FILE,
            "route_id,service_id,trip_id,shape_id\nr1,svc1,t1,sh1\n",
        );
        write_file(
            dir,
            STOP_TIMES_FILE,
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence\nt1,08:00:00,08:00:00,s1,1\n",
        );
        write_file(
            dir,
            CALENDAR_FILE,
            "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\nsvc1,1,1,1,1,1,0,0,20221001,20221010\n",
        );
        write_file(
            dir,
            CALENDAR_DATES_FILE,
            "service_id,date,exception_type\nsvc1,20221005,1\n",
        );
        write_file(
            dir,
            FEED_INFO_FILE,
            "feed_publisher_name,feed_publisher_url,feed_lang\nAcme,https://acme.example,en\n",
        );
        write_file(
            dir,
            SHAPES_FILE,
            "shape_id,shape_pt_sequence,shape_pt_lat,shape_pt_lon\nsh1,1,5,5\n",
        );
    }

    #[test]
    fn bbox_extraction_keeps_only_reachable_rows() {
        let tmp = tempfile::tempdir().expect("tempdir");
        build_fixture(tmp.path());
        let feed = FeedLayout::open(tmp.path()).expect("open feed");
        let out = tempfile::tempdir().expect("out dir");
        let progress = NoOpProgressHandler;
        let filter = ReferentialFilter::new(
            &feed,
            out.path(),
            1,
            CancellationToken::new(),
            &progress,
        )
        .expect("build filter");

        let bbox = Bbox::new(0.0, 0.0, 10.0, 10.0);
        filter.extract_by_bbox(&bbox).expect("extract");

        let stops_out = fs::read_to_string(out.path().join(STOPS_FILE)).expect("read stops");
        assert!(stops_out.contains("\"s1\""));
        assert!(!stops_out.contains("\"s2\""));

        let trips_out = fs::read_to_string(out.path().join(TRIPS_FILE)).expect("read trips");
        assert!(trips_out.contains("\"t1\""));

        assert!(!out.path().join(TRANSFERS_FILE).exists());
    }

    #[test]
    fn date_extraction_is_containment_not_overlap() {
        let tmp = tempfile::tempdir().expect("tempdir");
        build_fixture(tmp.path());
        let feed = FeedLayout::open(tmp.path()).expect("open feed");
        let out = tempfile::tempdir().expect("out dir");
        let progress = NoOpProgressHandler;
        let filter = ReferentialFilter::new(
            &feed,
            out.path(),
            2,
            CancellationToken::new(),
            &progress,
        )
        .expect("build filter");

        let start = DateParser::parse("20221001").unwrap();
        let end = DateParser::parse("20221010").unwrap();
        filter.extract_by_date(start, end).expect("extract");

        let calendar_out = fs::read_to_string(out.path().join(CALENDAR_FILE)).expect("read calendar");
        assert!(calendar_out.contains("svc1"));
    }

    #[test]
    fn metadata_probe_reports_min_and_max() {
        let tmp = tempfile::tempdir().expect("tempdir");
        build_fixture(tmp.path());
        write_file(
            tmp.path(),
            CALENDAR_FILE,
            "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\nsvc1,1,1,1,1,1,0,0,20221002,20221009\nsvc2,0,0,0,0,0,1,1,20221002,20221009\n",
        );
        let feed = FeedLayout::open(tmp.path()).expect("open feed");
        let out = tempfile::tempdir().expect("out dir");
        let progress = NoOpProgressHandler;
        let filter = ReferentialFilter::new(
            &feed,
            out.path(),
            1,
            CancellationToken::new(),
            &progress,
        )
        .expect("build filter");

        let (min_start, max_end) = filter.service_date_window().expect("probe");
        assert_eq!(DateParser::format(&min_start), "2022-10-02 00:00:00");
        assert_eq!(DateParser::format(&max_end), "2022-10-09 00:00:00");
    }
}
