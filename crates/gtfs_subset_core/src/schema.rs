use crate::feed::{
    AGENCY_FILE, CALENDAR_DATES_FILE, CALENDAR_FILE, FEED_INFO_FILE, FREQUENCIES_FILE,
    ROUTES_FILE, SHAPES_FILE, STOPS_FILE, STOP_TIMES_FILE, TRANSFERS_FILE, TRIPS_FILE,
};

/// Logical cell type as declared by the schema. Extra columns encountered at read
/// time that are not in this table are treated as `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Int64,
    Float64,
}

/// Per-file column-name -> `ColumnType` table. Columns absent at read time are
/// simply unavailable to predicates that name them; this is not an error.
#[derive(Debug, Clone, Copy)]
pub struct FileSchema {
    columns: &'static [(&'static str, ColumnType)],
}

impl FileSchema {
    /// `Text` for any column not explicitly declared — matches the "extra columns
    /// are text" rule for unknown/nonstandard GTFS extensions.
    pub fn type_of(&self, column: &str) -> ColumnType {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, ty)| *ty)
            .unwrap_or(ColumnType::Text)
    }
}

const AGENCY_COLUMNS: &[(&str, ColumnType)] = &[
    ("agency_id", ColumnType::Text),
    ("agency_name", ColumnType::Text),
    ("agency_url", ColumnType::Text),
    ("agency_timezone", ColumnType::Text),
    ("agency_lang", ColumnType::Text),
    ("agency_phone", ColumnType::Text),
    ("agency_fare_url", ColumnType::Text),
    ("agency_email", ColumnType::Text),
];

const CALENDAR_COLUMNS: &[(&str, ColumnType)] = &[
    ("service_id", ColumnType::Text),
    ("monday", ColumnType::Int64),
    ("tuesday", ColumnType::Int64),
    ("wednesday", ColumnType::Int64),
    ("thursday", ColumnType::Int64),
    ("friday", ColumnType::Int64),
    ("saturday", ColumnType::Int64),
    ("sunday", ColumnType::Int64),
    ("start_date", ColumnType::Text),
    ("end_date", ColumnType::Text),
];

const CALENDAR_DATES_COLUMNS: &[(&str, ColumnType)] = &[
    ("service_id", ColumnType::Text),
    ("date", ColumnType::Text),
    ("exception_type", ColumnType::Int64),
];

const FEED_INFO_COLUMNS: &[(&str, ColumnType)] = &[
    ("feed_publisher_name", ColumnType::Text),
    ("feed_publisher_url", ColumnType::Text),
    ("feed_lang", ColumnType::Text),
    ("default_lang", ColumnType::Text),
    ("feed_start_date", ColumnType::Text),
    ("feed_end_date", ColumnType::Text),
    ("feed_version", ColumnType::Text),
    ("feed_contact_email", ColumnType::Text),
    ("feed_contact_url", ColumnType::Text),
];

const ROUTES_COLUMNS: &[(&str, ColumnType)] = &[
    ("route_id", ColumnType::Text),
    ("agency_id", ColumnType::Text),
    ("route_short_name", ColumnType::Text),
    ("route_long_name", ColumnType::Text),
    ("route_desc", ColumnType::Text),
    ("route_type", ColumnType::Int64),
    ("route_url", ColumnType::Text),
    ("route_color", ColumnType::Text),
    ("route_text_color", ColumnType::Text),
    ("route_sort_order", ColumnType::Int64),
    ("continuous_pickup", ColumnType::Int64),
    ("continuous_drop_off", ColumnType::Int64),
];

const STOPS_COLUMNS: &[(&str, ColumnType)] = &[
    ("stop_id", ColumnType::Text),
    ("stop_code", ColumnType::Text),
    ("stop_name", ColumnType::Text),
    ("stop_desc", ColumnType::Text),
    ("stop_lat", ColumnType::Float64),
    ("stop_lon", ColumnType::Float64),
    ("zone_id", ColumnType::Text),
    ("stop_url", ColumnType::Text),
    ("location_type", ColumnType::Int64),
    ("parent_station", ColumnType::Text),
    ("stop_timezone", ColumnType::Text),
    ("wheelchair_boarding", ColumnType::Int64),
    ("level_id", ColumnType::Text),
    ("platform_code", ColumnType::Text),
];

const TRIPS_COLUMNS: &[(&str, ColumnType)] = &[
    ("route_id", ColumnType::Text),
    ("service_id", ColumnType::Text),
    ("trip_id", ColumnType::Text),
    ("trip_headsign", ColumnType::Text),
    ("trip_short_name", ColumnType::Text),
    ("direction_id", ColumnType::Int64),
    ("block_id", ColumnType::Text),
    ("shape_id", ColumnType::Text),
    ("wheelchair_accessible", ColumnType::Int64),
    ("bikes_allowed", ColumnType::Int64),
];

const STOP_TIMES_COLUMNS: &[(&str, ColumnType)] = &[
    ("trip_id", ColumnType::Text),
    ("arrival_time", ColumnType::Text),
    ("departure_time", ColumnType::Text),
    ("stop_id", ColumnType::Text),
    ("stop_sequence", ColumnType::Int64),
    ("stop_headsign", ColumnType::Text),
    ("pickup_type", ColumnType::Int64),
    ("drop_off_type", ColumnType::Int64),
    ("continuous_pickup", ColumnType::Int64),
    ("continuous_drop_off", ColumnType::Int64),
    ("shape_dist_traveled", ColumnType::Float64),
    ("timepoint", ColumnType::Int64),
];

const SHAPES_COLUMNS: &[(&str, ColumnType)] = &[
    ("shape_id", ColumnType::Text),
    ("shape_pt_sequence", ColumnType::Int64),
    ("shape_pt_lat", ColumnType::Float64),
    ("shape_pt_lon", ColumnType::Float64),
    ("shape_dist_traveled", ColumnType::Float64),
];

const FREQUENCIES_COLUMNS: &[(&str, ColumnType)] = &[
    ("trip_id", ColumnType::Text),
    ("start_time", ColumnType::Text),
    ("end_time", ColumnType::Text),
    ("headway_secs", ColumnType::Int64),
    ("exact_times", ColumnType::Int64),
];

const TRANSFERS_COLUMNS: &[(&str, ColumnType)] = &[
    ("from_stop_id", ColumnType::Text),
    ("to_stop_id", ColumnType::Text),
    ("transfer_type", ColumnType::Int64),
    ("min_transfer_time", ColumnType::Int64),
];

/// `Text`-only fallback for any file name not recognized by this schema table.
const EMPTY_COLUMNS: &[(&str, ColumnType)] = &[];

pub fn schema_for_file(file_name: &str) -> FileSchema {
    let columns = if file_name.eq_ignore_ascii_case(AGENCY_FILE) {
        AGENCY_COLUMNS
    } else if file_name.eq_ignore_ascii_case(CALENDAR_DATES_FILE) {
        CALENDAR_DATES_COLUMNS
    } else if file_name.eq_ignore_ascii_case(CALENDAR_FILE) {
        CALENDAR_COLUMNS
    } else if file_name.eq_ignore_ascii_case(FEED_INFO_FILE) {
        FEED_INFO_COLUMNS
    } else if file_name.eq_ignore_ascii_case(ROUTES_FILE) {
        ROUTES_COLUMNS
    } else if file_name.eq_ignore_ascii_case(STOPS_FILE) {
        STOPS_COLUMNS
    } else if file_name.eq_ignore_ascii_case(STOP_TIMES_FILE) {
        STOP_TIMES_COLUMNS
    } else if file_name.eq_ignore_ascii_case(TRIPS_FILE) {
        TRIPS_COLUMNS
    } else if file_name.eq_ignore_ascii_case(SHAPES_FILE) {
        SHAPES_COLUMNS
    } else if file_name.eq_ignore_ascii_case(FREQUENCIES_FILE) {
        FREQUENCIES_COLUMNS
    } else if file_name.eq_ignore_ascii_case(TRANSFERS_FILE) {
        TRANSFERS_COLUMNS
    } else {
        EMPTY_COLUMNS
    };
    FileSchema { columns }
}
