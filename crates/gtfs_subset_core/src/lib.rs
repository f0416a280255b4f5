//! Core extraction engine for the GTFS subsetter: given a GTFS feed, produce a
//! new feed restricted to a bounding box or service-date window while
//! preserving the cross-file referential relationships GTFS requires.

pub mod bbox;
pub mod cancel;
pub mod csv_engine;
pub mod date;
pub mod error;
pub mod extract;
pub mod feed;
pub mod idset;
pub mod progress;
pub mod referential_filter;
pub mod schema;

pub use bbox::Bbox;
pub use cancel::CancellationToken;
pub use date::DateParser;
pub use error::{Result, SubsetError};
pub use extract::{ExtractByBbox, ExtractByDate, Metadata};
pub use feed::FeedLayout;
pub use idset::IdSet;
pub use progress::{NoOpProgressHandler, ProgressHandler};
pub use referential_filter::ReferentialFilter;
pub use schema::{schema_for_file, ColumnType, FileSchema};
