//! Price sources and table conversion.
//!
//! The providers are the pipeline's external collaborators: they hand back
//! raw daily bars and know nothing about features. `frame` turns those bars
//! into the polars table every later stage works on.

pub mod csv_source;
pub mod frame;
pub mod provider;
pub mod snapshot;
pub mod yahoo;

pub use csv_source::CsvProvider;
pub use frame::{bars_to_frame, normalize_dates, FrameError, REQUIRED_SOURCE_COLUMNS};
pub use provider::{dataset_hash, DataError, DataProvider, DataSource, FetchResult, RawBar};
pub use snapshot::write_raw_snapshot;
pub use yahoo::{RetryPolicy, YahooProvider};
