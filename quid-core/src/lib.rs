//! quid-core: shared types and pure utilities for the statement pipeline

pub mod dates;
pub mod error;
pub mod money;
pub mod progress;
pub mod quality;
pub mod transaction;

pub use dates::{
    DATE_FORMATS, DateFormat, DateOnly, PeriodHint, date_only, detect_date_format, month_number,
    resolve_year,
};
pub use error::ParseError;
pub use money::parse_amount;
pub use progress::{CancelToken, FnSink, NullSink, ProgressSink, ProgressUpdate, Stage};
pub use quality::{
    DigitalChecks, MIN_ACCEPTABLE_SCORE, QualityReport, score_digital, score_scanned,
};
pub use transaction::{AccountKind, ParsedTransaction};
