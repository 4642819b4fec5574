use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::data::domain::AssetId;

pub type PortalResult<T> = Result<T, PortalError>;
pub type CalendarResult<T> = Result<T, CalendarError>;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    System(#[from] SystemError),
}

impl PortalError {
    /// Returns `true` for errors a caller should read as "no data here" rather than a fault.
    pub fn is_out_of_horizon(&self) -> bool {
        matches!(self, PortalError::Data(DataError::OutOfHorizon { .. }))
    }
}

/// Errors related to bar records, asset series and their horizons.
#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    #[error("Unknown asset: no minute series registered for {0}")]
    UnknownAsset(AssetId),

    #[error("Instant {dt} is outside the recorded horizon of {asset} ({first} ..= {last})")]
    OutOfHorizon {
        asset: AssetId,
        dt: DateTime<Utc>,
        first: NaiveDate,
        last: NaiveDate,
    },

    #[error("Partial bar record at {dt}: {msg}")]
    PartialRecord { dt: DateTime<Utc>, msg: String },

    #[error("Invalid volume at {dt}: {volume}")]
    InvalidVolume { dt: DateTime<Utc>, volume: f64 },

    #[error("Rows for {asset} are not in ascending minute order at {dt}")]
    MisalignedMinute { asset: AssetId, dt: DateTime<Utc> },

    #[error("A minute series for {0} was already written")]
    DuplicateSeries(AssetId),

    #[error("Horizon mismatch for {asset}: {msg}")]
    HorizonMismatch { asset: AssetId, msg: String },
}

/// Errors raised by the trading calendar seam.
#[derive(Debug, Error, PartialEq)]
pub enum CalendarError {
    #[error("Instant {0} does not belong to any session and precedes the calendar")]
    CalendarGap(DateTime<Utc>),

    #[error("Instant {0} is not a minute of any session")]
    NotAMinute(DateTime<Utc>),

    #[error("Session index {index} is out of range (calendar has {len} sessions)")]
    UnknownSession { index: usize, len: usize },

    #[error("Calendar contains no sessions between {start} and {end}")]
    EmptyCalendar { start: NaiveDate, end: NaiveDate },

    #[error("Invalid session schedule on {date}: {msg}")]
    InvalidSchedule { date: NaiveDate, msg: String },

    #[error(
        "Trailing window of {requested} ending at {dt} reaches before the calendar start ({available} available)"
    )]
    WindowBeforeCalendarStart {
        dt: DateTime<Utc>,
        requested: usize,
        available: usize,
    },

    #[error("Local time {time} on {date} is ambiguous or does not exist in the calendar timezone")]
    AmbiguousLocalTime { date: NaiveDate, time: String },
}

/// Errors related to portal configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid calendar range (start: {start}, end: {end})")]
    InvalidCalendarRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid portal configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse enum: {0}")]
    ParseEnum(#[from] strum::ParseError),
}

/// Errors related to File I/O and serialization of configs and store snapshots.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO operation failed")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot encoding failed")]
    Postcard(#[from] postcard::Error),

    #[error("Snapshot {file} is corrupt: content hash is {actual}")]
    ChecksumMismatch { file: String, actual: String },

    #[error("Snapshot was written against calendar {expected}, but calendar {actual} was supplied")]
    CalendarFingerprintMismatch { expected: String, actual: String },
}

/// Errors related to internal invariants.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_errors_convert_into_portal_error() {
        let err: PortalError = DataError::UnknownAsset(AssetId(7)).into();
        assert!(matches!(err, PortalError::Data(DataError::UnknownAsset(AssetId(7)))));
        assert_eq!(err.to_string(), "Unknown asset: no minute series registered for sid(7)");

        let err: PortalError = CalendarError::UnknownSession { index: 3, len: 2 }.into();
        assert!(!err.is_out_of_horizon());
    }
}
