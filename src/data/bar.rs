use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    data::domain::{BarField, Price, Volume},
    error::DataError,
};

// ================================================================================================
// Bar
// ================================================================================================

/// A fully populated OHLCV observation for one asset over one minute or one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    /// Always strictly positive for a stored bar.
    pub volume: Volume,
}

impl Bar {
    /// Folds a later bar into this one, as when rolling minutes up into a session bar.
    ///
    /// The open is kept, the close and extremes are taken from `later`, volume is summed.
    pub fn merge(self, later: &Bar) -> Bar {
        Bar {
            open: self.open,
            high: Price(self.high.0.max(later.high.0)),
            low: Price(self.low.0.min(later.low.0)),
            close: later.close,
            volume: self.volume + later.volume,
        }
    }
}

// ================================================================================================
// BarRecord
// ================================================================================================

/// One slot of an asset series.
///
/// Missing trades are stored explicitly as [`BarRecord::Empty`] rather than being omitted,
/// which keeps every series aligned index-for-index with the calendar's minute sequence.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum BarRecord {
    /// No trade occurred in this slot.
    #[default]
    Empty,
    /// At least one trade occurred.
    Traded(Bar),
}

impl BarRecord {
    /// Builds a record from raw vendor columns where "no trade" is marked by NaN prices and a
    /// zero (or NaN) volume.
    ///
    /// # Errors
    /// - [`DataError::InvalidVolume`] if the volume is negative, infinite or fractional.
    /// - [`DataError::PartialRecord`] if prices and volume disagree about whether a trade
    ///   happened (some prices missing, or prices present with zero volume).
    pub fn from_raw(
        dt: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, DataError> {
        let volume = if volume.is_nan() { 0.0 } else { volume };
        if !volume.is_finite() || volume < 0.0 || volume.fract() != 0.0 {
            return Err(DataError::InvalidVolume { dt, volume });
        }

        let prices = [open, high, low, close];
        let quoted = prices.iter().filter(|p| p.is_finite()).count();

        match (quoted, volume == 0.0) {
            (0, true) => Ok(BarRecord::Empty),
            (4, false) => Ok(BarRecord::Traded(Bar {
                open: Price(open),
                high: Price(high),
                low: Price(low),
                close: Price(close),
                volume: Volume(volume as u64),
            })),
            (4, true) => Err(DataError::PartialRecord {
                dt,
                msg: "prices present but volume is zero".to_string(),
            }),
            (n, _) => Err(DataError::PartialRecord {
                dt,
                msg: format!("{n} of 4 price fields present"),
            }),
        }
    }

    /// Returns `true` when no trade occurred in this slot.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, BarRecord::Empty)
    }

    #[inline]
    pub fn bar(&self) -> Option<&Bar> {
        match self {
            BarRecord::Traded(bar) => Some(bar),
            BarRecord::Empty => None,
        }
    }

    /// Reads a single field as a plain number.
    ///
    /// Prices of an empty record are `None`; its volume is `Some(0.0)`.
    /// [`BarField::Price`] reads the close and is forward-filled by the portal, not here.
    pub fn field(&self, field: BarField) -> Option<f64> {
        match (self, field) {
            (BarRecord::Empty, BarField::Volume) => Some(0.0),
            (BarRecord::Empty, _) => None,
            (BarRecord::Traded(bar), BarField::Open) => Some(bar.open.0),
            (BarRecord::Traded(bar), BarField::High) => Some(bar.high.0),
            (BarRecord::Traded(bar), BarField::Low) => Some(bar.low.0),
            (BarRecord::Traded(bar), BarField::Close | BarField::Price) => Some(bar.close.0),
            (BarRecord::Traded(bar), BarField::Volume) => Some(bar.volume.0 as f64),
        }
    }

    /// Rolls a chronological run of records up into a single record.
    ///
    /// Empty slots are skipped; the result is empty iff every input is empty.
    pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a BarRecord>) -> BarRecord {
        records
            .into_iter()
            .filter_map(BarRecord::bar)
            .fold(BarRecord::Empty, |acc, bar| match acc {
                BarRecord::Empty => BarRecord::Traded(*bar),
                BarRecord::Traded(agg) => BarRecord::Traded(agg.merge(bar)),
            })
    }
}

impl From<Bar> for BarRecord {
    fn from(bar: Bar) -> Self {
        BarRecord::Traded(bar)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 8, 1, 13, 31, 0).unwrap()
    }

    fn bar(open: f64, high: f64, low: f64, close: f64, volume: u64) -> Bar {
        Bar {
            open: Price(open),
            high: Price(high),
            low: Price(low),
            close: Price(close),
            volume: Volume(volume),
        }
    }

    #[test]
    fn nan_prices_with_zero_volume_are_empty() {
        let nan = f64::NAN;
        let record = BarRecord::from_raw(ts(), nan, nan, nan, nan, 0.0).unwrap();
        assert!(record.is_empty());

        // Vendors sometimes mark the volume of an empty minute as NaN as well.
        let record = BarRecord::from_raw(ts(), nan, nan, nan, nan, nan).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn fully_quoted_row_is_traded() {
        let record = BarRecord::from_raw(ts(), 100.5, 100.9, 100.1, 100.3, 1000.0).unwrap();
        assert_eq!(record, BarRecord::Traded(bar(100.5, 100.9, 100.1, 100.3, 1000)));
        assert_eq!(record.field(BarField::Close), Some(100.3));
        assert_eq!(record.field(BarField::Volume), Some(1000.0));
    }

    #[test]
    fn partial_rows_are_rejected() {
        let nan = f64::NAN;
        let err = BarRecord::from_raw(ts(), 1.0, nan, 1.0, 1.0, 10.0).unwrap_err();
        assert!(matches!(err, DataError::PartialRecord { .. }));

        let err = BarRecord::from_raw(ts(), 1.0, 1.0, 1.0, 1.0, 0.0).unwrap_err();
        assert!(matches!(err, DataError::PartialRecord { .. }));

        let err = BarRecord::from_raw(ts(), nan, nan, nan, nan, 5.0).unwrap_err();
        assert!(matches!(err, DataError::PartialRecord { .. }));
    }

    #[test]
    fn invalid_volumes_are_rejected() {
        for volume in [-1.0, 0.5, f64::INFINITY] {
            let err = BarRecord::from_raw(ts(), 1.0, 1.0, 1.0, 1.0, volume).unwrap_err();
            assert!(matches!(err, DataError::InvalidVolume { .. }), "volume {volume}");
        }
    }

    #[test]
    fn empty_record_exposes_zero_volume_and_no_prices() {
        let record = BarRecord::Empty;
        assert_eq!(record.field(BarField::Volume), Some(0.0));
        assert_eq!(record.field(BarField::Open), None);
        assert_eq!(record.field(BarField::Price), None);
        assert!(record.bar().is_none());
    }

    #[test]
    fn aggregate_skips_empty_slots() {
        let records = [
            BarRecord::Empty,
            BarRecord::Traded(bar(103.5, 103.9, 103.1, 103.3, 1003)),
            BarRecord::Traded(bar(102.5, 102.9, 102.1, 102.3, 1002)),
            BarRecord::Empty,
            BarRecord::Traded(bar(104.5, 104.9, 104.1, 104.3, 1004)),
        ];
        let agg = BarRecord::aggregate(&records);
        assert_eq!(agg, BarRecord::Traded(bar(103.5, 104.9, 102.1, 104.3, 3009)));

        assert!(BarRecord::aggregate(&[BarRecord::Empty, BarRecord::Empty]).is_empty());
    }
}
