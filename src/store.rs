use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rayon::iter::ParallelIterator;

use crate::{
    calendar::{SessionCalendar, SessionIdx, minute_index::MinuteIndex},
    data::{bar::BarRecord, domain::AssetId},
    error::{CalendarError, DataError, PortalError, PortalResult, SystemError},
    sorted_vec_map::SortedVecMap,
};

pub mod daily;
pub mod runs;
pub mod series;
pub mod snapshot;

pub use series::AssetMinuteSeries;

// ================================================================================================
// Raw Rows
// ================================================================================================

/// One vendor row: a minute instant plus raw OHLCV columns.
///
/// A minute without trades is marked by NaN prices and a zero (or NaN) volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinuteRow {
    pub dt: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl MinuteRow {
    pub fn new(dt: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            dt,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn no_trade(dt: DateTime<Utc>) -> Self {
        Self::new(dt, f64::NAN, f64::NAN, f64::NAN, f64::NAN, 0.0)
    }
}

// ================================================================================================
// Minute Bar Store
// ================================================================================================

/// Frozen per-asset minute records, aligned with the calendar's global minute sequence.
///
/// Built once through [`MinuteBarStoreBuilder`], then shared read-only (typically behind an
/// `Arc`) by every query component.
#[derive(Debug, Clone)]
pub struct MinuteBarStore {
    index: MinuteIndex,
    series: SortedVecMap<AssetId, AssetMinuteSeries>,
}

impl MinuteBarStore {
    pub fn builder(calendar: Arc<dyn SessionCalendar>) -> MinuteBarStoreBuilder {
        MinuteBarStoreBuilder::new(calendar)
    }

    pub fn calendar(&self) -> &Arc<dyn SessionCalendar> {
        self.index.calendar()
    }

    pub fn minute_index(&self) -> &MinuteIndex {
        &self.index
    }

    pub fn asset_count(&self) -> usize {
        self.series.len()
    }

    /// Registered assets in ascending id order.
    pub fn assets(&self) -> impl Iterator<Item = AssetId> + '_ {
        self.series.keys().copied()
    }

    pub fn iter_series(&self) -> impl Iterator<Item = &AssetMinuteSeries> {
        self.series.values()
    }

    pub fn par_series(&self) -> impl ParallelIterator<Item = &AssetMinuteSeries> {
        self.series.par_iter().map(|(_, s)| s)
    }

    /// # Errors
    /// Returns [`DataError::UnknownAsset`] if no series was written for `asset`.
    pub fn series(&self, asset: AssetId) -> PortalResult<&AssetMinuteSeries> {
        self.series
            .get(&asset)
            .ok_or_else(|| DataError::UnknownAsset(asset).into())
    }

    /// Labels of the first and last session of the asset's horizon.
    pub fn horizon(&self, asset: AssetId) -> PortalResult<(NaiveDate, NaiveDate)> {
        let series = self.series(asset)?;
        self.horizon_of(series)
    }

    /// The record at an exact minute instant.
    ///
    /// # Errors
    /// - [`DataError::UnknownAsset`] if the asset has no series.
    /// - [`DataError::OutOfHorizon`] if `dt` lies before the asset's first session open or after
    ///   its last session close.
    /// - [`CalendarError::NotAMinute`] if `dt` is inside the horizon but not a calendar minute.
    pub fn record_at(&self, asset: AssetId, dt: DateTime<Utc>) -> PortalResult<BarRecord> {
        let series = self.series(asset)?;
        let calendar = self.calendar();
        let first = calendar.session(series.first_session())?;
        let last = calendar.session(series.last_session())?;
        if dt < first.open() || dt > last.close() {
            return Err(self.out_of_horizon(series, dt));
        }

        let pos = self.index.position_of(dt)?;
        series
            .get(pos.index)
            .copied()
            .ok_or_else(|| self.out_of_horizon(series, dt))
    }

    /// The record at a global minute index.
    pub fn record_at_index(&self, asset: AssetId, index: usize) -> PortalResult<BarRecord> {
        let series = self.series(asset)?;
        if let Some(record) = series.get(index) {
            return Ok(*record);
        }
        let dt = self.index.instant_at(index).ok_or_else(|| {
            SystemError::IndexOutOfBounds(format!(
                "minute {index} of {}",
                self.index.total_minutes()
            ))
        })?;
        Err(self.out_of_horizon(series, dt))
    }

    /// The trailing `minute_count` records ending at the calendar minute at or before `end`.
    ///
    /// Minutes outside the asset's horizon read as [`BarRecord::Empty`].
    ///
    /// # Errors
    /// - [`CalendarError::CalendarGap`] if `end` precedes the calendar.
    /// - [`CalendarError::WindowBeforeCalendarStart`] if the window would start before the
    ///   first calendar minute.
    pub fn history(
        &self,
        asset: AssetId,
        end: DateTime<Utc>,
        minute_count: usize,
    ) -> PortalResult<Vec<BarRecord>> {
        let series = self.series(asset)?;
        if minute_count == 0 {
            return Ok(Vec::new());
        }
        let pos = self.index.position_at_or_before(end)?;
        let available = pos.index + 1;
        let start = available
            .checked_sub(minute_count)
            .ok_or(CalendarError::WindowBeforeCalendarStart {
                dt: end,
                requested: minute_count,
                available,
            })?;

        Ok((start..=pos.index)
            .map(|i| series.get(i).copied().unwrap_or_default())
            .collect())
    }

    fn horizon_of(&self, series: &AssetMinuteSeries) -> PortalResult<(NaiveDate, NaiveDate)> {
        let calendar = self.calendar();
        Ok((
            calendar.session(series.first_session())?.label(),
            calendar.session(series.last_session())?.label(),
        ))
    }

    fn out_of_horizon(&self, series: &AssetMinuteSeries, dt: DateTime<Utc>) -> PortalError {
        match self.horizon_of(series) {
            Ok((first, last)) => DataError::OutOfHorizon {
                asset: series.asset(),
                dt,
                first,
                last,
            }
            .into(),
            Err(e) => e,
        }
    }
}

// ================================================================================================
// Builder
// ================================================================================================

/// Exclusive write phase of a [`MinuteBarStore`].
#[derive(Debug)]
pub struct MinuteBarStoreBuilder {
    index: MinuteIndex,
    series: SortedVecMap<AssetId, AssetMinuteSeries>,
}

impl MinuteBarStoreBuilder {
    pub fn new(calendar: Arc<dyn SessionCalendar>) -> Self {
        Self {
            index: MinuteIndex::new(calendar),
            series: SortedVecMap::new(),
        }
    }

    /// Aligns raw rows to the calendar and registers them as the asset's series.
    ///
    /// The horizon covers every session from the first row's to the last row's. Calendar
    /// minutes inside the horizon without a row are stored as [`BarRecord::Empty`].
    ///
    /// # Errors
    /// - [`DataError::DuplicateSeries`] if the asset was already written.
    /// - [`DataError::MisalignedMinute`] if rows are not strictly ascending.
    /// - [`DataError::PartialRecord`] / [`DataError::InvalidVolume`] for malformed rows.
    /// - [`DataError::HorizonMismatch`] if `rows` is empty.
    /// - A calendar error if a row's instant is not a calendar minute.
    pub fn write_minutes(
        &mut self,
        asset: AssetId,
        rows: impl IntoIterator<Item = MinuteRow>,
    ) -> PortalResult<&mut Self> {
        if self.series.contains_key(&asset) {
            return Err(DataError::DuplicateSeries(asset).into());
        }

        let mut placed: Vec<(usize, BarRecord)> = Vec::new();
        let mut sessions: Option<(SessionIdx, SessionIdx)> = None;
        for row in rows {
            let pos = self.index.position_of(row.dt)?;
            if placed.last().is_some_and(|(prev, _)| pos.index <= *prev) {
                return Err(DataError::MisalignedMinute { asset, dt: row.dt }.into());
            }
            let record =
                BarRecord::from_raw(row.dt, row.open, row.high, row.low, row.close, row.volume)?;
            placed.push((pos.index, record));
            sessions = Some(match sessions {
                Some((first, _)) => (first, pos.session),
                None => (pos.session, pos.session),
            });
        }

        let Some((first, last)) = sessions else {
            return Err(DataError::HorizonMismatch {
                asset,
                msg: "no rows were supplied".to_string(),
            }
            .into());
        };

        let range = self.index.sessions_range(first, last)?;
        let mut records = vec![BarRecord::Empty; range.len()];
        for (index, record) in &placed {
            records[index - range.start] = *record;
        }

        let padded = range.len() - placed.len();
        if padded > 0 {
            tracing::warn!(
                %asset,
                padded,
                horizon_minutes = range.len(),
                "Filled unlisted minutes with empty records"
            );
        }

        self.insert(asset, first, last, range.start, records);
        Ok(self)
    }

    /// Registers already aligned records covering sessions `first..=last`.
    ///
    /// # Errors
    /// - [`DataError::DuplicateSeries`] if the asset was already written.
    /// - [`DataError::HorizonMismatch`] if `last < first` or the record count differs from the
    ///   number of calendar minutes in the horizon.
    pub fn write_records(
        &mut self,
        asset: AssetId,
        first: SessionIdx,
        last: SessionIdx,
        records: Vec<BarRecord>,
    ) -> PortalResult<&mut Self> {
        if self.series.contains_key(&asset) {
            return Err(DataError::DuplicateSeries(asset).into());
        }
        if last < first {
            return Err(DataError::HorizonMismatch {
                asset,
                msg: format!("horizon ends at {last} before it starts at {first}"),
            }
            .into());
        }
        let range = self.index.sessions_range(first, last)?;
        if range.len() != records.len() {
            return Err(DataError::HorizonMismatch {
                asset,
                msg: format!(
                    "{} records supplied for {} calendar minutes",
                    records.len(),
                    range.len()
                ),
            }
            .into());
        }

        self.insert(asset, first, last, range.start, records);
        Ok(self)
    }

    /// Freezes the store.
    #[tracing::instrument(
        skip(self),
        fields(assets = self.series.len(), calendar_minutes = self.index.total_minutes())
    )]
    pub fn build(self) -> MinuteBarStore {
        tracing::debug!(
            traded_minutes = self
                .series
                .values()
                .map(|s| s.runs().traded_count())
                .sum::<usize>(),
            "Minute bar store frozen"
        );
        MinuteBarStore {
            index: self.index,
            series: self.series,
        }
    }

    fn insert(
        &mut self,
        asset: AssetId,
        first: SessionIdx,
        last: SessionIdx,
        start: usize,
        records: Vec<BarRecord>,
    ) {
        let series =
            AssetMinuteSeries::new(asset, first, last, start, records.into_boxed_slice());
        self.series.insert(asset, series);
    }
}
