use std::{fmt::Debug, sync::Arc};

use rayon::iter::ParallelIterator;

use crate::{
    calendar::{SessionCalendar, SessionIdx},
    data::{bar::BarRecord, domain::AssetId},
    error::{DataError, PortalResult, SystemError},
    sorted_vec_map::SortedVecMap,
    store::{MinuteBarStore, runs::TradedRuns},
};

/// Session-level aggregate records, one per asset and session.
pub trait DailyBarReader: Debug + Send + Sync {
    /// First and last session for which the asset has records.
    ///
    /// # Errors
    /// Returns [`DataError::UnknownAsset`] if the asset has no daily series.
    fn horizon(&self, asset: AssetId) -> PortalResult<(SessionIdx, SessionIdx)>;

    /// The aggregate record of one session.
    ///
    /// # Errors
    /// Returns [`DataError::OutOfHorizon`] for sessions outside the asset's horizon.
    fn session_record(&self, asset: AssetId, session: SessionIdx) -> PortalResult<BarRecord>;

    /// The latest traded session at or before `session`, clamped to the horizon.
    fn last_traded_session(
        &self,
        asset: AssetId,
        session: SessionIdx,
    ) -> PortalResult<Option<SessionIdx>> {
        let (first, last) = self.horizon(asset)?;
        if session < first {
            return Ok(None);
        }
        for idx in (first.0..=session.min(last).0).rev() {
            if !self.session_record(asset, SessionIdx(idx))?.is_empty() {
                return Ok(Some(SessionIdx(idx)));
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Clone)]
struct DailySeries {
    first: SessionIdx,
    records: Box<[BarRecord]>,
    runs: TradedRuns,
}

/// Daily bars rolled up from a [`MinuteBarStore`].
///
/// Each session record takes the first open, highest high, lowest low and last close of the
/// session's traded minutes and sums their volume. A session without trades is empty.
#[derive(Debug, Clone)]
pub struct MinuteDerivedDailyBars {
    calendar: Arc<dyn SessionCalendar>,
    series: SortedVecMap<AssetId, DailySeries>,
}

impl MinuteDerivedDailyBars {
    #[tracing::instrument(skip(store), fields(assets = store.asset_count()))]
    pub fn from_store(store: &MinuteBarStore) -> PortalResult<Self> {
        let index = store.minute_index();
        let series = store
            .par_series()
            .map(|s| -> PortalResult<(AssetId, DailySeries)> {
                let offset = s.index_range().start;
                let records = (s.first_session().0..=s.last_session().0)
                    .map(|idx| -> PortalResult<BarRecord> {
                        let range = index.session_range(SessionIdx(idx))?;
                        let minutes = s
                            .records()
                            .get(range.start - offset..range.end - offset)
                            .ok_or_else(|| {
                                SystemError::IndexOutOfBounds(format!(
                                    "session {idx} outside series of {}",
                                    s.asset()
                                ))
                            })?;
                        Ok(BarRecord::aggregate(minutes))
                    })
                    .collect::<PortalResult<Box<[BarRecord]>>>()?;
                let runs = TradedRuns::from_records(&records);
                Ok((
                    s.asset(),
                    DailySeries {
                        first: s.first_session(),
                        records,
                        runs,
                    },
                ))
            })
            .collect::<PortalResult<Vec<_>>>()?;

        tracing::debug!(assets = series.len(), "Derived daily bars from minute records");

        Ok(Self {
            calendar: store.calendar().clone(),
            series: series.into_iter().collect(),
        })
    }

    fn daily(&self, asset: AssetId) -> PortalResult<&DailySeries> {
        self.series
            .get(&asset)
            .ok_or_else(|| DataError::UnknownAsset(asset).into())
    }
}

impl DailySeries {
    fn last(&self) -> SessionIdx {
        SessionIdx(self.first.0 + self.records.len() - 1)
    }
}

impl DailyBarReader for MinuteDerivedDailyBars {
    fn horizon(&self, asset: AssetId) -> PortalResult<(SessionIdx, SessionIdx)> {
        let daily = self.daily(asset)?;
        Ok((daily.first, daily.last()))
    }

    fn session_record(&self, asset: AssetId, session: SessionIdx) -> PortalResult<BarRecord> {
        let daily = self.daily(asset)?;
        if let Some(record) = session
            .0
            .checked_sub(daily.first.0)
            .and_then(|local| daily.records.get(local))
        {
            return Ok(*record);
        }

        let dt = self.calendar.session(session)?.label_instant();
        Err(DataError::OutOfHorizon {
            asset,
            dt,
            first: self.calendar.session(daily.first)?.label(),
            last: self.calendar.session(daily.last())?.label(),
        }
        .into())
    }

    fn last_traded_session(
        &self,
        asset: AssetId,
        session: SessionIdx,
    ) -> PortalResult<Option<SessionIdx>> {
        let daily = self.daily(asset)?;
        Ok(session
            .0
            .checked_sub(daily.first.0)
            .and_then(|local| daily.runs.last_traded_at_or_before(local))
            .map(|local| SessionIdx(daily.first.0 + local)))
    }
}
