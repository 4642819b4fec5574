use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    calendar::SessionIdx,
    config::SearchStrategy,
    data::domain::{AssetId, Granularity},
    error::{CalendarError, PortalResult, SystemError},
    store::{MinuteBarStore, daily::DailyBarReader},
};

/// Finds the latest instant at or before a query at which an asset actually traded.
///
/// The search never looks before the asset's horizon start and never past its end; running
/// into either bound is a normal "no trade" outcome, not an error.
#[derive(Debug, Clone)]
pub struct LastTradedResolver {
    store: Arc<MinuteBarStore>,
    daily: Arc<dyn DailyBarReader>,
    strategy: SearchStrategy,
}

impl LastTradedResolver {
    pub fn new(
        store: Arc<MinuteBarStore>,
        daily: Arc<dyn DailyBarReader>,
        strategy: SearchStrategy,
    ) -> Self {
        Self {
            store,
            daily,
            strategy,
        }
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    /// The last traded instant at or before `dt`.
    ///
    /// At minute granularity the answer is a minute instant; at day granularity it is the
    /// label of the last traded session (midnight UTC of its date).
    ///
    /// # Errors
    /// Returns [`crate::error::DataError::UnknownAsset`] for assets without a series.
    pub fn get_last_traded(
        &self,
        asset: AssetId,
        dt: DateTime<Utc>,
        granularity: Granularity,
    ) -> PortalResult<Option<DateTime<Utc>>> {
        match granularity {
            Granularity::Minute => self
                .last_traded_index(asset, dt)?
                .map(|index| -> PortalResult<DateTime<Utc>> {
                    self.store.minute_index().instant_at(index).ok_or_else(|| {
                        SystemError::IndexOutOfBounds(format!("minute {index} of {asset}")).into()
                    })
                })
                .transpose(),
            Granularity::Day => self
                .last_traded_session(asset, dt)?
                .map(|session| -> PortalResult<DateTime<Utc>> {
                    Ok(self
                        .store
                        .calendar()
                        .session(session)?
                        .label_instant())
                })
                .transpose(),
        }
    }

    /// Global minute index of the last traded minute at or before `dt`.
    pub fn last_traded_index(&self, asset: AssetId, dt: DateTime<Utc>) -> PortalResult<Option<usize>> {
        let series = self.store.series(asset)?;
        let pos = match self.store.minute_index().position_at_or_before(dt) {
            Ok(pos) => pos,
            Err(CalendarError::CalendarGap(_)) => {
                tracing::debug!(%asset, %dt, "Query precedes the calendar");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if pos.minute != dt {
            tracing::debug!(%asset, %dt, normalized = %pos.minute, "Normalized query to calendar minute");
        }

        let range = series.index_range();
        if pos.index < range.start {
            return Ok(None);
        }
        let Some(end) = range.end.checked_sub(1) else {
            return Ok(None);
        };
        if pos.index > end {
            tracing::debug!(%asset, %dt, "Query follows the horizon; searching from its last minute");
        }
        let from = pos.index.min(end);

        Ok(match self.strategy {
            SearchStrategy::RunIndex => series.last_traded_index(from),
            SearchStrategy::LinearScan => series.scan_last_traded_index(from),
        })
    }

    /// The last traded session labelled on or before the UTC date of `dt`.
    pub fn last_traded_session(
        &self,
        asset: AssetId,
        dt: DateTime<Utc>,
    ) -> PortalResult<Option<SessionIdx>> {
        let (first, last) = self.daily.horizon(asset)?;
        let Some(session) = self
            .store
            .calendar()
            .session_at_or_before_label(dt.date_naive())
        else {
            return Ok(None);
        };
        if session < first {
            return Ok(None);
        }
        let from = session.min(last);

        match self.strategy {
            SearchStrategy::RunIndex => self.daily.last_traded_session(asset, from),
            SearchStrategy::LinearScan => {
                for idx in (first.0..=from.0).rev() {
                    if !self.daily.session_record(asset, SessionIdx(idx))?.is_empty() {
                        return Ok(Some(SessionIdx(idx)));
                    }
                }
                Ok(None)
            }
        }
    }
}
