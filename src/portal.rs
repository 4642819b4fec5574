use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::{
    calendar::SessionCalendar,
    config::{PortalConfig, SearchStrategy},
    data::{
        bar::BarRecord,
        domain::{AssetId, BarField, Granularity},
    },
    error::{CalendarError, PortalResult},
    store::{
        MinuteBarStore,
        daily::{DailyBarReader, MinuteDerivedDailyBars},
    },
};

pub mod last_traded;
pub mod window;

use last_traded::LastTradedResolver;
use window::WindowMinuteCounter;

/// Read-only query facade over a frozen [`MinuteBarStore`].
///
/// Every component holds the same calendar; the portal is `Send + Sync` and meant to be shared
/// behind an `Arc` by concurrent callers.
#[derive(Debug, Clone)]
pub struct DataPortal {
    store: Arc<MinuteBarStore>,
    daily: Arc<dyn DailyBarReader>,
    resolver: LastTradedResolver,
    counter: WindowMinuteCounter,
}

impl DataPortal {
    /// A portal whose daily bars are rolled up from the store's minutes.
    #[tracing::instrument(skip(store), fields(assets = store.asset_count(), calendar = store.calendar().name()))]
    pub fn new(store: Arc<MinuteBarStore>) -> PortalResult<Self> {
        let daily = Arc::new(MinuteDerivedDailyBars::from_store(&store)?);
        Ok(Self::with_daily_reader(store, daily))
    }

    /// A portal over an externally supplied daily bar reader.
    pub fn with_daily_reader(store: Arc<MinuteBarStore>, daily: Arc<dyn DailyBarReader>) -> Self {
        let counter = WindowMinuteCounter::from_index(store.minute_index().clone());
        let resolver = LastTradedResolver::new(store.clone(), daily.clone(), SearchStrategy::default());
        Self {
            store,
            daily,
            resolver,
            counter,
        }
    }

    /// A portal configured from `config`; the store must be built over the configured calendar.
    pub fn from_config(store: Arc<MinuteBarStore>, config: &PortalConfig) -> PortalResult<Self> {
        config.validate()?;
        Ok(Self::new(store)?.with_search_strategy(config.search))
    }

    pub fn with_search_strategy(self, strategy: SearchStrategy) -> Self {
        let resolver = LastTradedResolver::new(self.store.clone(), self.daily.clone(), strategy);
        Self { resolver, ..self }
    }

    pub fn store(&self) -> &Arc<MinuteBarStore> {
        &self.store
    }

    pub fn calendar(&self) -> &Arc<dyn SessionCalendar> {
        self.store.calendar()
    }

    pub fn daily_reader(&self) -> &Arc<dyn DailyBarReader> {
        &self.daily
    }

    pub fn resolver(&self) -> &LastTradedResolver {
        &self.resolver
    }

    pub fn counter(&self) -> &WindowMinuteCounter {
        &self.counter
    }

    /// See [`LastTradedResolver::get_last_traded`].
    pub fn get_last_traded(
        &self,
        asset: AssetId,
        dt: DateTime<Utc>,
        granularity: Granularity,
    ) -> PortalResult<Option<DateTime<Utc>>> {
        self.resolver.get_last_traded(asset, dt, granularity)
    }

    /// See [`WindowMinuteCounter::minute_count_for_window`].
    pub fn minute_count_for_window(
        &self,
        dt: DateTime<Utc>,
        session_count: usize,
    ) -> PortalResult<usize> {
        self.counter.minute_count_for_window(dt, session_count)
    }

    /// See [`MinuteBarStore::record_at`].
    pub fn record_at(&self, asset: AssetId, dt: DateTime<Utc>) -> PortalResult<BarRecord> {
        self.store.record_at(asset, dt)
    }

    /// Reads one field of the bar at `dt`.
    ///
    /// Minute granularity reads the calendar minute at or before `dt`; day granularity reads
    /// the session labelled on or before the UTC date of `dt`. [`BarField::Price`] is
    /// forward-filled from the last traded bar and is `None` only when nothing traded yet.
    /// Other price fields of an empty bar are `None`; its volume is `0.0`.
    ///
    /// # Errors
    /// Returns [`crate::error::DataError::OutOfHorizon`] when a non-`Price` field is read
    /// outside the asset's horizon.
    pub fn spot_value(
        &self,
        asset: AssetId,
        dt: DateTime<Utc>,
        field: BarField,
        granularity: Granularity,
    ) -> PortalResult<Option<f64>> {
        let record = match (granularity, field) {
            (Granularity::Minute, BarField::Price) => {
                match self.resolver.last_traded_index(asset, dt)? {
                    Some(index) => self.store.record_at_index(asset, index)?,
                    None => return Ok(None),
                }
            }
            (Granularity::Minute, _) => {
                let pos = self.store.minute_index().position_at_or_before(dt)?;
                self.store.record_at_index(asset, pos.index)?
            }
            (Granularity::Day, BarField::Price) => {
                match self.resolver.last_traded_session(asset, dt)? {
                    Some(session) => self.daily.session_record(asset, session)?,
                    None => return Ok(None),
                }
            }
            (Granularity::Day, _) => {
                let session = self
                    .calendar()
                    .session_at_or_before_label(dt.date_naive())
                    .ok_or(CalendarError::CalendarGap(dt))?;
                self.daily.session_record(asset, session)?
            }
        };
        Ok(record.field(field))
    }

    /// Minute records of the trailing `session_count`-session window ending at `dt`.
    pub fn history_window(
        &self,
        asset: AssetId,
        dt: DateTime<Utc>,
        session_count: usize,
    ) -> PortalResult<Vec<BarRecord>> {
        let minutes = self.counter.minute_count_for_window(dt, session_count)?;
        self.store.history(asset, dt, minutes)
    }

    /// [`Self::get_last_traded`] for many assets at once, in input order.
    pub fn last_traded_for_assets(
        &self,
        assets: &[AssetId],
        dt: DateTime<Utc>,
        granularity: Granularity,
    ) -> Vec<PortalResult<Option<DateTime<Utc>>>> {
        assets
            .par_iter()
            .map(|&asset| self.resolver.get_last_traded(asset, dt, granularity))
            .collect()
    }
}
