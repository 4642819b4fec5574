use std::{path::Path, sync::Arc};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    calendar::{SessionCalendar, exchange::CalendarPreset},
    error::{ConfigError, IoError, PortalResult},
    store::MinuteBarStoreBuilder,
};

// ================================================================================================
// Search Strategy
// ================================================================================================

/// How the last-traded resolver walks backward through a sparse series.
///
/// Both strategies return identical results.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Default,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Binary search over the per-asset index of traded runs.
    #[default]
    RunIndex,
    /// Step back one record at a time until a trade or the horizon start.
    LinearScan,
}

// ================================================================================================
// Calendar Config
// ================================================================================================

/// Which session schedule to materialize, and for which label range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub preset: CalendarPreset,
    /// First session label considered (inclusive).
    pub start: NaiveDate,
    /// Last session label considered (inclusive).
    pub end: NaiveDate,
}

// ================================================================================================
// Portal Config
// ================================================================================================

/// Configuration of a [`crate::portal::DataPortal`] and its calendar.
///
/// # Example
///
/// ```rust
/// # use barportal::config::{PortalConfig, SearchStrategy};
/// let cfg = PortalConfig::from_json_str(
///     r#"{ "calendar": { "preset": "XNYS", "start": "2016-08-01", "end": "2016-08-31" } }"#,
/// )
/// .unwrap()
/// .with_search_strategy(SearchStrategy::LinearScan);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortalConfig {
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub search: SearchStrategy,
}

impl PortalConfig {
    pub fn new(preset: CalendarPreset, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            calendar: CalendarConfig { preset, start, end },
            search: SearchStrategy::default(),
        }
    }

    pub fn with_search_strategy(self, search: SearchStrategy) -> Self {
        Self { search, ..self }
    }

    pub fn with_calendar_range(self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            calendar: CalendarConfig {
                start,
                end,
                ..self.calendar
            },
            ..self
        }
    }

    pub fn from_json_str(json: &str) -> PortalResult<Self> {
        let cfg: Self = serde_json::from_str(json).map_err(IoError::from)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> PortalResult<Self> {
        let json = std::fs::read_to_string(path).map_err(IoError::from)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> PortalResult<String> {
        Ok(serde_json::to_string_pretty(self).map_err(IoError::from)?)
    }

    /// # Errors
    /// Returns [`ConfigError::InvalidCalendarRange`] if `start` is after `end`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let CalendarConfig { start, end, .. } = self.calendar;
        if start > end {
            return Err(ConfigError::InvalidCalendarRange { start, end });
        }
        Ok(())
    }

    /// Materializes the configured calendar.
    pub fn build_calendar(&self) -> PortalResult<Arc<dyn SessionCalendar>> {
        self.validate()?;
        let CalendarConfig { preset, start, end } = self.calendar;
        Ok(Arc::new(preset.calendar(start, end)?))
    }

    /// A store builder over the configured calendar.
    pub fn store_builder(&self) -> PortalResult<MinuteBarStoreBuilder> {
        Ok(MinuteBarStoreBuilder::new(self.build_calendar()?))
    }
}
