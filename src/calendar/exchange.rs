use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    calendar::{Session, SessionCalendar, holidays},
    error::{CalendarError, CalendarResult},
};

// ================================================================================================
// Presets
// ================================================================================================

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
    Default,
)]
pub enum CalendarPreset {
    /// **New York Stock Exchange**
    ///
    /// # Schedule
    /// * **Timezone:** America/New_York.
    /// * **Minutes:** 09:31 through 16:00 local (390 minutes).
    /// * **Early close:** 13:00 local (210 minutes) on July 3, the day after Thanksgiving
    ///   and Christmas Eve when those fall on a trading weekday.
    /// * **Holidays:** rule-based, see [`holidays::nyse_holidays`].
    #[default]
    #[strum(to_string = "XNYS", serialize = "xnys")]
    #[serde(rename = "XNYS")]
    Xnys,
}

impl CalendarPreset {
    pub fn builder(self) -> ExchangeCalendarBuilder {
        match self {
            CalendarPreset::Xnys => ExchangeCalendarBuilder::new("XNYS", chrono_tz::America::New_York)
                .with_regular_minutes(hm(9, 31), hm(16, 0))
                .with_holiday_rule(holidays::nyse_holidays)
                .with_early_close_rule(holidays::nyse_early_closes),
        }
    }

    /// Builds the preset's calendar for sessions labelled in `[start, end]`.
    pub fn calendar(self, start: NaiveDate, end: NaiveDate) -> CalendarResult<ExchangeCalendar> {
        self.builder().build(start, end)
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

// ================================================================================================
// Exchange Calendar
// ================================================================================================

/// An immutable, fully materialized session schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeCalendar {
    name: String,
    sessions: Box<[Session]>,
}

impl ExchangeCalendar {
    /// Wraps an explicit list of sessions.
    ///
    /// # Errors
    /// Returns [`CalendarError::InvalidSchedule`] if labels are not strictly increasing or if a
    /// session opens at or before the previous session's close.
    pub fn from_sessions(name: impl Into<String>, sessions: Vec<Session>) -> CalendarResult<Self> {
        if let Some((prev, next)) = sessions
            .iter()
            .tuple_windows()
            .find(|(prev, next)| next.label() <= prev.label() || next.open() <= prev.close())
        {
            return Err(CalendarError::InvalidSchedule {
                date: next.label(),
                msg: format!(
                    "session does not strictly follow {} (close {})",
                    prev.label(),
                    prev.close()
                ),
            });
        }
        Ok(Self {
            name: name.into(),
            sessions: sessions.into_boxed_slice(),
        })
    }

    pub fn first_session(&self) -> Option<&Session> {
        self.sessions.first()
    }

    pub fn last_session(&self) -> Option<&Session> {
        self.sessions.last()
    }
}

impl SessionCalendar for ExchangeCalendar {
    fn name(&self) -> &str {
        &self.name
    }

    fn sessions(&self) -> &[Session] {
        &self.sessions
    }
}

// ================================================================================================
// Builder
// ================================================================================================

type DateRule = fn(i32) -> Vec<NaiveDate>;
type EarlyCloseRule = fn(i32) -> Vec<(NaiveDate, NaiveTime)>;

/// Materializes sessions from a weekly schedule in a local timezone.
///
/// Explicit holidays and early closes are merged with the ones produced by rules,
/// which are evaluated once per calendar year in the requested range.
#[derive(Debug, Clone)]
pub struct ExchangeCalendarBuilder {
    name: String,
    tz: Tz,
    first_minute: NaiveTime,
    last_minute: NaiveTime,
    trading_days: Vec<Weekday>,
    holidays: BTreeSet<NaiveDate>,
    early_closes: BTreeMap<NaiveDate, NaiveTime>,
    holiday_rules: Vec<DateRule>,
    early_close_rules: Vec<EarlyCloseRule>,
}

impl ExchangeCalendarBuilder {
    /// A Monday-to-Friday calendar with no holidays and a 09:31-16:00 local schedule.
    pub fn new(name: impl Into<String>, tz: Tz) -> Self {
        Self {
            name: name.into(),
            tz,
            first_minute: hm(9, 31),
            last_minute: hm(16, 0),
            trading_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            holidays: BTreeSet::new(),
            early_closes: BTreeMap::new(),
            holiday_rules: Vec::new(),
            early_close_rules: Vec::new(),
        }
    }

    /// Sets the local time of the first and last minute of a regular session.
    pub fn with_regular_minutes(self, first_minute: NaiveTime, last_minute: NaiveTime) -> Self {
        Self {
            first_minute,
            last_minute,
            ..self
        }
    }

    pub fn with_trading_days(self, trading_days: Vec<Weekday>) -> Self {
        Self {
            trading_days,
            ..self
        }
    }

    pub fn with_holidays(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(dates);
        self
    }

    /// Registers a session whose last minute is `last_minute` local time.
    pub fn with_early_close(mut self, date: NaiveDate, last_minute: NaiveTime) -> Self {
        self.early_closes.insert(date, last_minute);
        self
    }

    pub fn with_holiday_rule(mut self, rule: DateRule) -> Self {
        self.holiday_rules.push(rule);
        self
    }

    pub fn with_early_close_rule(mut self, rule: EarlyCloseRule) -> Self {
        self.early_close_rules.push(rule);
        self
    }

    /// Builds sessions for every trading day labelled in `[start, end]`.
    ///
    /// # Errors
    /// - [`CalendarError::EmptyCalendar`] if no trading day falls in the range.
    /// - [`CalendarError::AmbiguousLocalTime`] if a session bound does not map to a single
    ///   UTC instant.
    /// - [`CalendarError::InvalidSchedule`] if an early close precedes the open.
    pub fn build(self, start: NaiveDate, end: NaiveDate) -> CalendarResult<ExchangeCalendar> {
        let mut holidays = self.holidays.clone();
        let mut early_closes = self.early_closes.clone();
        for year in start.year()..=end.year() {
            self.holiday_rules
                .iter()
                .for_each(|rule| holidays.extend(rule(year)));
            self.early_close_rules
                .iter()
                .for_each(|rule| early_closes.extend(rule(year)));
        }

        let sessions = start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.trading_days.contains(&d.weekday()) && !holidays.contains(d))
            .map(|d| {
                let last_minute = early_closes.get(&d).copied().unwrap_or(self.last_minute);
                let open = self.to_utc(d, self.first_minute)?;
                let close = self.to_utc(d, last_minute)?;
                Session::new(d, open, close)
            })
            .collect::<CalendarResult<Vec<_>>>()?;

        if sessions.is_empty() {
            return Err(CalendarError::EmptyCalendar { start, end });
        }

        tracing::debug!(
            calendar = %self.name,
            sessions = sessions.len(),
            %start,
            %end,
            "Materialized exchange calendar"
        );

        ExchangeCalendar::from_sessions(self.name, sessions)
    }

    fn to_utc(&self, date: NaiveDate, time: NaiveTime) -> CalendarResult<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| CalendarError::AmbiguousLocalTime {
                date,
                time: time.to_string(),
            })
    }
}
