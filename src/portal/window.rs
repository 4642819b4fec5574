use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    calendar::{SessionCalendar, SessionIdx, minute_index::MinuteIndex},
    error::{CalendarError, PortalResult},
};

/// Counts the minutes of trailing session windows.
///
/// A window of `N` sessions ending at `dt` is every minute of the `N - 1` sessions before the
/// session of `dt`, plus that session's minutes from its open through `dt` inclusive.
#[derive(Debug, Clone)]
pub struct WindowMinuteCounter {
    index: MinuteIndex,
}

impl WindowMinuteCounter {
    pub fn new(calendar: Arc<dyn SessionCalendar>) -> Self {
        Self {
            index: MinuteIndex::new(calendar),
        }
    }

    pub fn from_index(index: MinuteIndex) -> Self {
        Self { index }
    }

    /// Number of minutes in the window of `session_count` sessions ending at `dt`.
    ///
    /// Instants between sessions count up to the previous session's close. Computed from the
    /// minute index offsets, so the cost does not depend on `session_count`.
    ///
    /// # Errors
    /// - [`CalendarError::CalendarGap`] if `dt` precedes the first session.
    /// - [`CalendarError::WindowBeforeCalendarStart`] if fewer than `session_count` sessions
    ///   end at or before `dt`.
    pub fn minute_count_for_window(
        &self,
        dt: DateTime<Utc>,
        session_count: usize,
    ) -> PortalResult<usize> {
        let pos = self.index.position_at_or_before(dt)?;
        if session_count == 0 {
            return Ok(0);
        }
        let first = self.first_window_session(dt, pos.session, session_count)?;
        let start = self.index.session_start(first)?;
        Ok(pos.index - start + 1)
    }

    /// Minutes elapsed in the session of `dt`, open through `dt` inclusive.
    pub fn elapsed_minutes(&self, dt: DateTime<Utc>) -> PortalResult<usize> {
        self.minute_count_for_window(dt, 1)
    }

    fn first_window_session(
        &self,
        dt: DateTime<Utc>,
        current: SessionIdx,
        session_count: usize,
    ) -> PortalResult<SessionIdx> {
        current
            .0
            .checked_sub(session_count - 1)
            .map(SessionIdx)
            .ok_or_else(|| {
                CalendarError::WindowBeforeCalendarStart {
                    dt,
                    requested: session_count,
                    available: current.0 + 1,
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone};

    use super::*;
    use crate::{calendar::exchange::CalendarPreset, error::PortalError};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn counter() -> WindowMinuteCounter {
        let cal = CalendarPreset::Xnys
            .calendar(date(2015, 11, 2), date(2015, 12, 31))
            .unwrap();
        WindowMinuteCounter::new(Arc::new(cal))
    }

    /// Reference count: sum the calendar's minute sequences session by session.
    fn enumerated(calendar: &dyn SessionCalendar, dt: DateTime<Utc>, n: usize) -> usize {
        let (session, minute) = calendar.minute_at_or_before(dt).unwrap();
        let preceding: usize = (session.0 + 1 - n..session.0)
            .map(|i| calendar.minutes_for_session(SessionIdx(i)).unwrap().count())
            .sum();
        let elapsed = calendar
            .minutes_for_session(session)
            .unwrap()
            .take_while(|m| *m <= minute)
            .count();
        preceding + elapsed
    }

    #[test]
    fn window_across_thanksgiving_early_close() {
        let counter = counter();
        // 2015-11-30 is a Monday, 30 minutes after the 09:31 EST open.
        let dt = Utc.with_ymd_and_hms(2015, 11, 30, 15, 1, 0).unwrap();
        assert_eq!(counter.minute_count_for_window(dt, 4).unwrap(), 390 + 390 + 210 + 31);
        assert_eq!(counter.elapsed_minutes(dt).unwrap(), 31);
    }

    #[test]
    fn offsets_agree_with_enumeration() {
        let counter = counter();
        let calendar = counter.index.calendar().clone();
        let start = Utc.with_ymd_and_hms(2015, 11, 20, 14, 31, 0).unwrap();
        for step in 0..200 {
            let dt = start + Duration::minutes(step * 97);
            for n in 1..=10 {
                assert_eq!(
                    counter.minute_count_for_window(dt, n).unwrap(),
                    enumerated(calendar.as_ref(), dt, n),
                    "dt {dt}, n {n}"
                );
            }
        }
    }

    #[test]
    fn zero_sessions_and_calendar_edges() {
        let counter = counter();
        let first_open = Utc.with_ymd_and_hms(2015, 11, 2, 14, 31, 0).unwrap();
        assert_eq!(counter.minute_count_for_window(first_open, 0).unwrap(), 0);
        assert_eq!(counter.minute_count_for_window(first_open, 1).unwrap(), 1);

        let err = counter.minute_count_for_window(first_open, 2).unwrap_err();
        assert!(matches!(
            err,
            PortalError::Calendar(CalendarError::WindowBeforeCalendarStart { available: 1, .. })
        ));

        let before = first_open - Duration::days(1);
        let err = counter.minute_count_for_window(before, 1).unwrap_err();
        assert!(matches!(err, PortalError::Calendar(CalendarError::CalendarGap(_))));
    }
}
