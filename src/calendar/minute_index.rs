use std::{ops::Range, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
    calendar::{SessionCalendar, SessionIdx},
    error::{CalendarError, CalendarResult},
};

/// A resolved minute: its session, its position in the global minute sequence and the instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MinutePosition {
    pub session: SessionIdx,
    pub index: usize,
    pub minute: DateTime<Utc>,
}

/// Prefix-sum table over the calendar's session lengths.
///
/// `offsets[i]` is the global index of session `i`'s first minute and `offsets[len]` is the
/// total number of minutes, so every conversion between instants and global indices is a
/// binary search over sessions followed by constant-time arithmetic.
#[derive(Debug, Clone)]
pub struct MinuteIndex {
    calendar: Arc<dyn SessionCalendar>,
    offsets: Box<[usize]>,
}

impl MinuteIndex {
    pub fn new(calendar: Arc<dyn SessionCalendar>) -> Self {
        let offsets = std::iter::once(0)
            .chain(calendar.sessions().iter().scan(0usize, |acc, s| {
                *acc += s.minute_count();
                Some(*acc)
            }))
            .collect();
        Self { calendar, offsets }
    }

    pub fn calendar(&self) -> &Arc<dyn SessionCalendar> {
        &self.calendar
    }

    pub fn session_count(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn total_minutes(&self) -> usize {
        self.offsets[self.session_count()]
    }

    /// Global index of the session's first minute.
    pub fn session_start(&self, idx: SessionIdx) -> CalendarResult<usize> {
        self.session_range(idx).map(|r| r.start)
    }

    pub fn session_len(&self, idx: SessionIdx) -> CalendarResult<usize> {
        self.session_range(idx).map(|r| r.len())
    }

    /// Global indices covered by the session.
    pub fn session_range(&self, idx: SessionIdx) -> CalendarResult<Range<usize>> {
        if idx.0 >= self.session_count() {
            return Err(CalendarError::UnknownSession {
                index: idx.0,
                len: self.session_count(),
            });
        }
        Ok(self.offsets[idx.0]..self.offsets[idx.0 + 1])
    }

    /// Global indices covered by sessions `first..=last`.
    pub fn sessions_range(&self, first: SessionIdx, last: SessionIdx) -> CalendarResult<Range<usize>> {
        let start = self.session_start(first)?;
        let end = self.session_range(last)?.end;
        Ok(start..end.max(start))
    }

    /// Resolves an exact minute instant.
    ///
    /// # Errors
    /// - [`CalendarError::CalendarGap`] if `dt` lies outside the calendar.
    /// - [`CalendarError::NotAMinute`] if `dt` falls between sessions or is not minute aligned.
    pub fn position_of(&self, dt: DateTime<Utc>) -> CalendarResult<MinutePosition> {
        let session = self.calendar.session_containing(dt)?;
        let offset = self
            .calendar
            .session(session)?
            .minute_offset(dt)
            .ok_or(CalendarError::NotAMinute(dt))?;
        Ok(MinutePosition {
            session,
            index: self.offsets[session.0] + offset,
            minute: dt,
        })
    }

    /// Resolves the latest calendar minute at or before `dt`.
    ///
    /// # Errors
    /// Returns [`CalendarError::CalendarGap`] if `dt` precedes the first session.
    pub fn position_at_or_before(&self, dt: DateTime<Utc>) -> CalendarResult<MinutePosition> {
        let (session, minute) = self.calendar.minute_at_or_before(dt)?;
        let offset = self
            .calendar
            .session(session)?
            .minute_offset(minute)
            .ok_or(CalendarError::NotAMinute(minute))?;
        Ok(MinutePosition {
            session,
            index: self.offsets[session.0] + offset,
            minute,
        })
    }

    /// The session owning a global index.
    pub fn session_of(&self, index: usize) -> Option<SessionIdx> {
        if index >= self.total_minutes() {
            return None;
        }
        let k = self.offsets.partition_point(|&o| o <= index);
        Some(SessionIdx(k - 1))
    }

    /// The minute instant at a global index.
    pub fn instant_at(&self, index: usize) -> Option<DateTime<Utc>> {
        let session = self.session_of(index)?;
        self.calendar
            .session(session)
            .ok()?
            .minute_at(index - self.offsets[session.0])
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone};

    use super::*;
    use crate::calendar::{Session, exchange::ExchangeCalendar};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn session(d: u32, close_min: u32) -> Session {
        Session::new(
            NaiveDate::from_ymd_opt(2020, 1, d).unwrap(),
            utc(2020, 1, d, 10, 0),
            utc(2020, 1, d, 10, close_min),
        )
        .unwrap()
    }

    /// Sessions of 5, 3 and 4 minutes.
    fn index() -> MinuteIndex {
        let cal = ExchangeCalendar::from_sessions(
            "TINY",
            vec![session(6, 4), session(7, 2), session(8, 3)],
        )
        .unwrap();
        MinuteIndex::new(Arc::new(cal))
    }

    #[test]
    fn offsets_are_prefix_sums_of_session_lengths() {
        let idx = index();
        assert_eq!(idx.session_count(), 3);
        assert_eq!(idx.total_minutes(), 12);
        assert_eq!(idx.session_range(SessionIdx(1)).unwrap(), 5..8);
        assert_eq!(idx.session_len(SessionIdx(2)).unwrap(), 4);
        assert_eq!(idx.sessions_range(SessionIdx(0), SessionIdx(1)).unwrap(), 0..8);
        assert!(idx.session_start(SessionIdx(3)).is_err());
    }

    #[test]
    fn position_and_instant_are_inverse() {
        let idx = index();
        for i in 0..idx.total_minutes() {
            let dt = idx.instant_at(i).unwrap();
            let pos = idx.position_of(dt).unwrap();
            assert_eq!(pos.index, i);
            assert_eq!(idx.session_of(i), Some(pos.session));
        }
        assert_eq!(idx.instant_at(12), None);
        assert_eq!(idx.session_of(12), None);
    }

    #[test]
    fn position_of_rejects_non_minutes() {
        let idx = index();
        let overnight = utc(2020, 1, 6, 12, 0);
        assert_eq!(idx.position_of(overnight), Err(CalendarError::NotAMinute(overnight)));

        let misaligned = utc(2020, 1, 7, 10, 1) + Duration::seconds(15);
        assert_eq!(idx.position_of(misaligned), Err(CalendarError::NotAMinute(misaligned)));
    }

    #[test]
    fn position_at_or_before_floors_into_previous_session() {
        let idx = index();
        let pos = idx.position_at_or_before(utc(2020, 1, 7, 23, 0)).unwrap();
        assert_eq!(pos.session, SessionIdx(1));
        assert_eq!(pos.index, 7);
        assert_eq!(pos.minute, utc(2020, 1, 7, 10, 2));

        let pos = idx
            .position_at_or_before(utc(2020, 1, 8, 10, 1) + Duration::seconds(30))
            .unwrap();
        assert_eq!(pos.index, 9);
    }
}
