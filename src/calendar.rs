use std::fmt::Debug;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{CalendarError, CalendarResult},
    impl_display_primitive, impl_from_primitive,
};

pub mod exchange;
pub mod holidays;
pub mod minute_index;

// ================================================================================================
// Session
// ================================================================================================

/// Position of a session within its calendar.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct SessionIdx(pub usize);
impl_from_primitive!(SessionIdx, usize);
impl_display_primitive!(SessionIdx, "session");

/// One trading day: a label date plus the instants of its first and last minute.
///
/// # Semantics
/// Minutes are labelled by the instant at which they end, so `open` is the first minute
/// (e.g. 09:31 New York) and `close` is the last (16:00). The minute sequence is every
/// instant `open + k * 1min` with `k` in `0..minute_count()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Session {
    label: NaiveDate,
    open: DateTime<Utc>,
    close: DateTime<Utc>,
}

impl Session {
    /// Creates a session.
    ///
    /// # Errors
    /// Returns [`CalendarError::InvalidSchedule`] if `close` precedes `open` or the two instants
    /// are not a whole number of minutes apart.
    pub fn new(label: NaiveDate, open: DateTime<Utc>, close: DateTime<Utc>) -> CalendarResult<Self> {
        if close < open {
            return Err(CalendarError::InvalidSchedule {
                date: label,
                msg: format!("close {close} precedes open {open}"),
            });
        }
        if !is_whole_minutes(close - open) {
            return Err(CalendarError::InvalidSchedule {
                date: label,
                msg: format!("open {open} and close {close} are not minute aligned"),
            });
        }
        Ok(Self { label, open, close })
    }

    pub fn label(&self) -> NaiveDate {
        self.label
    }

    pub fn open(&self) -> DateTime<Utc> {
        self.open
    }

    pub fn close(&self) -> DateTime<Utc> {
        self.close
    }

    /// The session label as an instant (midnight UTC of the label date).
    pub fn label_instant(&self) -> DateTime<Utc> {
        self.label.and_time(NaiveTime::MIN).and_utc()
    }

    /// Number of minutes in the session, open and close inclusive.
    pub fn minute_count(&self) -> usize {
        (self.close - self.open).num_minutes() as usize + 1
    }

    /// Returns `true` if `dt` lies in `[open, close]`, whether or not it is minute aligned.
    pub fn spans(&self, dt: DateTime<Utc>) -> bool {
        self.open <= dt && dt <= self.close
    }

    /// Offset of an exact minute instant from the session open.
    pub fn minute_offset(&self, dt: DateTime<Utc>) -> Option<usize> {
        let delta = dt - self.open;
        (self.spans(dt) && is_whole_minutes(delta)).then(|| delta.num_minutes() as usize)
    }

    /// Offset of the latest minute at or before `dt`, for any `dt >= open`.
    ///
    /// Instants after the close map to the last minute.
    pub fn floor_offset(&self, dt: DateTime<Utc>) -> Option<usize> {
        if dt < self.open {
            return None;
        }
        let offset = (dt.min(self.close) - self.open).num_minutes() as usize;
        Some(offset)
    }

    pub fn minute_at(&self, offset: usize) -> Option<DateTime<Utc>> {
        (offset < self.minute_count()).then(|| self.open + Duration::minutes(offset as i64))
    }

    pub fn minutes(&self) -> SessionMinutes {
        SessionMinutes {
            next: self.open,
            remaining: self.minute_count(),
        }
    }
}

fn is_whole_minutes(delta: Duration) -> bool {
    delta == Duration::minutes(delta.num_minutes())
}

/// Iterator over the minute instants of one session, in order.
#[derive(Debug, Clone)]
pub struct SessionMinutes {
    next: DateTime<Utc>,
    remaining: usize,
}

impl Iterator for SessionMinutes {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next;
        self.next += Duration::minutes(1);
        self.remaining -= 1;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for SessionMinutes {}

// ================================================================================================
// Calendar Seam
// ================================================================================================

/// The trading calendar the store and the query components are built against.
///
/// Implementors only provide the ordered session list; every lookup is derived from it.
/// Sessions must be strictly ordered by label and must not overlap.
pub trait SessionCalendar: Debug + Send + Sync {
    /// Human-readable calendar name (e.g. `"XNYS"`).
    fn name(&self) -> &str;

    /// All sessions, in calendar order.
    fn sessions(&self) -> &[Session];

    fn session(&self, idx: SessionIdx) -> CalendarResult<&Session> {
        let sessions = self.sessions();
        sessions.get(idx.0).ok_or(CalendarError::UnknownSession {
            index: idx.0,
            len: sessions.len(),
        })
    }

    /// Sessions whose label lies in `[start, end]`.
    fn sessions_in_range(&self, start: NaiveDate, end: NaiveDate) -> &[Session] {
        let sessions = self.sessions();
        let lo = sessions.partition_point(|s| s.label < start);
        let hi = sessions.partition_point(|s| s.label <= end);
        if lo >= hi { &[] } else { &sessions[lo..hi] }
    }

    /// The last session labelled on or before `date`.
    fn session_at_or_before_label(&self, date: NaiveDate) -> Option<SessionIdx> {
        let k = self.sessions().partition_point(|s| s.label <= date);
        k.checked_sub(1).map(SessionIdx)
    }

    fn session_open_close(&self, idx: SessionIdx) -> CalendarResult<(DateTime<Utc>, DateTime<Utc>)> {
        self.session(idx).map(|s| (s.open, s.close))
    }

    fn minutes_for_session(&self, idx: SessionIdx) -> CalendarResult<SessionMinutes> {
        self.session(idx).map(Session::minutes)
    }

    /// The session whose `[open, close]` span contains `dt`.
    ///
    /// # Errors
    /// - [`CalendarError::CalendarGap`] if `dt` is before the first open or after the last close.
    /// - [`CalendarError::NotAMinute`] if `dt` falls between two sessions.
    fn session_containing(&self, dt: DateTime<Utc>) -> CalendarResult<SessionIdx> {
        let sessions = self.sessions();
        let k = sessions.partition_point(|s| s.open <= dt);
        if k == 0 || sessions.last().is_some_and(|s| dt > s.close) {
            return Err(CalendarError::CalendarGap(dt));
        }
        if sessions[k - 1].spans(dt) {
            Ok(SessionIdx(k - 1))
        } else {
            Err(CalendarError::NotAMinute(dt))
        }
    }

    /// The latest minute instant at or before `dt`, together with its session.
    ///
    /// Instants inside a session are floored to the minute; instants in a gap between
    /// sessions (or after the last session) map to the preceding session's close.
    ///
    /// # Errors
    /// Returns [`CalendarError::CalendarGap`] if `dt` precedes the first session's open.
    fn minute_at_or_before(&self, dt: DateTime<Utc>) -> CalendarResult<(SessionIdx, DateTime<Utc>)> {
        let sessions = self.sessions();
        let k = sessions.partition_point(|s| s.open <= dt);
        if k == 0 {
            return Err(CalendarError::CalendarGap(dt));
        }
        let session = &sessions[k - 1];
        let offset = session
            .floor_offset(dt)
            .ok_or(CalendarError::CalendarGap(dt))?;
        let minute = session
            .minute_at(offset)
            .ok_or(CalendarError::CalendarGap(dt))?;
        Ok((SessionIdx(k - 1), minute))
    }

    /// A content hash of the session schedule.
    ///
    /// Two calendars with the same fingerprint produce the same global minute sequence.
    fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for s in self.sessions() {
            hasher.update(s.label.to_string().as_bytes());
            hasher.update(&s.open.timestamp().to_le_bytes());
            hasher.update(&s.close.timestamp().to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}
