#![allow(dead_code)]

use std::sync::{Arc, Once};

use anyhow::Result;
use barportal::prelude::*;
use chrono::{DateTime, NaiveDate, Utc};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test subscriber once per test binary; `RUST_LOG` controls the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn xnys(start: NaiveDate, end: NaiveDate) -> Result<Arc<dyn SessionCalendar>> {
    Ok(Arc::new(CalendarPreset::Xnys.calendar(start, end)?))
}

/// The `k`-th minute (0-based) of the session labelled `label`.
pub fn minute(calendar: &dyn SessionCalendar, label: NaiveDate, k: usize) -> DateTime<Utc> {
    let session = calendar.sessions_in_range(label, label)[0];
    session.minute_at(k).expect("minute inside session")
}

pub fn trade(dt: DateTime<Utc>, close: f64, volume: f64) -> MinuteRow {
    MinuteRow::new(dt, close - 0.5, close + 0.5, close - 1.0, close, volume)
}

pub const SPARSE_ASSET: AssetId = AssetId(1);
pub const QUIET_ASSET: AssetId = AssetId(2);

/// Three NYSE sessions (2016-08-01..=03) with two assets.
///
/// * [`SPARSE_ASSET`]: no trades on day 1, one trade of volume 1000 at the first minute of
///   day 2, and trades at minutes 1 to 4 of day 3 with minutes 0 and 5 empty.
/// * [`QUIET_ASSET`]: registered over the same horizon without a single trade.
pub struct SparseFixture {
    pub calendar: Arc<dyn SessionCalendar>,
    pub store: Arc<MinuteBarStore>,
    pub days: [NaiveDate; 3],
}

impl SparseFixture {
    pub fn new() -> Result<Self> {
        init_tracing();
        let days = [date(2016, 8, 1), date(2016, 8, 2), date(2016, 8, 3)];
        let calendar = xnys(days[0], days[2])?;
        let cal = calendar.as_ref();

        let mut rows = vec![MinuteRow::no_trade(minute(cal, days[0], 0))];
        rows.push(trade(minute(cal, days[1], 0), 10.0, 1000.0));
        rows.extend((1..=4).map(|k| trade(minute(cal, days[2], k), 10.0 + k as f64, 100.0 * k as f64)));
        rows.push(MinuteRow::no_trade(minute(cal, days[2], 389)));

        let quiet = [
            MinuteRow::no_trade(minute(cal, days[0], 0)),
            MinuteRow::no_trade(minute(cal, days[2], 389)),
        ];

        let mut builder = MinuteBarStore::builder(calendar.clone());
        builder
            .write_minutes(SPARSE_ASSET, rows)?
            .write_minutes(QUIET_ASSET, quiet)?;

        Ok(Self {
            store: Arc::new(builder.build()),
            calendar,
            days,
        })
    }

    pub fn minute(&self, day: usize, k: usize) -> DateTime<Utc> {
        minute(self.calendar.as_ref(), self.days[day], k)
    }

    pub fn portal(&self) -> Result<DataPortal> {
        Ok(DataPortal::new(self.store.clone())?)
    }
}
