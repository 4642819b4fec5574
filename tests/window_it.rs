use std::sync::Arc;

use anyhow::Result;
use barportal::prelude::*;
use chrono::{DateTime, Duration, TimeZone, Utc};

mod common;

use common::{date, xnys};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

#[test]
fn four_regular_sessions_thirty_minutes_in() -> Result<()> {
    common::init_tracing();
    let counter = WindowMinuteCounter::new(xnys(date(2015, 6, 1), date(2015, 7, 31))?);

    // 2015-07-09 opens 09:31 EDT (13:31 UTC); Jul 6, 7 and 8 are full sessions.
    let dt = utc(2015, 7, 9, 14, 1);
    assert_eq!(counter.minute_count_for_window(dt, 4)?, 1201);
    assert_eq!(counter.minute_count_for_window(dt, 4)?, 3 * 390 + 31);
    Ok(())
}

#[test]
fn early_close_in_the_window_is_counted_exactly() -> Result<()> {
    common::init_tracing();
    let counter = WindowMinuteCounter::new(xnys(date(2015, 11, 2), date(2015, 12, 31))?);

    // Nov 26 is Thanksgiving and Nov 27 closes at 13:00 (210 minutes).
    let dt = utc(2015, 11, 30, 15, 1);
    assert_eq!(counter.minute_count_for_window(dt, 4)?, 1021);
    assert_eq!(counter.minute_count_for_window(dt, 4)?, 390 + 390 + 210 + 31);
    Ok(())
}

#[test]
fn one_more_session_adds_exactly_its_length() -> Result<()> {
    let calendar = xnys(date(2015, 1, 2), date(2015, 12, 31))?;
    let counter = WindowMinuteCounter::new(calendar.clone());

    for dt in [
        utc(2015, 11, 30, 15, 1),
        utc(2015, 7, 9, 14, 1),
        utc(2015, 12, 28, 20, 59),
        utc(2015, 3, 9, 13, 31),
    ] {
        let (current, _) = calendar.minute_at_or_before(dt)?;
        for n in 1..40 {
            let grown = counter.minute_count_for_window(dt, n + 1)?;
            let base = counter.minute_count_for_window(dt, n)?;
            let added = calendar.session(SessionIdx(current.0 - n))?.minute_count();
            assert_eq!(grown - base, added, "dt {dt}, n {n}");
        }
    }
    Ok(())
}

#[test]
fn counts_are_deterministic_and_calendar_only() -> Result<()> {
    let start = date(2016, 1, 4);
    let end = date(2016, 12, 30);
    let a = WindowMinuteCounter::new(xnys(start, end)?);
    let b = WindowMinuteCounter::new(xnys(start, end)?);

    let origin = utc(2016, 3, 1, 14, 31);
    for step in 0..500 {
        let dt = origin + Duration::minutes(step * 211);
        for n in [0, 1, 2, 5, 20] {
            let first = a.minute_count_for_window(dt, n)?;
            assert_eq!(first, a.minute_count_for_window(dt, n)?);
            assert_eq!(first, b.minute_count_for_window(dt, n)?);
            if n > 0 {
                assert!(first >= 1);
            }
        }
    }
    Ok(())
}

#[test]
fn weekend_query_counts_the_whole_friday() -> Result<()> {
    let counter = WindowMinuteCounter::new(xnys(date(2015, 7, 6), date(2015, 7, 17))?);

    let saturday = utc(2015, 7, 11, 12, 0);
    assert_eq!(counter.elapsed_minutes(saturday)?, 390);
    assert_eq!(counter.minute_count_for_window(saturday, 2)?, 780);

    // Instants before the first open cannot be resolved.
    let err = counter.minute_count_for_window(utc(2015, 7, 6, 13, 0), 1).unwrap_err();
    assert!(matches!(err, PortalError::Calendar(CalendarError::CalendarGap(_))));
    Ok(())
}

#[test]
fn portal_from_json_config_counts_windows() -> Result<()> {
    common::init_tracing();
    let config = PortalConfig::from_json_str(
        r#"{
            "calendar": { "preset": "XNYS", "start": "2015-11-20", "end": "2015-11-30" },
            "search": "linear_scan"
        }"#,
    )?;
    let mut builder = config.store_builder()?;
    builder.write_minutes(
        AssetId(8),
        [MinuteRow::new(utc(2015, 11, 27, 18, 0), 20.0, 20.0, 20.0, 20.0, 5.0)],
    )?;
    let portal = DataPortal::from_config(Arc::new(builder.build()), &config)?;
    assert_eq!(portal.resolver().strategy(), SearchStrategy::LinearScan);

    let dt = utc(2015, 11, 30, 15, 1);
    assert_eq!(portal.minute_count_for_window(dt, 4)?, 1021);
    assert_eq!(
        portal.get_last_traded(AssetId(8), dt, Granularity::Minute)?,
        Some(utc(2015, 11, 27, 18, 0))
    );
    Ok(())
}
