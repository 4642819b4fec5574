//! Calendar-aware minute-bar query layer for backtesters.
//!
//! A [`store::MinuteBarStore`] holds per-asset minute records aligned with a trading calendar,
//! with sessions or minutes without trades kept as explicit empty records. A
//! [`portal::DataPortal`] answers the two queries a simulation clock asks every minute:
//! the last instant an asset traded at or before a given time, and how many minutes a trailing
//! window of sessions spans.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use barportal::prelude::*;
//! use chrono::{NaiveDate, TimeZone, Utc};
//!
//! let start = NaiveDate::from_ymd_opt(2015, 7, 6).unwrap();
//! let end = NaiveDate::from_ymd_opt(2015, 7, 9).unwrap();
//! let config = PortalConfig::new(CalendarPreset::Xnys, start, end);
//!
//! let mut builder = config.store_builder().unwrap();
//! let dt = Utc.with_ymd_and_hms(2015, 7, 9, 13, 31, 0).unwrap();
//! builder
//!     .write_minutes(AssetId(1), [MinuteRow::new(dt, 10.0, 10.5, 9.5, 10.25, 100.0)])
//!     .unwrap();
//! let portal = DataPortal::from_config(Arc::new(builder.build()), &config).unwrap();
//!
//! let later = Utc.with_ymd_and_hms(2015, 7, 9, 14, 1, 0).unwrap();
//! assert_eq!(portal.get_last_traded(AssetId(1), later, Granularity::Minute).unwrap(), Some(dt));
//! assert_eq!(portal.minute_count_for_window(later, 4).unwrap(), 3 * 390 + 31);
//! ```

pub mod calendar;
pub mod config;
pub mod data;
pub mod error;
mod macros;
pub mod portal;
pub mod prelude;
pub mod sorted_vec_map;
pub mod store;
