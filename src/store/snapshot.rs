use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    calendar::{SessionCalendar, SessionIdx, minute_index::MinuteIndex},
    data::{bar::BarRecord, domain::AssetId},
    error::{DataError, IoError, PortalResult},
    sorted_vec_map::SortedVecMap,
    store::{AssetMinuteSeries, MinuteBarStore},
};

/// File extension of store snapshots.
pub const SNAPSHOT_EXTENSION: &str = "postcard";

#[derive(Debug, Serialize, Deserialize)]
struct StoreSnapshot<'a> {
    calendar: Cow<'a, str>,
    fingerprint: String,
    series: Vec<SeriesSnapshot<'a>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SeriesSnapshot<'a> {
    asset: AssetId,
    first_session: SessionIdx,
    last_session: SessionIdx,
    records: Cow<'a, [BarRecord]>,
}

impl MinuteBarStore {
    /// Writes the frozen store into `dir` as `<blake3 hash>.postcard` and returns the path.
    ///
    /// The hash covers the encoded bytes, so identical stores map to the same file.
    #[tracing::instrument(skip(self, dir), fields(assets = self.asset_count(), dir = %dir.display()))]
    pub fn write_snapshot(&self, dir: &Path) -> PortalResult<PathBuf> {
        let snapshot = StoreSnapshot {
            calendar: Cow::Borrowed(self.calendar().name()),
            fingerprint: self.calendar().fingerprint(),
            series: self
                .iter_series()
                .map(|s| SeriesSnapshot {
                    asset: s.asset(),
                    first_session: s.first_session(),
                    last_session: s.last_session(),
                    records: Cow::Borrowed(s.records()),
                })
                .collect(),
        };

        let result = postcard::to_stdvec(&snapshot)
            .map_err(IoError::from)
            .and_then(|bytes| {
                let hash = blake3::hash(&bytes);
                let path = dir.join(format!("{hash}.{SNAPSHOT_EXTENSION}"));
                fs::create_dir_all(dir)?;
                fs::write(&path, &bytes)?;
                Ok(path)
            });

        match &result {
            Ok(path) => tracing::info!(path = %path.display(), "Successfully wrote store snapshot"),
            Err(e) => tracing::error!(error = %e, "Failed to write store snapshot"),
        }

        Ok(result?)
    }

    /// Reads a snapshot written by [`MinuteBarStore::write_snapshot`] against `calendar`.
    ///
    /// # Errors
    /// - [`IoError::ChecksumMismatch`] if the content no longer hashes to the file name.
    /// - [`IoError::CalendarFingerprintMismatch`] if the snapshot was written against a
    ///   different session schedule.
    /// - [`DataError::HorizonMismatch`] if a series does not cover its recorded horizon.
    #[tracing::instrument(skip(path, calendar), fields(path = %path.display()))]
    pub fn read_snapshot(path: &Path, calendar: Arc<dyn SessionCalendar>) -> PortalResult<Self> {
        let bytes = fs::read(path).map_err(IoError::from)?;

        let actual = blake3::hash(&bytes).to_string();
        if path.file_stem().and_then(|s| s.to_str()) != Some(actual.as_str()) {
            tracing::warn!(%actual, "Snapshot content does not match its file name");
            return Err(IoError::ChecksumMismatch {
                file: path.display().to_string(),
                actual,
            }
            .into());
        }

        let snapshot: StoreSnapshot = postcard::from_bytes(&bytes).map_err(IoError::from)?;
        let fingerprint = calendar.fingerprint();
        if snapshot.fingerprint != fingerprint {
            return Err(IoError::CalendarFingerprintMismatch {
                expected: format!("{} ({})", snapshot.calendar, snapshot.fingerprint),
                actual: format!("{} ({fingerprint})", calendar.name()),
            }
            .into());
        }

        let index = MinuteIndex::new(calendar);
        let series = snapshot
            .series
            .into_iter()
            .map(|s| -> PortalResult<(AssetId, AssetMinuteSeries)> {
                let range = index.sessions_range(s.first_session, s.last_session)?;
                if s.last_session < s.first_session || range.len() != s.records.len() {
                    return Err(DataError::HorizonMismatch {
                        asset: s.asset,
                        msg: format!(
                            "{} records stored for {} calendar minutes",
                            s.records.len(),
                            range.len()
                        ),
                    }
                    .into());
                }
                let series = AssetMinuteSeries::new(
                    s.asset,
                    s.first_session,
                    s.last_session,
                    range.start,
                    s.records.into_owned().into_boxed_slice(),
                );
                Ok((s.asset, series))
            })
            .collect::<PortalResult<SortedVecMap<_, _>>>()?;

        tracing::info!(assets = series.len(), "Successfully loaded store snapshot");

        Ok(Self { index, series })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::{
        calendar::{Session, exchange::ExchangeCalendar},
        error::PortalError,
        store::MinuteRow,
    };

    fn utc(d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, d, h, min, 0).unwrap()
    }

    fn calendar(close_min: u32) -> Arc<dyn SessionCalendar> {
        let sessions = [6, 7]
            .into_iter()
            .map(|d| {
                Session::new(
                    NaiveDate::from_ymd_opt(2020, 1, d).unwrap(),
                    utc(d, 10, 0),
                    utc(d, 10, close_min),
                )
                .unwrap()
            })
            .collect();
        Arc::new(ExchangeCalendar::from_sessions("TINY", sessions).unwrap())
    }

    fn store() -> MinuteBarStore {
        let mut builder = MinuteBarStore::builder(calendar(4));
        builder
            .write_minutes(
                AssetId(2),
                [
                    MinuteRow::new(utc(6, 10, 2), 5.0, 5.5, 4.5, 5.25, 10.0),
                    MinuteRow::no_trade(utc(7, 10, 4)),
                ],
            )
            .unwrap()
            .write_minutes(AssetId(1), [MinuteRow::new(utc(7, 10, 0), 1.0, 1.0, 1.0, 1.0, 1.0)])
            .unwrap();
        builder.build()
    }

    #[test]
    fn snapshot_round_trip_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = store();
        let path = store.write_snapshot(dir.path()).unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some(SNAPSHOT_EXTENSION));

        let loaded = MinuteBarStore::read_snapshot(&path, calendar(4)).unwrap();
        assert_eq!(loaded.assets().collect::<Vec<_>>(), vec![AssetId(1), AssetId(2)]);
        for asset in store.assets() {
            assert_eq!(
                loaded.series(asset).unwrap().records(),
                store.series(asset).unwrap().records()
            );
            assert_eq!(
                loaded.series(asset).unwrap().runs(),
                store.series(asset).unwrap().runs()
            );
        }

        // Same content, same file.
        assert_eq!(store.write_snapshot(dir.path()).unwrap(), path);
    }

    #[test]
    fn snapshot_rejects_other_calendar() {
        let dir = tempfile::tempdir().unwrap();
        let path = store().write_snapshot(dir.path()).unwrap();
        let err = MinuteBarStore::read_snapshot(&path, calendar(3)).unwrap_err();
        assert!(matches!(
            err,
            PortalError::Io(IoError::CalendarFingerprintMismatch { .. })
        ));
    }

    #[test]
    fn snapshot_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let path = store().write_snapshot(dir.path()).unwrap();
        let mut bytes = fs::read(&path).unwrap();
        if let Some(last) = bytes.last_mut() {
            *last ^= 0xff;
        }
        fs::write(&path, bytes).unwrap();

        let err = MinuteBarStore::read_snapshot(&path, calendar(4)).unwrap_err();
        assert!(matches!(err, PortalError::Io(IoError::ChecksumMismatch { .. })));
    }
}
