use std::ops::Range;

use crate::{
    calendar::SessionIdx,
    data::{bar::BarRecord, domain::AssetId},
    store::runs::{TradedRuns, scan_last_traded_at_or_before},
};

/// One asset's minute records over its horizon, aligned with the global minute sequence.
///
/// `records[i]` is the record of global minute `start + i`. The horizon always spans whole
/// sessions, `first_session..=last_session`.
#[derive(Debug, Clone)]
pub struct AssetMinuteSeries {
    asset: AssetId,
    first_session: SessionIdx,
    last_session: SessionIdx,
    start: usize,
    records: Box<[BarRecord]>,
    runs: TradedRuns,
}

impl AssetMinuteSeries {
    /// Wraps records already aligned to `first_session..=last_session`, whose first minute has
    /// global index `start`. Length checks are the builder's job.
    pub(crate) fn new(
        asset: AssetId,
        first_session: SessionIdx,
        last_session: SessionIdx,
        start: usize,
        records: Box<[BarRecord]>,
    ) -> Self {
        let runs = TradedRuns::from_records(&records);
        Self {
            asset,
            first_session,
            last_session,
            start,
            records,
            runs,
        }
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    pub fn first_session(&self) -> SessionIdx {
        self.first_session
    }

    pub fn last_session(&self) -> SessionIdx {
        self.last_session
    }

    /// Global minute indices covered by the horizon.
    pub fn index_range(&self) -> Range<usize> {
        self.start..self.start + self.records.len()
    }

    pub fn contains_index(&self, index: usize) -> bool {
        self.index_range().contains(&index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[BarRecord] {
        &self.records
    }

    pub fn runs(&self) -> &TradedRuns {
        &self.runs
    }

    /// O(1) access by global minute index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&BarRecord> {
        index
            .checked_sub(self.start)
            .and_then(|local| self.records.get(local))
    }

    /// Global index of the latest traded minute at or before `index`, via the run index.
    ///
    /// Indices past the horizon end are clamped to it; indices before the start yield `None`.
    pub fn last_traded_index(&self, index: usize) -> Option<usize> {
        let local = index.checked_sub(self.start)?;
        self.runs
            .last_traded_at_or_before(local)
            .map(|l| l + self.start)
    }

    /// Same as [`Self::last_traded_index`], stepping back one record at a time.
    pub fn scan_last_traded_index(&self, index: usize) -> Option<usize> {
        let local = index.checked_sub(self.start)?;
        scan_last_traded_at_or_before(&self.records, local).map(|l| l + self.start)
    }
}
