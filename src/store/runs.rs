use std::ops::Range;

use crate::data::bar::BarRecord;

/// Maximal runs of consecutive traded records in one asset series.
///
/// Offsets are local to the series (0 is the first minute of the asset's horizon). Runs are
/// sorted, disjoint and never adjacent, so the last traded offset at or before any position
/// is found with one binary search over the run starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradedRuns {
    runs: Vec<Range<u32>>,
}

impl TradedRuns {
    pub fn from_records(records: &[BarRecord]) -> Self {
        let mut runs: Vec<Range<u32>> = Vec::new();
        for (i, record) in records.iter().enumerate() {
            if record.is_empty() {
                continue;
            }
            let i = i as u32;
            match runs.last_mut() {
                Some(run) if run.end == i => run.end = i + 1,
                _ => runs.push(i..i + 1),
            }
        }
        Self { runs }
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Number of traded records across all runs.
    pub fn traded_count(&self) -> usize {
        self.runs.iter().map(|r| r.len()).sum()
    }

    pub fn first_traded(&self) -> Option<usize> {
        self.runs.first().map(|r| r.start as usize)
    }

    pub fn last_traded(&self) -> Option<usize> {
        self.runs.last().map(|r| r.end as usize - 1)
    }

    /// Latest traded offset `<= local`.
    pub fn last_traded_at_or_before(&self, local: usize) -> Option<usize> {
        let k = self.runs.partition_point(|r| r.start as usize <= local);
        let run = self.runs.get(k.checked_sub(1)?)?;
        Some(local.min(run.end as usize - 1))
    }
}

/// Reference backward scan over the records, one slot at a time.
pub fn scan_last_traded_at_or_before(records: &[BarRecord], local: usize) -> Option<usize> {
    let end = local.checked_add(1)?.min(records.len());
    records[..end].iter().rposition(|r| !r.is_empty())
}
