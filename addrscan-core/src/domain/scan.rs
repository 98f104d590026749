//! Scan outcome models

use serde::Serialize;

use super::address::JoinedRecord;

/// An asset whose address lookup failed terminally
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetFailure {
    pub asset: String,
    pub reason: String,
}

/// Everything a scan produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    /// Sorted by asset, then network, then address
    pub records: Vec<JoinedRecord>,
    /// Sorted by asset
    pub failures: Vec<AssetFailure>,
    /// Records that had no catalog entry to join against
    pub unmatched: usize,
    /// Total assets enumerated from the catalog
    pub assets_total: usize,
    /// Assets never looked up because the scan was cancelled first
    pub unscanned: usize,
    /// Whether the scan was cancelled before every asset was dispatched
    pub cancelled: bool,
}

impl ScanOutcome {
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            record_count: self.records.len(),
            failure_count: self.failures.len(),
            unscanned: self.unscanned,
            failures: self.failures.clone(),
        }
    }
}

/// Completion summary handed to the caller
///
/// A run counts as clean only when no asset failed and every asset was
/// looked up. A cancelled scan with nothing failed is still not clean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub record_count: usize,
    pub failure_count: usize,
    pub unscanned: usize,
    pub failures: Vec<AssetFailure>,
}

impl ScanSummary {
    pub fn is_clean(&self) -> bool {
        self.failure_count == 0 && self.unscanned == 0
    }
}
