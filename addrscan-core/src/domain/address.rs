//! Deposit address domain models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::network::NetworkConfig;

/// A deposit address the exchange returned for one asset on one network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    pub asset: String,
    pub network: String,
    pub address: String,
    /// Memo/tag some networks need alongside the address
    pub tag: Option<String>,
    pub source_timestamp: DateTime<Utc>,
}

/// An address record joined with its catalog metadata
///
/// Metadata fields are `None` when the catalog has no entry for the
/// (asset, network) pair. That is a data-quality condition, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRecord {
    pub asset: String,
    pub network: String,
    pub address: String,
    pub tag: Option<String>,
    pub source_timestamp: DateTime<Utc>,
    pub deposit_enabled: Option<bool>,
    pub withdraw_enabled: Option<bool>,
    pub min_deposit: Option<Decimal>,
    pub confirmations_required: Option<u32>,
    pub contract_address: Option<String>,
}

impl JoinedRecord {
    pub fn join(record: AddressRecord, config: Option<&NetworkConfig>) -> Self {
        Self {
            asset: record.asset,
            network: record.network,
            address: record.address,
            tag: record.tag,
            source_timestamp: record.source_timestamp,
            deposit_enabled: config.map(|c| c.deposit_enabled),
            withdraw_enabled: config.map(|c| c.withdraw_enabled),
            min_deposit: config.and_then(|c| c.min_deposit),
            confirmations_required: config.and_then(|c| c.confirmations_required),
            contract_address: config.and_then(|c| c.contract_address.clone()),
        }
    }

    /// Whether a catalog entry matched this record
    pub fn has_metadata(&self) -> bool {
        self.deposit_enabled.is_some()
    }
}
