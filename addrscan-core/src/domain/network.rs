//! Asset/network configuration domain model

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Unique key of a catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkKey {
    pub asset: String,
    pub network: String,
}

impl NetworkKey {
    pub fn new(asset: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            network: network.into(),
        }
    }
}

impl fmt::Display for NetworkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset, self.network)
    }
}

/// Deposit/withdraw configuration of one asset on one network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub asset: String,
    pub network: String,
    pub deposit_enabled: bool,
    pub withdraw_enabled: bool,
    pub min_deposit: Option<Decimal>,
    pub confirmations_required: Option<u32>,
    pub contract_address: Option<String>,
}

impl NetworkConfig {
    /// Create an entry with both directions enabled and no limits
    pub fn new(asset: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            network: network.into(),
            deposit_enabled: true,
            withdraw_enabled: true,
            min_deposit: None,
            confirmations_required: None,
            contract_address: None,
        }
    }

    pub fn key(&self) -> NetworkKey {
        NetworkKey::new(self.asset.clone(), self.network.clone())
    }
}
