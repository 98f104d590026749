//! Resource catalog - the exchange's asset/network configuration
//!
//! Fetched once per scan, before any address request. A failure here is
//! fatal to the whole scan.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{NetworkConfig, NetworkKey};
use crate::ports::CatalogRow;
use crate::services::client::SignedClient;

/// Upper bound on catalog pages, in case a cursor never terminates
pub const MAX_CATALOG_PAGES: usize = 16;

/// Network configurations keyed by (asset, network)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogIndex {
    entries: BTreeMap<NetworkKey, NetworkConfig>,
}

impl CatalogIndex {
    pub fn from_configs(configs: impl IntoIterator<Item = NetworkConfig>) -> Self {
        let mut index = Self::default();
        for config in configs {
            index.insert(config);
        }
        index
    }

    /// Insert; a later row for the same key replaces the earlier one
    pub fn insert(&mut self, config: NetworkConfig) {
        self.entries.insert(config.key(), config);
    }

    pub fn get(&self, asset: &str, network: &str) -> Option<&NetworkConfig> {
        self.entries.get(&NetworkKey::new(asset, network))
    }

    /// Distinct assets, sorted
    pub fn assets(&self) -> Vec<String> {
        let mut assets: Vec<String> = self.entries.keys().map(|k| k.asset.clone()).collect();
        assets.dedup();
        assets
    }

    /// Networks listed for `asset`, sorted; deposit-disabled ones only when asked
    pub fn networks(&self, asset: &str, include_disabled: bool) -> Vec<String> {
        self.entries
            .values()
            .filter(|c| c.asset == asset && (include_disabled || c.deposit_enabled))
            .map(|c| c.network.clone())
            .collect()
    }

    pub fn configs(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct ResourceCatalog {
    client: Arc<SignedClient>,
}

impl ResourceCatalog {
    pub fn new(client: Arc<SignedClient>) -> Self {
        Self { client }
    }

    /// Fetch every catalog page and index it
    pub fn fetch_all(&self) -> Result<CatalogIndex> {
        self.fetch_pages().map_err(|e| Error::Catalog(Box::new(e)))
    }

    fn fetch_pages(&self) -> Result<CatalogIndex> {
        let profile = self.client.profile();
        let mut index = CatalogIndex::default();
        let mut cursor: Option<String> = None;
        let mut dropped = 0usize;

        for page_number in 1..=MAX_CATALOG_PAGES {
            let call = profile.catalog_call(cursor.as_deref());
            let response = self.client.execute(&call)?;
            let page = profile.parse_catalog(&response.payload)?;

            tracing::debug!(
                page = page_number,
                rows = page.rows.len(),
                "Fetched catalog page"
            );

            for row in page.rows {
                match into_config(row) {
                    Some(config) => index.insert(config),
                    None => dropped += 1,
                }
            }

            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => {
                    cursor = None;
                    break;
                }
            }
        }

        if cursor.is_some() {
            tracing::warn!(
                max_pages = MAX_CATALOG_PAGES,
                "Catalog still paginating after page limit, using what was fetched"
            );
        }
        if dropped > 0 {
            tracing::warn!(dropped, "Dropped catalog rows without asset or network");
        }

        tracing::info!(
            exchange = profile.name(),
            networks = index.len(),
            "Catalog loaded"
        );
        Ok(index)
    }
}

fn into_config(row: CatalogRow) -> Option<NetworkConfig> {
    let asset = row.asset.filter(|s| !s.trim().is_empty())?;
    let network = row.network.filter(|s| !s.trim().is_empty())?;
    Some(NetworkConfig {
        asset,
        network,
        deposit_enabled: row.deposit_enabled,
        withdraw_enabled: row.withdraw_enabled,
        min_deposit: row.min_deposit,
        confirmations_required: row.confirmations_required,
        contract_address: row.contract_address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(asset: Option<&str>, network: Option<&str>) -> CatalogRow {
        CatalogRow {
            asset: asset.map(String::from),
            network: network.map(String::from),
            deposit_enabled: true,
            withdraw_enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_rows_missing_key_are_dropped() {
        assert!(into_config(row(None, Some("ETH"))).is_none());
        assert!(into_config(row(Some("USDT"), None)).is_none());
        assert!(into_config(row(Some("USDT"), Some("  "))).is_none());
        assert!(into_config(row(Some("USDT"), Some("ETH"))).is_some());
    }

    #[test]
    fn test_assets_sorted_and_distinct() {
        let index = CatalogIndex::from_configs(vec![
            NetworkConfig::new("USDT", "TRX"),
            NetworkConfig::new("BTC", "BTC"),
            NetworkConfig::new("USDT", "ETH"),
        ]);
        assert_eq!(index.assets(), vec!["BTC", "USDT"]);
        assert_eq!(index.len(), 3);
        assert!(index.get("USDT", "ETH").is_some());
        assert!(index.get("USDT", "SOL").is_none());
    }

    #[test]
    fn test_networks_per_asset() {
        let mut suspended = NetworkConfig::new("USDT", "ETH");
        suspended.deposit_enabled = false;
        let index = CatalogIndex::from_configs(vec![
            NetworkConfig::new("USDT", "TRX"),
            suspended,
            NetworkConfig::new("BTC", "BTC"),
        ]);
        assert_eq!(index.networks("USDT", false), vec!["TRX"]);
        assert_eq!(index.networks("USDT", true), vec!["ETH", "TRX"]);
        assert!(index.networks("XRP", true).is_empty());
    }

    #[test]
    fn test_later_row_replaces_earlier() {
        let mut disabled = NetworkConfig::new("BTC", "BTC");
        disabled.deposit_enabled = false;
        let index = CatalogIndex::from_configs(vec![NetworkConfig::new("BTC", "BTC"), disabled]);
        assert_eq!(index.len(), 1);
        assert!(!index.get("BTC", "BTC").unwrap().deposit_enabled);
    }
}
