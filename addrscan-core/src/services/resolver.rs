//! Address resolver - deposit addresses for one asset

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::result::Result;
use crate::domain::AddressRecord;
use crate::ports::{AddressRow, Clock};
use crate::services::client::SignedClient;

pub struct AddressResolver {
    client: Arc<SignedClient>,
    clock: Arc<dyn Clock>,
}

impl AddressResolver {
    pub fn new(client: Arc<SignedClient>, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }

    /// Fetch the addresses for `asset`; an empty list is a valid answer
    ///
    /// `networks` matters only to exchanges whose address endpoint is scoped
    /// to one network. Any one of those calls failing fails the asset.
    pub fn fetch_addresses(&self, asset: &str, networks: &[String]) -> Result<Vec<AddressRecord>> {
        let profile = self.client.profile();
        let mut rows: Vec<AddressRow> = Vec::new();
        for call in profile.address_calls(asset, networks) {
            let response = self.client.execute(&call)?;
            rows.extend(profile.parse_addresses(&call, &response.payload)?);
        }

        let fetched_at = DateTime::<Utc>::from_timestamp_millis(self.clock.now_ms())
            .unwrap_or_else(Utc::now);

        let total = rows.len();
        let records: Vec<AddressRecord> = rows
            .into_iter()
            .filter_map(|row| normalize_row(asset, row, fetched_at))
            .collect();

        if records.len() < total {
            tracing::debug!(
                asset,
                skipped = total - records.len(),
                "Skipped address rows without address, network, or for another asset"
            );
        }
        Ok(records)
    }
}

/// Turn a raw row into a record, or `None` when it cannot be one
fn normalize_row(asset: &str, row: AddressRow, fetched_at: DateTime<Utc>) -> Option<AddressRecord> {
    if let Some(row_asset) = row.asset.as_deref() {
        if !row_asset.trim().eq_ignore_ascii_case(asset) {
            return None;
        }
    }

    let address = row.address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty())?;
    let network = row.network.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())?;
    let tag = row.tag.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

    Some(AddressRecord {
        asset: asset.to_string(),
        network,
        address,
        tag,
        source_timestamp: fetched_at,
    })
}
