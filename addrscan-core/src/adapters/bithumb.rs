//! Bithumb v1 profile
//!
//! Bearer-token authentication (HS256 JWT with `access_key`, `nonce`,
//! `timestamp` and a SHA-512 hash of the sorted query). No envelope: a 2xx
//! response is the payload itself, an error is
//! `{"error": {"name": ..., "message": ...}}`.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::decode_envelope;
use super::lenient;
use crate::domain::auth::{SignatureScheme, TokenTemplate};
use crate::domain::result::Result;
use crate::ports::{
    AddressRow, ApiCall, ApiResponse, CatalogPage, CatalogRow, CodeTable, ExchangeProfile,
    HttpResponse, TransportError,
};

pub const BITHUMB_BASE_URL: &str = "https://api.bithumb.com";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WalletStatus {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    currency: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    net_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    wallet_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoinAddress {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    currency: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    net_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    deposit_address: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    secondary_address: Option<String>,
}

/// (deposit, withdraw) enabled for a wallet state
fn wallet_directions(state: Option<&str>) -> (bool, bool) {
    match state.map(str::to_ascii_lowercase).as_deref() {
        Some("working") => (true, true),
        Some("deposit_only") => (true, false),
        Some("withdraw_only") => (false, true),
        _ => (false, false),
    }
}

pub struct BithumbProfile {
    codes: CodeTable,
}

impl BithumbProfile {
    pub fn new() -> Self {
        Self {
            codes: CodeTable::new(&["too_many_requests"], &[]),
        }
    }
}

impl Default for BithumbProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeProfile for BithumbProfile {
    fn name(&self) -> &str {
        "bithumb"
    }

    fn default_base_url(&self) -> &str {
        BITHUMB_BASE_URL
    }

    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Token(TokenTemplate::default())
    }

    fn codes(&self) -> &CodeTable {
        &self.codes
    }

    fn interpret(&self, response: &HttpResponse) -> std::result::Result<ApiResponse, TransportError> {
        interpret_error_body(response)
    }

    fn catalog_call(&self, _cursor: Option<&str>) -> ApiCall {
        ApiCall::get("/v1/status/wallet")
    }

    fn parse_catalog(&self, payload: &JsonValue) -> Result<CatalogPage> {
        parse_wallet_status(payload)
    }

    fn address_call(&self, asset: &str) -> ApiCall {
        ApiCall::get("/v1/deposits/coin_addresses").param("currency", asset)
    }

    fn parse_addresses(&self, _call: &ApiCall, payload: &JsonValue) -> Result<Vec<AddressRow>> {
        parse_coin_addresses(payload)
    }
}

/// Reduce a bare-payload response; errors arrive as `{"error": {...}}`
///
/// Shared with Upbit, whose v1 API Bithumb mirrors.
pub(super) fn interpret_error_body(
    response: &HttpResponse,
) -> std::result::Result<ApiResponse, TransportError> {
    let body: JsonValue = match decode_envelope(response)? {
        Ok(body) => body,
        Err(throttled) => return Ok(throttled),
    };

    if let Some(error) = body.get("error") {
        let error: ErrorBody = serde_json::from_value(error.clone())
            .map_err(|e| TransportError::Malformed(format!("error body: {}", e)))?;
        return Ok(ApiResponse::error(
            response.status,
            error
                .name
                .unwrap_or_else(|| format!("HTTP {}", response.status)),
            error.message.unwrap_or_default(),
        ));
    }

    if !(200..300).contains(&response.status) {
        return Ok(ApiResponse::error(
            response.status,
            format!("HTTP {}", response.status),
            "",
        ));
    }

    Ok(ApiResponse {
        status_code: response.status,
        ..ApiResponse::ok(body)
    })
}

/// `/v1/status/wallet`: one row per (currency, net_type)
pub(super) fn parse_wallet_status(payload: &JsonValue) -> Result<CatalogPage> {
    let statuses: Vec<WalletStatus> = serde_json::from_value(payload.clone())?;

    let rows = statuses
        .into_iter()
        .map(|s| {
            let (deposit_enabled, withdraw_enabled) = wallet_directions(s.wallet_state.as_deref());
            CatalogRow {
                asset: s.currency,
                network: s.net_type,
                deposit_enabled,
                withdraw_enabled,
                ..Default::default()
            }
        })
        .collect();

    Ok(CatalogPage {
        rows,
        next_cursor: None,
    })
}

/// `/v1/deposits/coin_addresses`: a list, or a single object when exactly
/// one address exists
pub(super) fn parse_coin_addresses(payload: &JsonValue) -> Result<Vec<AddressRow>> {
    let addresses: Vec<CoinAddress> = match payload {
        JsonValue::Null => Vec::new(),
        JsonValue::Array(_) => serde_json::from_value(payload.clone())?,
        _ => vec![serde_json::from_value(payload.clone())?],
    };

    Ok(addresses
        .into_iter()
        .map(|a| AddressRow {
            asset: a.currency,
            network: a.net_type,
            address: a.deposit_address,
            tag: a.secondary_address,
        })
        .collect())
}
