//! Binance SAPI profile
//!
//! - Auth: `X-MBX-APIKEY` header; `timestamp` and `recvWindow` are appended
//!   to the query, HMAC-SHA256 (hex) over that query string travels as the
//!   final `signature` parameter.
//! - No envelope: a 2xx body is the payload, an error is `{"code": -N,
//!   "msg": ...}` with a 4xx status.
//! - The deposit-address endpoint is scoped to one (coin, network) pair and
//!   its answer does not name the network, so the network comes from the call.
//! - Rate limit: `-1003`, HTTP 429, HTTP 418 (IP ban). Clock skew: `-1021`.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::decode_envelope;
use super::lenient;
use crate::domain::auth::{
    AuthHeaderNames, CanonicalField, CanonicalTemplate, SignatureEncoding, SignatureScheme,
    SignaturePlacement, TimestampFormat,
};
use crate::domain::result::Result;
use crate::ports::{
    AddressRow, ApiCall, ApiResponse, CatalogPage, CatalogRow, CodeTable, ExchangeProfile,
    HttpResponse, TransportError,
};

pub const BINANCE_BASE_URL: &str = "https://api.binance.com";

const ADDRESS_PATH: &str = "/sapi/v1/capital/deposit/address";

// =============================================================================
// API Response Models
// =============================================================================

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinConfig {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    coin: Option<String>,
    #[serde(default)]
    network_list: Vec<NetworkInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkInfo {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    network: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    deposit_enable: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    withdraw_enable: bool,
    #[serde(default, deserialize_with = "lenient::opt_decimal")]
    deposit_dust: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    min_confirm: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    contract_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DepositAddress {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    coin: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    address: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    tag: Option<String>,
}

// =============================================================================
// BinanceProfile
// =============================================================================

pub struct BinanceProfile {
    codes: CodeTable,
}

impl BinanceProfile {
    pub fn new() -> Self {
        Self {
            codes: CodeTable::new(&["-1003", "HTTP 418"], &["-1021"]),
        }
    }
}

impl Default for BinanceProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeProfile for BinanceProfile {
    fn name(&self) -> &str {
        "binance"
    }

    fn default_base_url(&self) -> &str {
        BINANCE_BASE_URL
    }

    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::HmacCanonical(CanonicalTemplate {
            fields: vec![CanonicalField::Payload],
            encoding: SignatureEncoding::HexLower,
            timestamp_format: TimestampFormat::EpochMillis,
            headers: AuthHeaderNames {
                key: "X-MBX-APIKEY".to_string(),
                signature: "signature".to_string(),
                timestamp: "timestamp".to_string(),
                recv_window: Some("recvWindow".to_string()),
                passphrase: None,
                extra: Vec::new(),
            },
            placement: SignaturePlacement::Query,
        })
    }

    fn codes(&self) -> &CodeTable {
        &self.codes
    }

    fn interpret(&self, response: &HttpResponse) -> std::result::Result<ApiResponse, TransportError> {
        if !(200..300).contains(&response.status) && response.status != 429 {
            // Ban pages and gateway errors are often not JSON
            let error = serde_json::from_str::<ErrorBody>(&response.body).ok();
            let code = error
                .as_ref()
                .and_then(|e| e.code.clone())
                .unwrap_or_else(|| format!("HTTP {}", response.status));
            let message = error.and_then(|e| e.msg).unwrap_or_default();
            return Ok(ApiResponse::error(response.status, code, message));
        }

        let body: JsonValue = match decode_envelope(response)? {
            Ok(body) => body,
            Err(throttled) => return Ok(throttled),
        };

        Ok(ApiResponse {
            status_code: response.status,
            ..ApiResponse::ok(body)
        })
    }

    fn catalog_call(&self, _cursor: Option<&str>) -> ApiCall {
        ApiCall::get("/sapi/v1/capital/config/getall")
    }

    fn parse_catalog(&self, payload: &JsonValue) -> Result<CatalogPage> {
        let coins: Vec<CoinConfig> = serde_json::from_value(payload.clone())?;

        let rows = coins
            .into_iter()
            .flat_map(|coin| {
                let asset = coin.coin;
                coin.network_list.into_iter().map(move |net| CatalogRow {
                    asset: asset.clone(),
                    network: net.network,
                    deposit_enabled: net.deposit_enable,
                    withdraw_enabled: net.withdraw_enable,
                    min_deposit: net.deposit_dust,
                    confirmations_required: net.min_confirm,
                    contract_address: net.contract_address.filter(|c| !c.trim().is_empty()),
                })
            })
            .collect();

        Ok(CatalogPage {
            rows,
            next_cursor: None,
        })
    }

    /// The coin's default network only
    fn address_call(&self, asset: &str) -> ApiCall {
        ApiCall::get(ADDRESS_PATH).param("coin", asset)
    }

    fn address_calls(&self, asset: &str, networks: &[String]) -> Vec<ApiCall> {
        networks
            .iter()
            .map(|network| self.address_call(asset).param("network", network.as_str()))
            .collect()
    }

    fn parse_addresses(&self, call: &ApiCall, payload: &JsonValue) -> Result<Vec<AddressRow>> {
        if payload.is_null() {
            return Ok(Vec::new());
        }
        let found: DepositAddress = serde_json::from_value(payload.clone())?;
        let network = call
            .query
            .iter()
            .find(|(k, _)| k == "network")
            .map(|(_, v)| v.clone());

        Ok(vec![AddressRow {
            asset: found.coin,
            network,
            address: found.address,
            tag: found.tag,
        }])
    }
}
