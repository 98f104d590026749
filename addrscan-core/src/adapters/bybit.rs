//! Bybit v5 profile
//!
//! - Catalog: `GET /v5/asset/coin/query-info` returns every coin with its
//!   chains in one response.
//! - Addresses: `GET /v5/asset/deposit/query-address?coin=X` returns all of
//!   the coin's chains in one response.
//! - Envelope: `{retCode, retMsg, result}`; `retCode == 0` is success.
//! - Throttling: `retCode 10006` or HTTP 429, with the window end in the
//!   `X-Bapi-Limit-Reset-Timestamp` header (epoch millis).
//! - Clock skew: `retCode 10002`.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::lenient;
use super::decode_envelope;
use crate::domain::auth::{
    AuthHeaderNames, CanonicalField, CanonicalTemplate, SignatureEncoding, SignatureScheme,
    SignaturePlacement, TimestampFormat,
};
use crate::domain::result::Result;
use crate::ports::{
    AddressRow, ApiCall, ApiResponse, CatalogPage, CatalogRow, CodeTable, ExchangeProfile,
    HttpResponse, TransportError,
};

pub const BYBIT_BASE_URL: &str = "https://api.bybit.com";

const RESET_HEADER: &str = "x-bapi-limit-reset-timestamp";

// =============================================================================
// API Response Models
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(deserialize_with = "lenient::opt_string", default)]
    ret_code: Option<String>,
    #[serde(default)]
    ret_msg: Option<String>,
    #[serde(default)]
    result: JsonValue,
}

#[derive(Debug, Deserialize)]
struct CoinInfoResult {
    #[serde(default)]
    rows: Vec<CoinInfo>,
}

#[derive(Debug, Deserialize)]
struct CoinInfo {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    coin: Option<String>,
    #[serde(default)]
    chains: Vec<ChainInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainInfo {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    chain: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    chain_deposit: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    chain_withdraw: bool,
    #[serde(default, deserialize_with = "lenient::opt_decimal")]
    deposit_min: Option<rust_decimal::Decimal>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    confirmation: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    contract_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddressResult {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    coin: Option<String>,
    #[serde(default)]
    chains: Vec<AddressChain>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressChain {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    chain: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    address_deposit: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    tag_deposit: Option<String>,
}

// =============================================================================
// BybitProfile
// =============================================================================

pub struct BybitProfile {
    codes: CodeTable,
}

impl BybitProfile {
    pub fn new() -> Self {
        Self {
            codes: CodeTable::new(&["10006"], &["10002"]),
        }
    }
}

impl Default for BybitProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeProfile for BybitProfile {
    fn name(&self) -> &str {
        "bybit"
    }

    fn default_base_url(&self) -> &str {
        BYBIT_BASE_URL
    }

    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::HmacCanonical(CanonicalTemplate {
            fields: vec![
                CanonicalField::Timestamp,
                CanonicalField::KeyId,
                CanonicalField::RecvWindow,
                CanonicalField::Payload,
            ],
            encoding: SignatureEncoding::HexLower,
            timestamp_format: TimestampFormat::EpochMillis,
            headers: AuthHeaderNames {
                key: "X-BAPI-API-KEY".to_string(),
                signature: "X-BAPI-SIGN".to_string(),
                timestamp: "X-BAPI-TIMESTAMP".to_string(),
                recv_window: Some("X-BAPI-RECV-WINDOW".to_string()),
                passphrase: None,
                extra: vec![("X-BAPI-SIGN-TYPE".to_string(), "2".to_string())],
            },
            placement: SignaturePlacement::Headers,
        })
    }

    fn codes(&self) -> &CodeTable {
        &self.codes
    }

    fn interpret(&self, response: &HttpResponse) -> std::result::Result<ApiResponse, TransportError> {
        let reset_ms = response
            .header(RESET_HEADER)
            .and_then(|v| v.trim().parse::<i64>().ok());

        let envelope: Envelope = match decode_envelope(response)? {
            Ok(envelope) => envelope,
            Err(throttled) => {
                return Ok(ApiResponse {
                    rate_limit_reset_ms: reset_ms,
                    ..throttled
                })
            }
        };

        let code = envelope.ret_code.unwrap_or_default();
        let success = code == "0" && (200..300).contains(&response.status);

        Ok(ApiResponse {
            status_code: response.status,
            success,
            error_code: (!success).then(|| {
                if code.is_empty() {
                    format!("HTTP {}", response.status)
                } else {
                    code
                }
            }),
            error_message: (!success).then(|| envelope.ret_msg.unwrap_or_default()),
            payload: envelope.result,
            rate_limit_reset_ms: reset_ms,
        })
    }

    fn catalog_call(&self, _cursor: Option<&str>) -> ApiCall {
        ApiCall::get("/v5/asset/coin/query-info")
    }

    fn parse_catalog(&self, payload: &JsonValue) -> Result<CatalogPage> {
        let result: CoinInfoResult = serde_json::from_value(payload.clone())?;

        let rows = result
            .rows
            .into_iter()
            .flat_map(|coin| {
                let asset = coin.coin;
                coin.chains.into_iter().map(move |chain| CatalogRow {
                    asset: asset.clone(),
                    network: chain.chain,
                    deposit_enabled: chain.chain_deposit,
                    withdraw_enabled: chain.chain_withdraw,
                    min_deposit: chain.deposit_min,
                    confirmations_required: chain.confirmation,
                    contract_address: chain.contract_address,
                })
            })
            .collect();

        Ok(CatalogPage {
            rows,
            next_cursor: None,
        })
    }

    fn address_call(&self, asset: &str) -> ApiCall {
        ApiCall::get("/v5/asset/deposit/query-address").param("coin", asset)
    }

    fn parse_addresses(&self, _call: &ApiCall, payload: &JsonValue) -> Result<Vec<AddressRow>> {
        if payload.is_null() {
            return Ok(Vec::new());
        }
        let result: AddressResult = serde_json::from_value(payload.clone())?;

        Ok(result
            .chains
            .into_iter()
            .map(|chain| AddressRow {
                asset: result.coin.clone(),
                network: chain.chain,
                address: chain.address_deposit,
                tag: chain.tag_deposit,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interpret_success() {
        let profile = BybitProfile::new();
        let response = HttpResponse::new(
            200,
            r#"{"retCode":0,"retMsg":"success","result":{"rows":[]},"time":1700000000000}"#,
        );
        let api = profile.interpret(&response).unwrap();
        assert!(api.success);
        assert_eq!(api.payload, json!({"rows": []}));
    }

    #[test]
    fn test_interpret_rate_limit_with_reset_header() {
        let profile = BybitProfile::new();
        let response = HttpResponse::new(
            200,
            r#"{"retCode":10006,"retMsg":"Too many visits!","result":{}}"#,
        )
        .with_header("X-Bapi-Limit-Reset-Timestamp", "1700000001500");

        let api = profile.interpret(&response).unwrap();
        assert!(!api.success);
        assert_eq!(api.error_code.as_deref(), Some("10006"));
        assert_eq!(api.rate_limit_reset_ms, Some(1_700_000_001_500));
        assert_eq!(
            profile.codes().classify(&api),
            crate::ports::ResponseClass::RateLimited
        );
    }

    #[test]
    fn test_interpret_html_is_malformed() {
        let profile = BybitProfile::new();
        let response = HttpResponse::new(502, "<html>Bad Gateway</html>");
        assert!(matches!(
            profile.interpret(&response),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn test_interpret_429_without_json() {
        let profile = BybitProfile::new();
        let response = HttpResponse::new(429, "Too Many Requests");
        let api = profile.interpret(&response).unwrap();
        assert_eq!(api.status_code, 429);
        assert!(!api.success);
    }

    #[test]
    fn test_parse_catalog_flattens_chains() {
        let profile = BybitProfile::new();
        let payload = json!({
            "rows": [{
                "name": "USDT",
                "coin": "USDT",
                "remainAmount": "1000000",
                "chains": [
                    {
                        "chainType": "ERC20",
                        "confirmation": "12",
                        "withdrawFee": "1",
                        "depositMin": "0",
                        "chain": "ETH",
                        "chainDeposit": "1",
                        "chainWithdraw": "1",
                        "contractAddress": "0xdac17f958d2ee523a2206206994597c13d831ec7"
                    },
                    {
                        "chainType": "TRC20",
                        "confirmation": "20",
                        "depositMin": "1.5",
                        "chain": "TRX",
                        "chainDeposit": "0",
                        "chainWithdraw": "1"
                    }
                ]
            }]
        });

        let page = profile.parse_catalog(&payload).unwrap();
        assert!(page.next_cursor.is_none());
        assert_eq!(page.rows.len(), 2);

        let eth = &page.rows[0];
        assert_eq!(eth.asset.as_deref(), Some("USDT"));
        assert_eq!(eth.network.as_deref(), Some("ETH"));
        assert!(eth.deposit_enabled);
        assert_eq!(eth.confirmations_required, Some(12));
        assert!(eth.contract_address.is_some());

        let trx = &page.rows[1];
        assert!(!trx.deposit_enabled);
        assert_eq!(trx.min_deposit, Some("1.5".parse().unwrap()));
        assert!(trx.contract_address.is_none());
    }

    #[test]
    fn test_parse_addresses() {
        let profile = BybitProfile::new();
        let payload = json!({
            "coin": "XRP",
            "chains": [
                {"chainType": "XRP", "addressDeposit": "rAddr", "tagDeposit": "12345", "chain": "XRP"},
                {"chainType": "BEP20", "addressDeposit": "", "tagDeposit": "", "chain": "BSC"}
            ]
        });

        let rows = profile.parse_addresses(&profile.address_call("XRP"), &payload).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].address.as_deref(), Some("rAddr"));
        assert_eq!(rows[0].tag.as_deref(), Some("12345"));
        assert!(rows[1].address.is_none());
    }

    #[test]
    fn test_address_call() {
        let call = BybitProfile::new().address_call("BTC");
        assert_eq!(call.path, "/v5/asset/deposit/query-address");
        assert_eq!(call.query, vec![("coin".to_string(), "BTC".to_string())]);
    }
}
