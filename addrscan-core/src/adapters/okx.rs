//! OKX v5 profile
//!
//! - Catalog: `GET /api/v5/asset/currencies`, one row per currency/chain.
//! - Addresses: `GET /api/v5/asset/deposit-address?ccy=X`, every chain of
//!   the currency in one response.
//! - Envelope: `{code, msg, data}`; `code == "0"` is success.
//! - Signature: base64 HMAC-SHA256 over `isoTimestamp + METHOD + path?query + body`,
//!   plus a mandatory passphrase header.
//! - Throttling: code `50011` or HTTP 429. Clock skew: code `50102`.

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

pub const OKX_BASE_URL: &str = "https://www.okx.com";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: JsonValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Currency {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    ccy: Option<String>,
    /// e.g. "USDT-TRC20"
    #[serde(default, deserialize_with = "lenient::opt_string")]
    chain: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    can_dep: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    can_wd: bool,
    #[serde(default, deserialize_with = "lenient::opt_decimal")]
    min_dep: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    min_dep_arrival_confirm: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    ct_addr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DepositAddress {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    ccy: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    chain: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    addr: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    tag: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    memo: Option<String>,
}

pub struct OkxProfile {
    codes: CodeTable,
}

impl OkxProfile {
    pub fn new() -> Self {
        Self {
            codes: CodeTable::new(&["50011", "50061"], &["50102"]),
        }
    }
}

impl Default for OkxProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeProfile for OkxProfile {
    fn name(&self) -> &str {
        "okx"
    }

    fn default_base_url(&self) -> &str {
        OKX_BASE_URL
    }

    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::HmacCanonical(CanonicalTemplate {
            fields: vec![
                CanonicalField::Timestamp,
                CanonicalField::Method,
                CanonicalField::PathWithQuery,
                CanonicalField::Body,
            ],
            encoding: SignatureEncoding::Base64,
            timestamp_format: TimestampFormat::Iso8601Millis,
            headers: AuthHeaderNames {
                key: "OK-ACCESS-KEY".to_string(),
                signature: "OK-ACCESS-SIGN".to_string(),
                timestamp: "OK-ACCESS-TIMESTAMP".to_string(),
                recv_window: None,
                passphrase: Some("OK-ACCESS-PASSPHRASE".to_string()),
                extra: Vec::new(),
            },
            placement: SignaturePlacement::Headers,
        })
    }

    fn codes(&self) -> &CodeTable {
        &self.codes
    }

    fn interpret(&self, response: &HttpResponse) -> std::result::Result<ApiResponse, TransportError> {
        let envelope: Envelope = match decode_envelope(response)? {
            Ok(envelope) => envelope,
            Err(throttled) => return Ok(throttled),
        };

        let code = envelope.code.unwrap_or_default();
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
            error_message: (!success).then(|| envelope.msg.unwrap_or_default()),
            payload: envelope.data,
            rate_limit_reset_ms: None,
        })
    }

    fn catalog_call(&self, _cursor: Option<&str>) -> ApiCall {
        ApiCall::get("/api/v5/asset/currencies")
    }

    fn parse_catalog(&self, payload: &JsonValue) -> Result<CatalogPage> {
        let currencies: Vec<Currency> = serde_json::from_value(payload.clone())?;

        let rows = currencies
            .into_iter()
            .map(|c| CatalogRow {
                asset: c.ccy,
                network: c.chain,
                deposit_enabled: c.can_dep,
                withdraw_enabled: c.can_wd,
                min_deposit: c.min_dep,
                confirmations_required: c.min_dep_arrival_confirm,
                contract_address: c.ct_addr,
            })
            .collect();

        Ok(CatalogPage {
            rows,
            next_cursor: None,
        })
    }

    fn address_call(&self, asset: &str) -> ApiCall {
        ApiCall::get("/api/v5/asset/deposit-address").param("ccy", asset)
    }

    fn parse_addresses(&self, _call: &ApiCall, payload: &JsonValue) -> Result<Vec<AddressRow>> {
        if payload.is_null() {
            return Ok(Vec::new());
        }
        let addresses: Vec<DepositAddress> = serde_json::from_value(payload.clone())?;

        Ok(addresses
            .into_iter()
            .map(|a| AddressRow {
                asset: a.ccy,
                network: a.chain,
                address: a.addr,
                // Tag-style chains use `tag`, Cosmos-style chains use `memo`
                tag: a.tag.or(a.memo),
            })
            .collect())
    }
}
