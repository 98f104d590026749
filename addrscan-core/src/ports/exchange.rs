//! Exchange profile port
//!
//! An exchange profile is the per-exchange contract: how requests are
//! authenticated, which endpoints list the asset/network catalog and the
//! deposit addresses, how the response envelope reports success, and which
//! error codes mean "throttled" or "clock skew". Adding an exchange means
//! adding a profile; the scanner and backoff controller stay untouched.

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use crate::domain::auth::SignatureScheme;
use crate::domain::result::Result;
use crate::ports::transport::{HttpMethod, HttpResponse, TransportError};

/// An unsigned API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ApiCall {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// A response reduced to the exchange's envelope
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status_code: u16,
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub payload: JsonValue,
    /// Server-supplied epoch millis at which the rate-limit window resets
    pub rate_limit_reset_ms: Option<i64>,
}

impl ApiResponse {
    pub fn ok(payload: JsonValue) -> Self {
        Self {
            status_code: 200,
            success: true,
            error_code: None,
            error_message: None,
            payload,
            rate_limit_reset_ms: None,
        }
    }

    pub fn error(status_code: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            success: false,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
            payload: JsonValue::Null,
            rate_limit_reset_ms: None,
        }
    }
}

/// How the backoff controller should treat a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    RateLimited,
    ClockSkew,
    Terminal,
}

/// Error codes an exchange uses for the retriable conditions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeTable {
    pub rate_limited: Vec<String>,
    pub clock_skew: Vec<String>,
}

impl CodeTable {
    pub fn new(rate_limited: &[&str], clock_skew: &[&str]) -> Self {
        Self {
            rate_limited: rate_limited.iter().map(|s| s.to_string()).collect(),
            clock_skew: clock_skew.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn classify(&self, response: &ApiResponse) -> ResponseClass {
        if response.success {
            return ResponseClass::Success;
        }
        let code = response.error_code.as_deref().unwrap_or("");
        if response.status_code == 429 || self.rate_limited.iter().any(|c| c == code) {
            ResponseClass::RateLimited
        } else if self.clock_skew.iter().any(|c| c == code) {
            ResponseClass::ClockSkew
        } else {
            ResponseClass::Terminal
        }
    }
}

/// One catalog row as the exchange reported it
///
/// Asset and network stay optional here; the catalog drops rows missing
/// either one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogRow {
    pub asset: Option<String>,
    pub network: Option<String>,
    pub deposit_enabled: bool,
    pub withdraw_enabled: bool,
    pub min_deposit: Option<Decimal>,
    pub confirmations_required: Option<u32>,
    pub contract_address: Option<String>,
}

/// One page of the catalog listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogPage {
    pub rows: Vec<CatalogRow>,
    pub next_cursor: Option<String>,
}

/// One address row as the exchange reported it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressRow {
    /// Set when the listing can contain other assets
    pub asset: Option<String>,
    pub network: Option<String>,
    pub address: Option<String>,
    pub tag: Option<String>,
}

/// Exchange profile trait
pub trait ExchangeProfile: Send + Sync {
    /// Profile name (e.g., "bybit", "okx")
    fn name(&self) -> &str;

    fn default_base_url(&self) -> &str;

    fn scheme(&self) -> SignatureScheme;

    fn codes(&self) -> &CodeTable;

    /// Reduce a raw HTTP response to the envelope
    ///
    /// Returns `TransportError::Malformed` when the body is not the
    /// exchange's JSON envelope at all.
    fn interpret(&self, response: &HttpResponse) -> std::result::Result<ApiResponse, TransportError>;

    /// The catalog listing call; `cursor` is the previous page's cursor
    fn catalog_call(&self, cursor: Option<&str>) -> ApiCall;

    fn parse_catalog(&self, payload: &JsonValue) -> Result<CatalogPage>;

    /// The address listing call for one asset
    fn address_call(&self, asset: &str) -> ApiCall;

    /// Every address call one asset needs
    ///
    /// `networks` are the catalog networks the scan keeps for the asset.
    /// Most exchanges list all of an asset's networks in one call; a
    /// network-scoped endpoint returns one call per network instead.
    fn address_calls(&self, asset: &str, _networks: &[String]) -> Vec<ApiCall> {
        vec![self.address_call(asset)]
    }

    /// Parse the payload answering `call`
    fn parse_addresses(&self, call: &ApiCall, payload: &JsonValue) -> Result<Vec<AddressRow>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let codes = CodeTable::new(&["10006"], &["10002"]);
        assert_eq!(
            codes.classify(&ApiResponse::ok(JsonValue::Null)),
            ResponseClass::Success
        );
        assert_eq!(
            codes.classify(&ApiResponse::error(200, "10006", "Too many visits")),
            ResponseClass::RateLimited
        );
        assert_eq!(
            codes.classify(&ApiResponse::error(200, "10002", "timestamp")),
            ResponseClass::ClockSkew
        );
        assert_eq!(
            codes.classify(&ApiResponse::error(200, "131001", "unsupported")),
            ResponseClass::Terminal
        );
    }

    #[test]
    fn test_http_429_is_rate_limited() {
        let codes = CodeTable::default();
        assert_eq!(
            codes.classify(&ApiResponse::error(429, "unknown", "slow down")),
            ResponseClass::RateLimited
        );
    }

    #[test]
    fn test_api_call_builder() {
        let call = ApiCall::get("/api/v5/asset/deposit-address").param("ccy", "BTC");
        assert_eq!(call.method, HttpMethod::Get);
        assert_eq!(call.query, vec![("ccy".to_string(), "BTC".to_string())]);
        assert!(call.body.is_none());
    }
}
