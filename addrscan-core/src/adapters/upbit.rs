//! Upbit v1 profile
//!
//! Same wire shape as Bithumb: bare-payload responses, `{"error": {...}}`
//! bodies, `/v1/status/wallet` as the catalog. The token carries no
//! timestamp claim, and the address listing takes no parameters: it returns
//! every generated address, so the resolver picks out the requested asset.

use serde_json::Value as JsonValue;

use super::bithumb::{interpret_error_body, parse_coin_addresses, parse_wallet_status};
use crate::domain::auth::{SignatureScheme, TokenTemplate};
use crate::domain::result::Result;
use crate::ports::{
    AddressRow, ApiCall, ApiResponse, CatalogPage, CodeTable, ExchangeProfile, HttpResponse,
    TransportError,
};

pub const UPBIT_BASE_URL: &str = "https://api.upbit.com";

pub struct UpbitProfile {
    codes: CodeTable,
}

impl UpbitProfile {
    pub fn new() -> Self {
        Self {
            codes: CodeTable::new(&["too_many_requests"], &[]),
        }
    }
}

impl Default for UpbitProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeProfile for UpbitProfile {
    fn name(&self) -> &str {
        "upbit"
    }

    fn default_base_url(&self) -> &str {
        UPBIT_BASE_URL
    }

    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Token(TokenTemplate {
            include_timestamp: false,
            ..TokenTemplate::default()
        })
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

    fn address_call(&self, _asset: &str) -> ApiCall {
        ApiCall::get("/v1/deposits/coin_addresses")
    }

    fn parse_addresses(&self, _call: &ApiCall, payload: &JsonValue) -> Result<Vec<AddressRow>> {
        parse_coin_addresses(payload)
    }
}
