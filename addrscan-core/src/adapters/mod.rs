//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - reqwest blocking client for the Transport port
//! - Bybit, OKX, Bithumb, Upbit and Binance profiles for the ExchangeProfile port
//! - Mock exchange HTTP server for testing

pub mod binance;
pub mod bithumb;
pub mod bybit;
pub mod http;
mod lenient;
pub mod okx;
pub mod upbit;

#[cfg(test)]
pub mod mock_exchange;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::domain::result::Error;
use crate::ports::{ApiResponse, ExchangeProfile, HttpResponse, TransportError};

/// Supported exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exchange {
    Bybit,
    Okx,
    Bithumb,
    Upbit,
    Binance,
}

impl Exchange {
    pub const ALL: [Exchange; 5] = [
        Exchange::Bybit,
        Exchange::Okx,
        Exchange::Bithumb,
        Exchange::Upbit,
        Exchange::Binance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Bybit => "bybit",
            Exchange::Okx => "okx",
            Exchange::Bithumb => "bithumb",
            Exchange::Upbit => "upbit",
            Exchange::Binance => "binance",
        }
    }

    pub fn profile(&self) -> Arc<dyn ExchangeProfile> {
        match self {
            Exchange::Bybit => Arc::new(bybit::BybitProfile::new()),
            Exchange::Okx => Arc::new(okx::OkxProfile::new()),
            Exchange::Bithumb => Arc::new(bithumb::BithumbProfile::new()),
            Exchange::Upbit => Arc::new(upbit::UpbitProfile::new()),
            Exchange::Binance => Arc::new(binance::BinanceProfile::new()),
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bybit" => Ok(Exchange::Bybit),
            "okx" => Ok(Exchange::Okx),
            "bithumb" => Ok(Exchange::Bithumb),
            "upbit" => Ok(Exchange::Upbit),
            "binance" => Ok(Exchange::Binance),
            other => Err(Error::config(format!(
                "Unknown exchange '{}' (expected one of: bybit, okx, bithumb, upbit, binance)",
                other
            ))),
        }
    }
}

/// Decode a response body into an exchange envelope
///
/// HTTP 429 short-circuits to a throttled `ApiResponse` whatever the body
/// says. A body that does not decode is `TransportError::Malformed`.
pub(crate) fn decode_envelope<T: DeserializeOwned>(
    response: &HttpResponse,
) -> Result<Result<T, ApiResponse>, TransportError> {
    if response.status == 429 {
        return Ok(Err(ApiResponse::error(429, "429", "Too Many Requests")));
    }

    serde_json::from_str(&response.body)
        .map(Ok)
        .map_err(|e| {
            let snippet: String = response.body.chars().take(120).collect();
            TransportError::Malformed(format!("HTTP {} ({}): {}", response.status, e, snippet))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_from_str() {
        assert_eq!("Bybit".parse::<Exchange>().unwrap(), Exchange::Bybit);
        assert_eq!(" okx ".parse::<Exchange>().unwrap(), Exchange::Okx);
        assert_eq!("bithumb".parse::<Exchange>().unwrap(), Exchange::Bithumb);
        assert_eq!("UPBIT".parse::<Exchange>().unwrap(), Exchange::Upbit);
        assert_eq!("binance".parse::<Exchange>().unwrap(), Exchange::Binance);
        assert!(matches!("kraken".parse::<Exchange>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_profile_names_match() {
        for exchange in Exchange::ALL {
            assert_eq!(exchange.profile().name(), exchange.as_str());
        }
    }

    #[test]
    fn test_decode_envelope_429_short_circuits() {
        let response = HttpResponse::new(429, "<html>slow down</html>");
        let decoded: Result<serde_json::Value, ApiResponse> = decode_envelope(&response).unwrap();
        let throttled = decoded.unwrap_err();
        assert_eq!(throttled.status_code, 429);
        assert!(!throttled.success);
    }

    #[test]
    fn test_decode_envelope_malformed() {
        let response = HttpResponse::new(200, "not json");
        let err = decode_envelope::<serde_json::Value>(&response).unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }
}
