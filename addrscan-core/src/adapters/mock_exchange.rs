//! Mock Bybit-style exchange server for testing
//!
//! Serves the two endpoints a scan needs over plain HTTP on localhost:
//! - GET /v5/asset/coin/query-info returns `{retCode, retMsg, result: {rows}}`
//! - GET /v5/asset/deposit/query-address?coin=X returns the coin's addresses
//!
//! Requests without a signature header get `retCode 10003`. The first
//! `throttle_first` requests get `retCode 10006` with a reset header.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use serde_json::json;

/// Mock exchange server
pub struct MockExchangeServer {
    port: u16,
    running: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

/// One coin the mock lists
#[derive(Debug, Clone)]
pub struct MockCoin {
    pub coin: String,
    /// (chain, deposit enabled, address)
    pub chains: Vec<(String, bool, String)>,
}

impl MockCoin {
    pub fn new(coin: &str, chains: &[(&str, bool, &str)]) -> Self {
        Self {
            coin: coin.to_string(),
            chains: chains
                .iter()
                .map(|(c, enabled, addr)| (c.to_string(), *enabled, addr.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub coins: Vec<MockCoin>,
    /// Throttle this many requests before answering normally
    pub throttle_first: usize,
    /// Coin whose address lookup fails with a terminal code
    pub failing_coin: Option<String>,
    /// Answer the catalog with a non-JSON body
    pub broken_catalog: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            coins: vec![
                MockCoin::new("BTC", &[("BTC", true, "bc1qmockaddress")]),
                MockCoin::new(
                    "USDT",
                    &[
                        ("ETH", true, "0xmockusdt"),
                        ("TRX", false, "TMockTron"),
                    ],
                ),
            ],
            throttle_first: 0,
            failing_coin: None,
            broken_catalog: false,
        }
    }
}

impl MockExchangeServer {
    /// Start a new mock server on a random available port
    pub fn start(config: MockConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(AtomicUsize::new(0));

        // Non-blocking so the accept loop can observe shutdown
        listener.set_nonblocking(true)?;

        let running_clone = running.clone();
        let requests_clone = requests.clone();
        let config = Arc::new(config);

        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let cfg = config.clone();
                        let counter = requests_clone.clone();
                        thread::spawn(move || handle_connection(stream, &cfg, &counter));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            requests,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Requests served so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockExchangeServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_connection(mut stream: TcpStream, config: &MockConfig, counter: &AtomicUsize) {
    let _ = stream.set_nonblocking(false);
    let mut buffer = [0; 8192];

    let Ok(n) = stream.read(&mut buffer) else {
        return;
    };
    let request = String::from_utf8_lossy(&buffer[..n]);
    let seen = counter.fetch_add(1, Ordering::SeqCst);

    let first_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        send_response(&mut stream, 400, "Bad Request", r#"{"retCode":10001,"retMsg":"bad request"}"#, &[]);
        return;
    }
    let (path, query) = parts[1].split_once('?').unwrap_or((parts[1], ""));

    if !request.to_lowercase().contains("x-bapi-sign:") {
        send_envelope(&mut stream, 10003, "API key is invalid.", json!({}), &[]);
        return;
    }

    if seen < config.throttle_first {
        let reset = chrono::Utc::now().timestamp_millis() + 100;
        send_envelope(
            &mut stream,
            10006,
            "Too many visits!",
            json!({}),
            &[("X-Bapi-Limit-Reset-Timestamp", reset.to_string())],
        );
        return;
    }

    match path {
        "/v5/asset/coin/query-info" => {
            if config.broken_catalog {
                send_response(&mut stream, 502, "Bad Gateway", "<html>Bad Gateway</html>", &[]);
                return;
            }
            let rows: Vec<_> = config
                .coins
                .iter()
                .map(|c| {
                    let chains: Vec<_> = c
                        .chains
                        .iter()
                        .map(|(chain, enabled, _)| {
                            let deposit = if *enabled { "1" } else { "0" };
                            json!({
                                "chain": chain,
                                "chainType": chain,
                                "chainDeposit": deposit,
                                "chainWithdraw": "1",
                                "confirmation": "6",
                                "depositMin": "0"
                            })
                        })
                        .collect();
                    json!({ "coin": c.coin, "name": c.coin, "chains": chains })
                })
                .collect();
            send_envelope(&mut stream, 0, "success", json!({ "rows": rows }), &[]);
        }
        "/v5/asset/deposit/query-address" => {
            let coin = query
                .split('&')
                .find_map(|pair| pair.strip_prefix("coin="))
                .unwrap_or("");

            if config.failing_coin.as_deref() == Some(coin) {
                send_envelope(&mut stream, 131001, "coin not supported", json!({}), &[]);
                return;
            }

            let chains: Vec<_> = config
                .coins
                .iter()
                .filter(|c| c.coin == coin)
                .flat_map(|c| c.chains.iter())
                .map(|(chain, _, address)| {
                    json!({
                        "chainType": chain,
                        "addressDeposit": address,
                        "tagDeposit": "",
                        "chain": chain
                    })
                })
                .collect();
            send_envelope(&mut stream, 0, "success", json!({ "coin": coin, "chains": chains }), &[]);
        }
        _ => send_response(&mut stream, 404, "Not Found", r#"{"retCode":10001,"retMsg":"not found"}"#, &[]),
    }
}

fn send_envelope(
    stream: &mut TcpStream,
    code: i64,
    message: &str,
    result: serde_json::Value,
    headers: &[(&str, String)],
) {
    let body = json!({ "retCode": code, "retMsg": message, "result": result }).to_string();
    send_response(stream, 200, "OK", &body, headers);
}

fn send_response(
    stream: &mut TcpStream,
    status: u16,
    status_text: &str,
    body: &str,
    headers: &[(&str, String)],
) {
    let extra: String = headers
        .iter()
        .map(|(name, value)| format!("{}: {}\r\n", name, value))
        .collect();
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n{}",
        status,
        status_text,
        body.len(),
        extra,
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::bybit::BybitProfile;
    use crate::adapters::http::ReqwestTransport;
    use crate::domain::result::Error;
    use crate::domain::Credential;
    use crate::ports::{ExchangeProfile, ManualClock, TransportError};
    use crate::services::{
        AddressResolver, RateLimit, RateLimiter, ResourceCatalog, RetryPolicy, ScanOptions,
        ScanService, SignedClient, Signer,
    };
    use std::time::Duration;

    fn scan_service(server: &MockExchangeServer) -> ScanService {
        let profile: Arc<dyn ExchangeProfile> = Arc::new(BybitProfile::new());
        let clock = Arc::new(ManualClock::new(chrono::Utc::now().timestamp_millis()));
        let transport =
            Arc::new(ReqwestTransport::new(&server.base_url(), Duration::from_secs(5)).unwrap());
        let signer = Signer::new(
            Credential::new("mock-key", "mock-secret"),
            profile.scheme(),
            5000,
        )
        .unwrap();
        let limiter = Arc::new(RateLimiter::new(RateLimit::default(), clock.clone()));
        let client = Arc::new(SignedClient::new(
            profile,
            signer,
            transport,
            clock.clone(),
            RetryPolicy::default().without_jitter(),
            limiter,
        ));
        ScanService::new(
            ResourceCatalog::new(client.clone()),
            AddressResolver::new(client, clock),
        )
    }

    #[test]
    fn test_scan_against_mock() {
        let server = MockExchangeServer::start(MockConfig::default()).unwrap();
        let outcome = scan_service(&server).scan(&ScanOptions::default()).unwrap();

        // TRX has deposits disabled
        let keys: Vec<(&str, &str)> = outcome
            .records
            .iter()
            .map(|r| (r.asset.as_str(), r.network.as_str()))
            .collect();
        assert_eq!(keys, vec![("BTC", "BTC"), ("USDT", "ETH")]);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.records[0].confirmations_required, Some(6));
    }

    #[test]
    fn test_throttled_requests_are_retried() {
        let server = MockExchangeServer::start(MockConfig {
            throttle_first: 2,
            ..Default::default()
        })
        .unwrap();
        let outcome = scan_service(&server).scan(&ScanOptions::default()).unwrap();

        assert_eq!(outcome.records.len(), 2);
        // 2 throttled + catalog + 2 address lookups
        assert_eq!(server.request_count(), 5);
    }

    #[test]
    fn test_failing_coin_is_partial() {
        let server = MockExchangeServer::start(MockConfig {
            failing_coin: Some("BTC".to_string()),
            ..Default::default()
        })
        .unwrap();
        let outcome = scan_service(&server).scan(&ScanOptions::default()).unwrap();

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].asset, "BTC");
        assert!(outcome.failures[0].reason.contains("131001"));
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn test_broken_catalog_is_fatal() {
        let server = MockExchangeServer::start(MockConfig {
            broken_catalog: true,
            ..Default::default()
        })
        .unwrap();
        let result = scan_service(&server).scan(&ScanOptions::default());

        match result {
            Err(Error::Catalog(inner)) => {
                assert!(matches!(*inner, Error::Transport(TransportError::Malformed(_))))
            }
            other => panic!("expected catalog error, got {:?}", other.map(|o| o.records.len())),
        }
    }
}
