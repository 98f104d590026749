//! Addrscan Core - Exchange deposit address inventory
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (NetworkConfig, AddressRecord, JoinedRecord, etc.)
//! - **ports**: Trait definitions for external dependencies (Transport, Clock, ExchangeProfile)
//! - **services**: Business logic orchestration (signing, backoff, scanning, export)
//! - **adapters**: Concrete implementations (reqwest, Bybit, OKX, Bithumb)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::sync::Arc;

use adapters::http::ReqwestTransport;
use config::Config;
use domain::result::Result;
use ports::{Clock, ExchangeProfile, SystemClock, Transport};
use services::*;

// Re-export commonly used types at crate root
pub use adapters::Exchange;
pub use domain::result::Error;
pub use domain::{
    AddressRecord, AssetFailure, Credential, JoinedRecord, NetworkConfig, ScanOutcome,
    ScanSummary,
};

/// Main context for a scan against one exchange
///
/// Owns the transport, signer, backoff controller and rate limiter for the
/// run; nothing is global.
pub struct ScanContext {
    pub exchange: Exchange,
    pub config: Config,
    pub client: Arc<SignedClient>,
    pub scan_service: ScanService,
    pub export_service: ExportService,
}

impl ScanContext {
    /// Create a context talking to the real exchange (or `config.base_url`)
    pub fn new(exchange: Exchange, credential: Credential, config: Config) -> Result<Self> {
        let profile = exchange.profile();
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| profile.default_base_url().to_string());
        let transport = Arc::new(ReqwestTransport::new(&base_url, config.timeout)?);

        tracing::debug!(exchange = %exchange, base_url = %base_url, "Creating scan context");
        Self::with_parts(exchange, profile, credential, config, transport, Arc::new(SystemClock))
    }

    /// Create a context from explicit parts
    pub fn with_parts(
        exchange: Exchange,
        profile: Arc<dyn ExchangeProfile>,
        credential: Credential,
        config: Config,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        // Fails before any network call on bad credentials
        let signer = Signer::new(credential, profile.scheme(), config.recv_window_ms)?;
        let limiter = Arc::new(RateLimiter::new(config.rate_limit, clock.clone()));

        let client = Arc::new(SignedClient::new(
            profile,
            signer,
            transport,
            clock.clone(),
            config.retry.clone(),
            limiter,
        ));

        let scan_service = ScanService::new(
            ResourceCatalog::new(Arc::clone(&client)),
            AddressResolver::new(Arc::clone(&client), clock),
        );

        Ok(Self {
            exchange,
            config,
            client,
            scan_service,
            export_service: ExportService::new(),
        })
    }

    /// Scan options from the loaded config
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            include_disabled: self.config.include_disabled,
            workers: self.config.workers,
        }
    }
}
