//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on one step of a scan.

pub mod backoff;
mod catalog;
mod client;
mod export;
pub mod rate_limit;
mod resolver;
mod scanner;
pub mod signer;

pub use backoff::{AttemptState, BackoffController, RetryPolicy, Step};
pub use catalog::{CatalogIndex, ResourceCatalog, MAX_CATALOG_PAGES};
pub use client::SignedClient;
pub use export::{ExportFormat, ExportService};
pub use rate_limit::{RateLimit, RateLimiter, MIN_REQUESTS_PER_SECOND};
pub use resolver::AddressResolver;
pub use scanner::{join_records, CancelToken, ScanOptions, ScanProgress, ScanService, MAX_WORKERS};
pub use signer::{canonical_query, SignInput, SignedRequest, Signer};
