//! Core domain entities
//!
//! Plain data structures with validation logic. No I/O.

mod address;
pub mod auth;
pub mod credential;
mod network;
pub mod result;
mod scan;

pub use address::{AddressRecord, JoinedRecord};
pub use credential::Credential;
pub use network::{NetworkConfig, NetworkKey};
pub use scan::{AssetFailure, ScanOutcome, ScanSummary};
