//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The services
//! depend only on these traits, not on concrete implementations.

pub mod clock;
mod exchange;
mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use exchange::{
    AddressRow, ApiCall, ApiResponse, CatalogPage, CatalogRow, CodeTable, ExchangeProfile,
    ResponseClass,
};
pub use transport::{encode_query, HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
