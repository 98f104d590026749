//! Authentication scheme descriptions
//!
//! Each exchange fixes how its signature is computed and which headers carry
//! it. These types describe that contract as data; the signer service
//! interprets them. Field order in a canonical template is significant: the
//! exchange rejects a reordered pre-hash string with an auth error.

/// One piece of the canonical pre-hash string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalField {
    Timestamp,
    KeyId,
    RecvWindow,
    /// Upper-case HTTP method
    Method,
    /// Request path without query
    Path,
    /// Request path plus `?query` when a query is present
    PathWithQuery,
    /// Encoded query string (GET) or raw body (POST)
    Payload,
    /// Raw request body, empty for GET
    Body,
}

/// How the raw MAC bytes are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureEncoding {
    HexLower,
    Base64,
}

/// How the timestamp is rendered into the pre-hash string and headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `1700000000000`
    EpochMillis,
    /// `2023-11-14T22:13:20.000Z`
    Iso8601Millis,
}

/// Where an HMAC scheme puts the signature, timestamp and recv-window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignaturePlacement {
    /// As headers, next to the key
    #[default]
    Headers,
    /// As query parameters: timestamp and recv-window are appended before
    /// signing, the signature is appended last
    Query,
}

/// Names of the values an HMAC scheme sends
///
/// `signature`, `timestamp` and `recv_window` name headers or query
/// parameters depending on the template's placement. `key`, `passphrase`
/// and `extra` are always headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaderNames {
    pub key: String,
    pub signature: String,
    pub timestamp: String,
    pub recv_window: Option<String>,
    pub passphrase: Option<String>,
    /// Constant headers sent with every signed request
    pub extra: Vec<(String, String)>,
}

/// HMAC-SHA256 over a fixed concatenation of request fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTemplate {
    pub fields: Vec<CanonicalField>,
    pub encoding: SignatureEncoding,
    pub timestamp_format: TimestampFormat,
    pub headers: AuthHeaderNames,
    pub placement: SignaturePlacement,
}

impl CanonicalTemplate {
    pub fn requires_passphrase(&self) -> bool {
        self.headers.passphrase.is_some()
    }
}

/// Bearer token signed over a claims payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTemplate {
    /// Whether the claims carry a millisecond timestamp
    pub include_timestamp: bool,
    pub header: String,
    pub prefix: String,
}

impl Default for TokenTemplate {
    fn default() -> Self {
        Self {
            include_timestamp: true,
            header: "Authorization".to_string(),
            prefix: "Bearer ".to_string(),
        }
    }
}

/// The authentication capability, one variant per shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureScheme {
    HmacCanonical(CanonicalTemplate),
    Token(TokenTemplate),
}

impl SignatureScheme {
    pub fn requires_passphrase(&self) -> bool {
        match self {
            Self::HmacCanonical(t) => t.requires_passphrase(),
            Self::Token(_) => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::HmacCanonical(_) => "hmac",
            Self::Token(_) => "token",
        }
    }
}
