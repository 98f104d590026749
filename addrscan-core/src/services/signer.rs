//! Request signer
//!
//! Turns a request description plus an injected timestamp and nonce into the
//! exchange's authentication headers and the query to send. Pure: the same
//! input always yields the same output, which is what makes the canonical
//! templates testable.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use sha2::{Digest, Sha256, Sha512};

use crate::domain::auth::{
    CanonicalField, CanonicalTemplate, SignatureEncoding, SignaturePlacement, SignatureScheme,
    TimestampFormat, TokenTemplate,
};
use crate::domain::credential::is_placeholder;
use crate::domain::result::{Error, Result};
use crate::domain::Credential;
use crate::ports::{encode_query, HttpMethod};

type HmacSha256 = Hmac<Sha256>;

/// Everything about one physical request the signature covers
#[derive(Debug, Clone, Copy)]
pub struct SignInput<'a> {
    pub method: HttpMethod,
    pub path: &'a str,
    pub query: &'a [(String, String)],
    pub body: Option<&'a str>,
    pub timestamp_ms: i64,
    pub nonce: &'a str,
}

/// Authentication headers plus the exact query the signature covers
///
/// The query must be sent as-is: token schemes reorder it and query-placed
/// HMAC schemes extend it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedRequest {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

impl SignedRequest {
    /// Header value, case-insensitive
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    access_key: &'a str,
    nonce: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash_alg: Option<&'static str>,
}

/// Signer bound to one credential and one scheme
pub struct Signer {
    credential: Credential,
    scheme: SignatureScheme,
    recv_window_ms: u64,
}

impl Signer {
    /// Create a signer, rejecting credentials the scheme cannot use
    pub fn new(credential: Credential, scheme: SignatureScheme, recv_window_ms: u64) -> Result<Self> {
        if is_placeholder(&credential.key_id) {
            return Err(Error::config("API key is missing or a placeholder"));
        }
        if is_placeholder(&credential.secret) {
            return Err(Error::config("API secret is missing or a placeholder"));
        }
        if scheme.requires_passphrase()
            && credential.passphrase.as_deref().map_or(true, is_placeholder)
        {
            return Err(Error::config("this exchange requires a PASSPHRASE"));
        }

        Ok(Self {
            credential,
            scheme,
            recv_window_ms,
        })
    }

    pub fn scheme(&self) -> &SignatureScheme {
        &self.scheme
    }

    pub fn sign(&self, input: &SignInput<'_>) -> Result<SignedRequest> {
        match &self.scheme {
            SignatureScheme::HmacCanonical(template) => self.sign_hmac(template, input),
            SignatureScheme::Token(template) => self.sign_token(template, input),
        }
    }

    /// The pre-hash string an HMAC scheme signs
    ///
    /// Returns `None` for token schemes.
    pub fn canonical_string(&self, input: &SignInput<'_>) -> Result<Option<String>> {
        match &self.scheme {
            SignatureScheme::HmacCanonical(template) => {
                let timestamp = render_timestamp(input.timestamp_ms, template.timestamp_format)?;
                let query = self.signed_query(template, input.query, &timestamp);
                Ok(Some(self.prehash(template, input, &query, &timestamp)))
            }
            SignatureScheme::Token(_) => Ok(None),
        }
    }

    /// The caller's query, extended with timestamp and recv-window when the
    /// template carries them as parameters
    fn signed_query(
        &self,
        template: &CanonicalTemplate,
        query: &[(String, String)],
        timestamp: &str,
    ) -> Vec<(String, String)> {
        let mut query = query.to_vec();
        if template.placement == SignaturePlacement::Query {
            let names = &template.headers;
            query.push((names.timestamp.clone(), timestamp.to_string()));
            if let Some(name) = &names.recv_window {
                query.push((name.clone(), self.recv_window_ms.to_string()));
            }
        }
        query
    }

    fn prehash(
        &self,
        template: &CanonicalTemplate,
        input: &SignInput<'_>,
        query: &[(String, String)],
        timestamp: &str,
    ) -> String {
        let query = encode_query(query);
        let body = input.body.unwrap_or("");
        let mut prehash = String::new();

        for field in &template.fields {
            match field {
                CanonicalField::Timestamp => prehash.push_str(timestamp),
                CanonicalField::KeyId => prehash.push_str(&self.credential.key_id),
                CanonicalField::RecvWindow => prehash.push_str(&self.recv_window_ms.to_string()),
                CanonicalField::Method => prehash.push_str(input.method.as_str()),
                CanonicalField::Path => prehash.push_str(input.path),
                CanonicalField::PathWithQuery => {
                    prehash.push_str(input.path);
                    if !query.is_empty() {
                        prehash.push('?');
                        prehash.push_str(&query);
                    }
                }
                CanonicalField::Payload => match input.method {
                    HttpMethod::Get => prehash.push_str(&query),
                    HttpMethod::Post => prehash.push_str(body),
                },
                CanonicalField::Body => prehash.push_str(body),
            }
        }

        prehash
    }

    fn sign_hmac(&self, template: &CanonicalTemplate, input: &SignInput<'_>) -> Result<SignedRequest> {
        let timestamp = render_timestamp(input.timestamp_ms, template.timestamp_format)?;
        let mut query = self.signed_query(template, input.query, &timestamp);
        let prehash = self.prehash(template, input, &query, &timestamp);

        let mut mac = HmacSha256::new_from_slice(self.credential.secret.as_bytes())
            .map_err(|e| Error::Signature(format!("invalid HMAC key: {}", e)))?;
        mac.update(prehash.as_bytes());
        let digest = mac.finalize().into_bytes();

        let signature = match template.encoding {
            SignatureEncoding::HexLower => hex::encode(digest),
            SignatureEncoding::Base64 => BASE64.encode(digest),
        };

        let names = &template.headers;
        let mut headers = vec![(names.key.clone(), self.credential.key_id.clone())];
        match template.placement {
            SignaturePlacement::Headers => {
                headers.push((names.signature.clone(), signature));
                headers.push((names.timestamp.clone(), timestamp));
                if let Some(name) = &names.recv_window {
                    headers.push((name.clone(), self.recv_window_ms.to_string()));
                }
            }
            // Must stay last: the server strips it before verifying the rest
            SignaturePlacement::Query => query.push((names.signature.clone(), signature)),
        }
        if let Some(name) = &names.passphrase {
            let passphrase = self
                .credential
                .passphrase
                .clone()
                .ok_or_else(|| Error::config("this exchange requires a PASSPHRASE"))?;
            headers.push((name.clone(), passphrase));
        }
        headers.extend(names.extra.iter().cloned());

        Ok(SignedRequest { headers, query })
    }

    fn sign_token(&self, template: &TokenTemplate, input: &SignInput<'_>) -> Result<SignedRequest> {
        // Sent in the same order it is hashed in
        let mut query = input.query.to_vec();
        query.sort();

        let hash_source = match (input.method, input.body) {
            (HttpMethod::Post, Some(body)) if query.is_empty() => Some(body.to_string()),
            _ if query.is_empty() => None,
            _ => Some(canonical_query(&query)),
        };
        let query_hash = hash_source.map(|source| hex::encode(Sha512::digest(source.as_bytes())));

        let claims = TokenClaims {
            access_key: &self.credential.key_id,
            nonce: input.nonce,
            timestamp: template.include_timestamp.then_some(input.timestamp_ms),
            query_hash_alg: query_hash.as_ref().map(|_| "SHA512"),
            query_hash,
        };

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.credential.secret.as_bytes()),
        )
        .map_err(|e| Error::Signature(format!("failed to encode token: {}", e)))?;

        Ok(SignedRequest {
            headers: vec![(template.header.clone(), format!("{}{}", template.prefix, token))],
            query,
        })
    }
}

/// Query string with parameters sorted by key, then value
///
/// Sender and receiver must hash the same string, so insertion order of the
/// caller's parameters must not matter.
pub fn canonical_query(pairs: &[(String, String)]) -> String {
    let mut sorted = pairs.to_vec();
    sorted.sort();
    encode_query(&sorted)
}

fn render_timestamp(timestamp_ms: i64, format: TimestampFormat) -> Result<String> {
    match format {
        TimestampFormat::EpochMillis => Ok(timestamp_ms.to_string()),
        TimestampFormat::Iso8601Millis => DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
            .ok_or_else(|| Error::Signature(format!("timestamp out of range: {}", timestamp_ms))),
    }
}
