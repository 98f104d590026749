//! API credential domain model

use std::collections::HashMap;
use std::fmt;

use super::result::{Error, Result};

/// Exchange API credential
///
/// Owned by the signer for the lifetime of a scan. `Debug` never prints
/// the secret material.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub key_id: String,
    pub secret: String,
    pub passphrase: Option<String>,
}

impl Credential {
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Build a credential from parsed `KEY=VALUE` pairs.
    ///
    /// Exchange-prefixed keys (`BYBIT_API_KEY`) take precedence over the
    /// generic ones (`API_KEY`). Placeholder values count as missing.
    pub fn from_key_values(values: &HashMap<String, String>, prefix: &str) -> Result<Self> {
        let lookup = |name: &str| -> Option<String> {
            let prefixed = format!("{}_{}", prefix.to_uppercase(), name);
            values
                .get(&prefixed)
                .or_else(|| values.get(name))
                .map(|v| v.trim().to_string())
                .filter(|v| !is_placeholder(v))
        };

        let key_id = lookup("API_KEY")
            .ok_or_else(|| Error::config(format!("API_KEY is missing for {}", prefix)))?;
        let secret = lookup("API_SECRET")
            .ok_or_else(|| Error::config(format!("API_SECRET is missing for {}", prefix)))?;

        Ok(Self {
            key_id,
            secret,
            passphrase: lookup("PASSPHRASE"),
        })
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key_id", &"<redacted>")
            .field("secret", &"<redacted>")
            .field(
                "passphrase",
                &self.passphrase.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Parse a `KEY=VALUE` credentials file body
///
/// Blank lines and `#` comments are skipped; surrounding quotes are removed.
pub fn parse_key_values(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| {
            let v = v.trim();
            let v = v
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .or_else(|| v.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
                .unwrap_or(v);
            (k.trim().to_string(), v.to_string())
        })
        .collect()
}

/// Whether a credential value is empty or an unfilled template value
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    if v.is_empty() {
        return true;
    }
    let upper = v.to_uppercase();
    upper.starts_with("YOUR_")
        || upper == "CHANGEME"
        || (v.starts_with('<') && v.ends_with('>'))
        || v.chars().all(|c| c == 'x' || c == 'X')
}
