//! Blocking reqwest transport
//!
//! Sends exactly one HTTP request per call. The query string is appended in
//! the order the signer saw it, so the signed and sent strings never differ.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::domain::result::{Error, Result};
use crate::ports::{encode_query, HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(Error::config("Base URL cannot be empty"));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("addrscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &HttpRequest) -> String {
        let query = encode_query(&request.query);
        if query.is_empty() {
            format!("{}{}", self.base_url, request.path)
        } else {
            format!("{}{}?{}", self.base_url, request.path, query)
        }
    }

    /// Map request errors to transport errors
    fn map_request_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(format!("no response after {} seconds", self.timeout.as_secs()))
        } else if error.is_connect() {
            TransportError::Connect(format!("unable to connect to {}", self.base_url))
        } else {
            TransportError::Other(format!("request failed: {}", error))
        }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let url = self.url_for(request);

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder
                .header("Content-Type", "application/json")
                .body(body.clone());
        }

        let response = builder.send().map_err(|e| self.map_request_error(e))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().map_err(|e| self.map_request_error(e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
