//! Signed exchange client
//!
//! One logical call = rate-limit token + fresh timestamp/nonce + signature +
//! transport + envelope interpretation, repeated under the backoff controller
//! until it resolves. A retry never reuses a previous attempt's signature.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::ports::{
    ApiCall, ApiResponse, Clock, ExchangeProfile, HttpRequest, Transport, TransportError,
};
use crate::services::backoff::{BackoffController, RetryPolicy};
use crate::services::rate_limit::RateLimiter;
use crate::services::signer::{SignInput, Signer};

pub struct SignedClient {
    profile: Arc<dyn ExchangeProfile>,
    signer: Signer,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    backoff: BackoffController,
    limiter: Arc<RateLimiter>,
}

impl SignedClient {
    pub fn new(
        profile: Arc<dyn ExchangeProfile>,
        signer: Signer,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            backoff: BackoffController::new(policy, clock.clone()),
            profile,
            signer,
            transport,
            clock,
            limiter,
        }
    }

    pub fn profile(&self) -> &dyn ExchangeProfile {
        self.profile.as_ref()
    }

    /// Sign and send one physical attempt
    ///
    /// The outer error is a signing failure, the inner one a transport failure.
    pub fn send_once(
        &self,
        call: &ApiCall,
    ) -> Result<std::result::Result<ApiResponse, TransportError>> {
        self.limiter.acquire();

        let timestamp_ms = self.clock.now_ms();
        let nonce = Uuid::new_v4().to_string();
        let signed = self.signer.sign(&SignInput {
            method: call.method,
            path: &call.path,
            query: &call.query,
            body: call.body.as_deref(),
            timestamp_ms,
            nonce: &nonce,
        })?;

        let request = HttpRequest {
            method: call.method,
            path: call.path.clone(),
            query: signed.query,
            body: call.body.clone(),
            headers: signed.headers,
        };

        tracing::debug!(
            exchange = self.profile.name(),
            method = %call.method,
            path = %call.path,
            "Sending request"
        );

        Ok(self
            .transport
            .send(&request)
            .and_then(|response| self.profile.interpret(&response)))
    }

    /// Execute a call to resolution under the retry policy
    pub fn execute(&self, call: &ApiCall) -> Result<ApiResponse> {
        let signing_error: Mutex<Option<Error>> = Mutex::new(None);

        let result = self.backoff.execute_with_retry(
            |_| match self.send_once(call) {
                Ok(outcome) => outcome,
                Err(e) => {
                    let message = e.to_string();
                    *signing_error.lock().unwrap_or_else(|p| p.into_inner()) = Some(e);
                    // Non-transient, so the controller stops immediately
                    Err(TransportError::Other(message))
                }
            },
            self.profile.codes(),
        );

        match signing_error.into_inner().unwrap_or_else(|p| p.into_inner()) {
            Some(err) => Err(err),
            None => result,
        }
    }
}
