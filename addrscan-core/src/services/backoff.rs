//! Backoff controller
//!
//! Decides after every physical attempt whether a logical request is done,
//! should be retried after a delay, or has failed for good.
//!
//! # Response classes
//! ```text
//! success         -> return payload
//! rate-limited    -> wait until server reset (+margin), else exponential, retry
//! clock skew      -> short exponential wait, retry
//! connect/timeout -> exponential wait, retry
//! anything else   -> terminal, no sleep
//! attempts used   -> RetriesExhausted
//! ```
//!
//! The retry loop is an explicit state machine (`AttemptState` + `next_step`)
//! and all waiting goes through the injected `Clock`.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::domain::result::{Error, Result};
use crate::ports::{ApiResponse, Clock, CodeTable, ResponseClass, TransportError};

/// Retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// First exponential delay for throttling and network errors
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Added to a server-supplied reset time
    pub reset_margin: Duration,
    pub min_rate_limit_wait: Duration,
    /// Upper bound for waits derived from a server reset time
    pub max_reset_wait: Duration,
    pub clock_skew_base: Duration,
    pub clock_skew_max: Duration,
    /// Extra random delay, as a fraction of the exponential delay
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(800),
            max_delay: Duration::from_secs(8),
            reset_margin: Duration::from_millis(200),
            min_rate_limit_wait: Duration::from_millis(500),
            max_reset_wait: Duration::from_secs(60),
            clock_skew_base: Duration::from_millis(400),
            clock_skew_max: Duration::from_secs(2),
            jitter_ratio: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn without_jitter(mut self) -> Self {
        self.jitter_ratio = 0.0;
        self
    }

    /// `base * 2^(attempt-1)`, capped at `max`
    fn exponential(base: Duration, attempt: u32, max: Duration) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        base.saturating_mul(factor).min(max)
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        let range_ms = (delay.as_millis() as f64 * self.jitter_ratio) as u64;
        if range_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..range_ms))
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.with_jitter(Self::exponential(self.base_delay, attempt, self.max_delay))
    }

    fn rate_limit_delay(&self, attempt: u32, reset_ms: Option<i64>, now_ms: i64) -> Duration {
        match reset_ms {
            Some(reset) => {
                let until_reset = Duration::from_millis(reset.saturating_sub(now_ms).max(0) as u64);
                (until_reset + self.reset_margin)
                    .max(self.min_rate_limit_wait)
                    .min(self.max_reset_wait)
            }
            None => self.backoff_delay(attempt),
        }
    }

    fn clock_skew_delay(&self, attempt: u32) -> Duration {
        Self::exponential(self.clock_skew_base, attempt, self.clock_skew_max)
    }
}

/// Per-request retry state; dropped once the request resolves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptState {
    /// Physical attempts made so far
    pub attempt: u32,
    pub last_error_code: Option<String>,
    pub next_eligible_ms: Option<i64>,
}

/// What to do after an attempt
#[derive(Debug)]
pub enum Step {
    Done(ApiResponse),
    Retry(Duration),
    Fail(Error),
}

pub struct BackoffController {
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl BackoffController {
    pub fn new(policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Advance the state machine with the outcome of the latest attempt
    pub fn next_step(
        &self,
        state: &mut AttemptState,
        outcome: std::result::Result<ApiResponse, TransportError>,
        codes: &CodeTable,
    ) -> Step {
        let now = self.clock.now_ms();

        let delay = match outcome {
            Ok(response) => match codes.classify(&response) {
                ResponseClass::Success => return Step::Done(response),
                ResponseClass::RateLimited => {
                    state.last_error_code = Some(response_code(&response));
                    self.policy
                        .rate_limit_delay(state.attempt, response.rate_limit_reset_ms, now)
                }
                ResponseClass::ClockSkew => {
                    state.last_error_code = Some(response_code(&response));
                    self.policy.clock_skew_delay(state.attempt)
                }
                ResponseClass::Terminal => {
                    return Step::Fail(Error::Exchange {
                        code: response_code(&response),
                        message: response.error_message.unwrap_or_default(),
                    })
                }
            },
            Err(e) if e.is_transient() => {
                state.last_error_code = Some(e.to_string());
                self.policy.backoff_delay(state.attempt)
            }
            Err(e) => return Step::Fail(Error::Transport(e)),
        };

        if state.attempt >= self.policy.max_attempts {
            return Step::Fail(Error::RetriesExhausted {
                attempts: state.attempt,
                last_code: state.last_error_code.clone(),
            });
        }

        state.next_eligible_ms = Some(now + delay.as_millis() as i64);
        Step::Retry(delay)
    }

    /// Run `request` until it succeeds, fails terminally, or the policy's
    /// attempts are used up
    ///
    /// `request` is invoked once per physical attempt and must build a
    /// freshly signed request each time.
    pub fn execute_with_retry<F>(&self, mut request: F, codes: &CodeTable) -> Result<ApiResponse>
    where
        F: FnMut(&AttemptState) -> std::result::Result<ApiResponse, TransportError>,
    {
        let mut state = AttemptState::default();

        loop {
            state.attempt += 1;
            let outcome = request(&state);

            match self.next_step(&mut state, outcome, codes) {
                Step::Done(response) => {
                    tracing::debug!(attempts = state.attempt, "Request succeeded");
                    return Ok(response);
                }
                Step::Retry(delay) => {
                    tracing::warn!(
                        attempt = state.attempt,
                        code = state.last_error_code.as_deref().unwrap_or(""),
                        delay_ms = delay.as_millis() as u64,
                        "Retriable failure, backing off"
                    );
                    self.clock.sleep(delay);
                }
                Step::Fail(err) => return Err(err),
            }
        }
    }
}

fn response_code(response: &ApiResponse) -> String {
    response
        .error_code
        .clone()
        .unwrap_or_else(|| format!("HTTP {}", response.status_code))
}
