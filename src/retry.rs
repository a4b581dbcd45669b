//! Bounded retry with exponential backoff
//!
//! Every request the workload makes goes through [`RetryingExecutor`]. Network
//! faults, status 0 and 5xx responses are retried; any other status, 4xx
//! included, is handed straight back to the caller. A request the harness
//! could not build fails on the spot.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::error::TransportError;
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// Default attempt budget per request
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the second attempt; doubles after every retryable failure
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(200);

/// What to hand back once every attempt failed with a retryable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// The last response obtained, if any (reads and idempotent updates).
    ReturnLast,
    /// No response at all, so a stale write result is never acted upon.
    Sentinel,
}

impl Exhaustion {
    pub fn for_method(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Post => Self::Sentinel,
            HttpMethod::Get | HttpMethod::Put => Self::ReturnLast,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptClass {
    /// A usable response; stop here.
    Terminal,
    /// Transport fault, status 0 or 5xx.
    Retryable,
    /// The request could not be issued at all; repeating it cannot help.
    Fatal,
}

/// Classify the outcome of a single attempt.
pub fn classify(outcome: &Result<HttpResponse, TransportError>) -> AttemptClass {
    match outcome {
        Ok(response) if response.status == 0 || response.status >= 500 => AttemptClass::Retryable,
        Ok(_) => AttemptClass::Terminal,
        Err(TransportError::Network(_)) => AttemptClass::Retryable,
        Err(TransportError::Harness(_)) => AttemptClass::Fatal,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Sleep inserted after failed attempt `attempt` (1-based):
    /// `initial_backoff * 2^(attempt - 1)`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

/// Result of one logical request, after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResult {
    /// A terminal (non-retryable) response was obtained.
    pub succeeded: bool,
    pub status: Option<u16>,
    pub body: Option<String>,
    pub attempts: u32,
}

impl AttemptResult {
    /// `true` when a terminal response with exactly this status came back.
    pub fn is_status(&self, status: u16) -> bool {
        self.succeeded && self.status == Some(status)
    }

    pub fn body_str(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryingExecutor {
    policy: RetryPolicy,
}

impl RetryingExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Issue `request`, retrying with exponential backoff, using the
    /// exhaustion policy that matches its verb.
    pub async fn execute<T>(&self, transport: &mut T, request: &HttpRequest) -> AttemptResult
    where
        T: Transport + ?Sized,
    {
        self.execute_with(transport, request, Exhaustion::for_method(request.method))
            .await
    }

    pub async fn execute_with<T>(
        &self,
        transport: &mut T,
        request: &HttpRequest,
        exhaustion: Exhaustion,
    ) -> AttemptResult
    where
        T: Transport + ?Sized,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last: Option<HttpResponse> = None;

        for attempt in 1..=max_attempts {
            let outcome = transport.send(request).await;
            let class = classify(&outcome);

            if class == AttemptClass::Fatal {
                if let Err(e) = &outcome {
                    error!(
                        "[{} attempt {}] {} at {}",
                        request.method.as_str(),
                        attempt,
                        e,
                        request.path
                    );
                }
                return AttemptResult {
                    succeeded: false,
                    status: None,
                    body: None,
                    attempts: attempt,
                };
            }

            if class == AttemptClass::Terminal {
                if attempt > 1 {
                    debug!(name = request.name, attempt, "request recovered after retry");
                }
                let response = outcome.ok();
                return AttemptResult {
                    succeeded: true,
                    status: response.as_ref().map(|r| r.status),
                    body: response.map(|r| r.body),
                    attempts: attempt,
                };
            }

            match outcome {
                Ok(response) => {
                    warn!(
                        "[{} attempt {}] status={} at {}",
                        request.method.as_str(),
                        attempt,
                        response.status,
                        request.path
                    );
                    last = Some(response);
                }
                Err(e) => {
                    warn!(
                        "[{} attempt {}] {} at {}",
                        request.method.as_str(),
                        attempt,
                        e,
                        request.path
                    );
                }
            }

            if attempt < max_attempts {
                sleep(self.policy.backoff_after(attempt)).await;
            }
        }

        error!(
            "{} failed after {} attempts: {}",
            request.method.as_str(),
            max_attempts,
            request.path
        );

        match exhaustion {
            Exhaustion::ReturnLast => AttemptResult {
                succeeded: false,
                status: last.as_ref().map(|r| r.status),
                body: last.map(|r| r.body),
                attempts: max_attempts,
            },
            Exhaustion::Sentinel => AttemptResult {
                succeeded: false,
                status: None,
                body: None,
                attempts: max_attempts,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            body: String::new(),
        })
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify(&response(0)), AttemptClass::Retryable);
        assert_eq!(classify(&response(200)), AttemptClass::Terminal);
        assert_eq!(classify(&response(404)), AttemptClass::Terminal);
        assert_eq!(classify(&response(499)), AttemptClass::Terminal);
        assert_eq!(classify(&response(500)), AttemptClass::Retryable);
        assert_eq!(classify(&response(503)), AttemptClass::Retryable);
        assert_eq!(
            classify(&Err(TransportError::Network("timeout".into()))),
            AttemptClass::Retryable
        );
        assert_eq!(
            classify(&Err(TransportError::Harness("bad url".into()))),
            AttemptClass::Fatal
        );
    }

    #[test]
    fn backoff_doubles_from_initial() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_after(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(800));
    }

    #[test]
    fn writes_use_sentinel_on_exhaustion() {
        assert_eq!(Exhaustion::for_method(HttpMethod::Post), Exhaustion::Sentinel);
        assert_eq!(Exhaustion::for_method(HttpMethod::Get), Exhaustion::ReturnLast);
        assert_eq!(Exhaustion::for_method(HttpMethod::Put), Exhaustion::ReturnLast);
    }
}
