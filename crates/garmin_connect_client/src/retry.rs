use crate::GarminError;
use std::time::Duration;

/// What a remote call amounted to once retries are exhausted.
#[derive(Debug, PartialEq)]
pub enum CallOutcome<T> {
    Success(T),
    /// Still rate limited after the last attempt.
    RateLimited,
    /// Any other error; the message has already been reported.
    Failed(String),
}

impl<T> CallOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            CallOutcome::Success(v) => Some(v),
            CallOutcome::RateLimited | CallOutcome::Failed(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }
}

/// Bounded retry with linear backoff, applied only to rate-limit errors.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Run `f`, sleeping `backoff * attempt` after each rate-limited attempt.
    ///
    /// Never returns an error: every failure is logged and folded into the
    /// returned [`CallOutcome`].
    pub async fn call<F, Fut, T>(&self, label: &str, mut f: F) -> CallOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, GarminError>>,
    {
        let mut attempt = 0u32;
        while attempt < self.max_attempts {
            attempt += 1;
            metrics::counter!("garmin_api_calls_total").increment(1);
            match f().await {
                Ok(v) => return CallOutcome::Success(v),
                Err(GarminError::RateLimited(_)) => {
                    metrics::counter!("garmin_api_rate_limited_total").increment(1);
                    if attempt == self.max_attempts {
                        break;
                    }
                    let wait = self.backoff * attempt;
                    tracing::warn!(call = label, attempt, "rate limited, waiting {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
                Err(GarminError::NoContent) => {
                    tracing::debug!(call = label, "no content");
                    return CallOutcome::Failed(GarminError::NoContent.to_string());
                }
                Err(e) => {
                    metrics::counter!("garmin_api_failures_total").increment(1);
                    tracing::warn!(call = label, "{}", e);
                    return CallOutcome::Failed(e.to_string());
                }
            }
        }
        tracing::warn!(call = label, "giving up after {} attempts", self.max_attempts);
        CallOutcome::RateLimited
    }
}
