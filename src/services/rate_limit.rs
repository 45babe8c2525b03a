//! Minimum-interval spacing and capped linear-backoff retry around a single
//! external HTTP call.
//!
//! Each external endpoint class (profile lookup, art generation) owns one
//! `RateLimitedClient` instance; the two never block each other. Calls
//! through one instance are serialized: the limiter state sits behind a
//! `tokio::sync::Mutex`, which queues waiters in FIFO order, so concurrent
//! callers are spaced one at a time in submission order and no two calls can
//! observe a stale `last_request` stamp.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Classifies an adapter error as a remote throttle (HTTP 429 or
/// equivalent). Only those errors are retried; everything else propagates
/// on the first failure.
pub trait RetryClass {
    fn is_rate_limited(&self) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError<E> {
    /// The remote kept throttling after every allowed retry.
    #[error("rate limit exceeded after {attempts} retries")]
    Exhausted { attempts: u32 },

    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct LimiterState {
    last_request: Option<Instant>,
}

/// Wrapper enforcing a minimum inter-request interval and bounded
/// retry-with-backoff around one endpoint class.
#[derive(Debug)]
pub struct RateLimitedClient {
    state: Mutex<LimiterState>,
    min_interval: Duration,
    max_retries: u32,
}

impl RateLimitedClient {
    pub fn new(min_interval: Duration, max_retries: u32) -> Self {
        Self {
            state: Mutex::new(LimiterState { last_request: None }),
            min_interval,
            max_retries,
        }
    }

    /// Run `call` with interval spacing and throttle retries.
    ///
    /// Holds the limiter lock for the whole invocation, including backoff
    /// sleeps, so the remote service never sees interleaved calls from this
    /// client. Backoff schedule is linear: `min_interval * attempt`.
    pub async fn invoke<T, E, F, Fut>(&self, mut call: F) -> Result<T, RateLimitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryClass,
    {
        let mut state = self.state.lock().await;
        let mut attempt: u32 = 0;

        loop {
            if let Some(last) = state.last_request {
                let elapsed = last.elapsed();
                if elapsed < self.min_interval {
                    sleep(self.min_interval - elapsed).await;
                }
            }
            state.last_request = Some(Instant::now());

            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limited() => {
                    if attempt >= self.max_retries {
                        return Err(RateLimitError::Exhausted { attempts: attempt });
                    }
                    attempt += 1;
                    tracing::warn!(attempt, "remote throttled request, backing off");
                    sleep(self.min_interval * attempt).await;
                }
                Err(e) => return Err(RateLimitError::Inner(e)),
            }
        }
    }
}
