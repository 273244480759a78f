//! Language model access with retry and backoff.
//!
//! - [`AskAsync`]: one prompt in, one response out
//! - [`AskFnWrapper`]: adapts `awful_aj::api::ask` to [`AskAsync`]
//! - [`RetryAsk`]: decorator retrying any [`AskAsync`] with exponential backoff
//!
//! The delay before retry `n` is `min(base * 2^(n-1), max) + jitter(0..=250ms)`.

use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

const MAX_RETRIES: usize = 4;
const BASE_DELAY: StdDuration = StdDuration::from_secs(2);
const MAX_DELAY: StdDuration = StdDuration::from_secs(30);
const MAX_JITTER_MS: u64 = 250;

/// Async prompt/response interaction with a language model.
pub trait AskAsync {
    type Response;

    async fn ask(&self, prompt: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Retries the wrapped client until it succeeds or `max_retries` is exceeded.
pub struct RetryAsk<T> {
    inner: T,
    /// Which pipeline step is asking; only used for logs.
    label: &'static str,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, label: &'static str, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            label,
            max_retries,
            base_delay,
            max_delay: MAX_DELAY,
        }
    }

    /// Delay before the given retry (1-based), without jitter.
    fn backoff(&self, retry: usize) -> StdDuration {
        let exponent = u32::try_from(retry.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        self.base_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("label", &self.label)
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all, fields(label = self.label))]
    async fn ask(&self, prompt: &str) -> Result<Self::Response, Box<dyn Error>> {
        let started = Instant::now();
        let mut retry = 0usize;

        loop {
            let e = match self.inner.ask(prompt).await {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };
            retry += 1;
            let elapsed_ms = started.elapsed().as_millis();

            if retry > self.max_retries {
                error!(
                    label = self.label,
                    attempts = retry,
                    elapsed_ms,
                    error = %e,
                    "Model call exhausted retries"
                );
                return Err(e);
            }

            let jitter_ms: u64 = rng().random_range(0..=MAX_JITTER_MS);
            let delay = self.backoff(retry) + StdDuration::from_millis(jitter_ms);
            warn!(
                label = self.label,
                retry,
                max = self.max_retries,
                elapsed_ms,
                ?delay,
                error = %e,
                "Model call failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

/// [`AskAsync`] over an awful_aj configuration and chat template.
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    pub config: &'a AwfulJadeConfig,
    pub template: &'a ChatTemplate,
}

impl AskAsync for AskFnWrapper<'_> {
    type Response = String;

    async fn ask(&self, prompt: &str) -> Result<Self::Response, Box<dyn Error>> {
        ask(self.config, prompt.to_string(), self.template, None, None).await
    }
}

/// Send a prompt through the configured template, retrying transient failures.
#[instrument(level = "info", skip(config, prompt, template))]
pub async fn ask_with_backoff(
    label: &'static str,
    config: &AwfulJadeConfig,
    prompt: &str,
    template: &ChatTemplate,
) -> Result<String, Box<dyn Error>> {
    let started = Instant::now();
    let client = RetryAsk::new(AskFnWrapper { config, template }, label, MAX_RETRIES, BASE_DELAY);
    let res = client.ask(prompt).await;

    let elapsed_ms = started.elapsed().as_millis();
    match &res {
        Ok(text) => info!(elapsed_ms, bytes = text.len(), "Model responded"),
        Err(e) => error!(elapsed_ms, error = %e, "Model call failed"),
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl AskAsync for Flaky {
        type Response = String;

        async fn ask(&self, prompt: &str) -> Result<String, Box<dyn Error>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err("503 Service Unavailable".into())
            } else {
                Ok(format!("echo: {prompt}"))
            }
        }
    }

    fn flaky(failures: usize) -> Flaky {
        Flaky {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let client = RetryAsk::new(flaky(2), "test", 3, StdDuration::from_millis(10));
        let resp = client.ask("hallo").await.unwrap();
        assert_eq!(resp, "echo: hallo");
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let client = RetryAsk::new(flaky(10), "test", 2, StdDuration::from_millis(10));
        assert!(client.ask("hallo").await.is_err());
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let client = RetryAsk::new(flaky(0), "test", 5, StdDuration::from_secs(2));
        assert_eq!(client.backoff(1), StdDuration::from_secs(2));
        assert_eq!(client.backoff(2), StdDuration::from_secs(4));
        assert_eq!(client.backoff(4), StdDuration::from_secs(16));
        assert_eq!(client.backoff(5), MAX_DELAY);
        assert_eq!(client.backoff(60), MAX_DELAY);
    }
}
