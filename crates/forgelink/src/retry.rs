//! Shared retry executor for provider requests.
//!
//! Every remote call an adapter makes runs through [`RetryPolicy::execute`].
//! Only failures the policy's predicate accepts are retried, which by default
//! means primary rate-limit rejections. Those are refused before the provider
//! does any work, so retrying writes cannot apply them twice.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ConstantBuilder};

use crate::context::CallContext;
use crate::platform::{Op, Result, ScmError, short_error_message};

/// Maximum number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: usize = 5;

/// Fixed delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Decides whether a failed attempt may be retried.
pub type RetryPredicate = Arc<dyn Fn(&ScmError) -> bool + Send + Sync>;

/// Default predicate: primary rate limits only. Secondary (abuse) limits
/// surface immediately.
pub fn is_retryable_rate_limit(err: &ScmError) -> bool {
    matches!(
        err,
        ScmError::RateLimited {
            secondary: false,
            ..
        }
    )
}

/// Retry configuration plus the loop that applies it.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    delay: Duration,
    predicate: RetryPredicate,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Create a policy with the default predicate.
    #[must_use]
    pub fn new(max_retries: usize, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            predicate: Arc::new(is_retryable_rate_limit),
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Replace the retry predicate.
    #[must_use]
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&ScmError) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_retryable(&self, err: &ScmError) -> bool {
        (self.predicate)(err)
    }

    /// The delay schedule: `max_retries` constant delays.
    #[must_use]
    pub fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_retries)
    }

    /// Run `operation` until it succeeds, fails terminally, the schedule runs
    /// out, or the context ends.
    ///
    /// `operation` is invoked at most `max_retries + 1` times and never again
    /// after a terminal outcome. The context is checked before each
    /// invocation and before each sleep; both the invocation and the sleep
    /// race against it.
    pub async fn execute<T, F, Fut>(
        &self,
        ctx: &CallContext,
        op: &Op,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delays = self.backoff().build();
        let mut attempt = 0usize;

        loop {
            ctx.check()?;
            attempt += 1;

            let err = match ctx.run(operation()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if err.is_cancellation() || !self.is_retryable(&err) {
                if let ScmError::RateLimited {
                    secondary: true, ..
                } = &err
                {
                    tracing::warn!(
                        "Secondary rate limit on {} {}, not retrying: {}",
                        op.name,
                        op.resource,
                        short_error_message(&err)
                    );
                }
                return Err(err);
            }

            let Some(delay) = delays.next() else {
                tracing::warn!(
                    "Giving up on {} {} after {} attempts: {}",
                    op.name,
                    op.resource,
                    attempt,
                    short_error_message(&err)
                );
                return Err(err);
            };

            tracing::debug!(
                "Rate limited on {} {}, retrying in {:?} (attempt {}): {}",
                op.name,
                op.resource,
                delay,
                attempt,
                short_error_message(&err)
            );

            ctx.check()?;
            ctx.sleep(delay).await?;
        }
    }
}
