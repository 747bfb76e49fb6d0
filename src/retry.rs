use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::RetryPolicy;
use crate::error::{ReportError, Result};

/// The only suspension point of a run: backoff between HTTP attempts and the
/// wait between export polls both go through here.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = Result<()>> + Send;
}

/// Real sleeper backed by `tokio::time::sleep`, aborted by the cancellation token.
#[derive(Clone, Debug, Default)]
pub struct TokioSleeper {
    cancel: CancellationToken,
}

impl TokioSleeper {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ReportError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

impl RetryPolicy {
    /// `base_delay * 2^attempt`, `attempt` counted from zero.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Whether a failure on `attempt` (zero-based) leaves another try.
    pub fn has_attempt_after(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

/// Parse a `Retry-After` header given in whole seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
