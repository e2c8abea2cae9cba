//! Full-jitter exponential backoff and the retry loops built on it.
//!
//! The envelope starts at `initial` and is multiplied by `multiplier` after
//! every pause, saturating at `max`. Each pause is drawn uniformly from
//! `[1ns, envelope]`.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, ErrorKind, Result};

/// Default first envelope.
pub const DEFAULT_INITIAL: Duration = Duration::from_secs(1);
/// Default envelope growth per pause.
pub const DEFAULT_MULTIPLIER: f64 = 2.0;
/// Default envelope ceiling.
pub const DEFAULT_MAX: Duration = Duration::from_secs(30);

const MIN_PAUSE: Duration = Duration::from_nanos(1);

/// Full-jitter exponential backoff state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial: Duration,
    multiplier: f64,
    max: Duration,
    envelope: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL,
            multiplier: DEFAULT_MULTIPLIER,
            max: DEFAULT_MAX,
            envelope: DEFAULT_INITIAL,
        }
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the first envelope and restart from it.
    pub fn with_initial(mut self, initial: Duration) -> Self {
        self.initial = initial.max(MIN_PAUSE);
        self.reset();
        self
    }

    /// Set the growth factor. Values below 1 (and NaN) are treated as 1.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier.is_nan() {
            1.0
        } else {
            multiplier.max(1.0)
        };
        self
    }

    /// Set the envelope ceiling.
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max.max(MIN_PAUSE);
        self.reset();
        self
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Upper bound of the next pause.
    pub fn envelope(&self) -> Duration {
        self.envelope
    }

    /// Return to the initial envelope.
    pub fn reset(&mut self) {
        self.envelope = self.initial.min(self.max);
    }

    /// Draw the next pause and grow the envelope.
    pub fn pause(&mut self) -> Duration {
        let upper = self.envelope.as_nanos().clamp(1, u64::MAX as u128) as u64;
        let pause = Duration::from_nanos(rand::rng().random_range(1..=upper));

        let grown = self.envelope.as_secs_f64() * self.multiplier;
        self.envelope = if grown >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(grown)
        };

        pause
    }
}

/// Call `f` until it asks to stop or fails, sleeping between calls.
///
/// `f` returns `Ok(true)` to stop. The backoff starts from its initial
/// envelope on every invocation and is never reset within one.
pub async fn retry<F, Fut, E>(mut backoff: Backoff, mut f: F) -> std::result::Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<bool, E>>,
{
    backoff.reset();
    loop {
        if f().await? {
            return Ok(());
        }
        let pause = backoff.pause();
        debug!(pause_ms = pause.as_millis() as u64, "Backing off");
        tokio::time::sleep(pause).await;
    }
}

/// Like [`retry`], but every sleep can be cut short by `token`.
pub async fn retry_with_cancel<F, Fut, E>(
    token: &CancellationToken,
    mut backoff: Backoff,
    mut f: F,
) -> std::result::Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<bool, E>>,
    E: From<Error>,
{
    backoff.reset();
    loop {
        if f().await? {
            return Ok(());
        }
        let pause = backoff.pause();
        debug!(pause_ms = pause.as_millis() as u64, "Backing off");
        sleep_with_cancel(token, pause).await?;
    }
}

/// Sleep for `duration` unless `token` fires first.
///
/// Cancellation wins a tie with the timer.
pub async fn sleep_with_cancel(token: &CancellationToken, duration: Duration) -> Result<()> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::new(ErrorKind::Cancelled)),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
