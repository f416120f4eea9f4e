//! Bounded poll-until-condition primitive.
//!
//! Waiting on an asynchronous external artifact (a save dialog, a status
//! bar) is a fixed number of attempts, each bounded by a timeout, with the
//! condition probed at a fixed interval inside an attempt. The condition is
//! supplied by the caller, so the wait logic is testable on a paused clock.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, warn};

/// Future returned by a poll probe
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'a>>;

/// Attempt/timeout policy for [`poll_until`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Number of attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Time budget for one attempt
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_seconds: u64,

    /// Pause between probes inside an attempt
    #[serde(default = "default_probe_interval")]
    pub probe_interval_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_attempt_timeout() -> u64 {
    30
}
fn default_probe_interval() -> u64 {
    1000
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout_seconds: default_attempt_timeout(),
            probe_interval_ms: default_probe_interval(),
        }
    }
}

impl PollPolicy {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_seconds)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    /// Upper bound on the whole wait
    pub fn total_budget(&self) -> Duration {
        self.attempt_timeout() * self.max_attempts.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("Condition not met after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Probe `target` until the condition holds.
///
/// Returns the 1-based attempt on which the condition was met. A probe
/// error is logged and ends the current attempt; a probe that hangs is cut
/// off at the attempt deadline.
pub async fn poll_until<T, F>(
    policy: &PollPolicy,
    target: &mut T,
    mut probe: F,
) -> Result<u32, PollError>
where
    T: ?Sized,
    F: for<'a> FnMut(&'a mut T) -> ProbeFuture<'a>,
{
    let attempts = policy.max_attempts.max(1);
    let interval = policy.probe_interval();

    for attempt in 1..=attempts {
        let deadline = Instant::now() + policy.attempt_timeout();

        loop {
            match timeout_at(deadline, probe(target)).await {
                Ok(Ok(true)) => {
                    debug!(attempt, "Poll condition met");
                    return Ok(attempt);
                }
                Ok(Ok(false)) => {}
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "Poll probe failed");
                    sleep(interval).await;
                    break;
                }
                Err(_) => break,
            }

            let next = Instant::now() + interval;
            if next >= deadline {
                tokio::time::sleep_until(deadline).await;
                break;
            }
            tokio::time::sleep_until(next).await;
        }

        debug!(attempt, max_attempts = attempts, "Poll attempt timed out");
    }

    Err(PollError::Exhausted { attempts })
}
