use std::time::Duration;

use crate::error::{ScenecastError, ScenecastResult};

/// Bounded exponential backoff for one external call. `attempts` counts the
/// first try; the delay doubles after every failure.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub call_timeout: Duration,
}

impl RetryPolicy {
    pub fn delay_before(&self, attempt: u32) -> Duration {
        debug_assert!(attempt >= 1);
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `op` under the policy. Only transient errors are retried; a fatal
/// error aborts immediately. A call exceeding the hard timeout counts as a
/// transient failure, escalating once the budget is spent.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> ScenecastResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ScenecastResult<T>>,
{
    let mut last_err = None;
    for attempt in 1..=policy.attempts {
        if attempt > 1 {
            tokio::time::sleep(policy.delay_before(attempt - 1)).await;
        }

        let result = match tokio::time::timeout(policy.call_timeout, op()).await {
            Ok(r) => r,
            Err(_) => Err(ScenecastError::provider_transient(format!(
                "{label} timed out after {:?}",
                policy.call_timeout
            ))),
        };

        match result {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < policy.attempts => {
                tracing::warn!(call = label, attempt, error = %e, "transient failure, retrying");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    // Unreachable for attempts >= 1, but keep the compiler honest.
    Err(last_err.unwrap_or_else(|| {
        ScenecastError::provider_fatal(format!("{label} failed with no attempts made"))
    }))
}
