// Shared retry policy for rate-limited upstreams.
//
// On a non-success status the caller backs off `attempt * base_delay`
// before trying again. After the budget is exhausted the failure is
// returned as `Unavailable`; callers treat that as "empty" and degrade
// (fall back to the next provider) rather than abort the resolution.

use reqwest::RequestBuilder;
use std::time::Duration;

use crate::error::{ProviderError, ProviderResult};

pub const MAX_ATTEMPTS: u32 = 10;
pub const BASE_DELAY: Duration = Duration::from_secs(2);

/// Send a request, retrying with linear backoff while the upstream
/// throttles or errors. `build` is called once per attempt because a
/// `RequestBuilder` is consumed by `send`.
pub async fn send_with_retry<F>(
    build: F,
    max_attempts: u32,
    base_delay: Duration,
) -> ProviderResult<reqwest::Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_status = None;

    for attempt in 1..=max_attempts {
        match build().send().await {
            Ok(resp) if resp.status().is_success() => return Ok(resp),
            Ok(resp) => {
                last_status = Some(resp.status());
                tracing::warn!(
                    status = %resp.status(),
                    attempt,
                    "upstream returned non-success, backing off"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "upstream request failed, backing off");
            }
        }
        if attempt < max_attempts {
            tokio::time::sleep(base_delay * attempt).await;
        }
    }

    match last_status {
        Some(status) if status == reqwest::StatusCode::TOO_MANY_REQUESTS => {
            Err(ProviderError::RateLimited)
        }
        Some(status) => Err(ProviderError::Unavailable(format!(
            "giving up after {max_attempts} attempts, last status {status}"
        ))),
        None => Err(ProviderError::Unavailable(format!(
            "giving up after {max_attempts} attempts"
        ))),
    }
}
