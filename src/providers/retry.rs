use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub(crate) const RATE_LIMIT_MAX_RETRIES: usize = 5;
pub(crate) const RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(2);
pub(crate) const RATE_LIMIT_MAX_DELAY: Duration = Duration::from_secs(60);

pub(crate) async fn send_with_backoff<F>(provider: &str, build: F) -> Result<(StatusCode, String)>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0usize;
    let mut delay = RATE_LIMIT_BASE_DELAY;
    loop {
        attempt += 1;
        let response = build()
            .send()
            .await
            .with_context(|| format!("{} request failed", provider))?;
        let status = response.status();
        let retry_after = retry_after(response.headers());
        let text = response.text().await.unwrap_or_default();
        if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
            delay = wait_with_backoff(provider, attempt, delay, retry_after).await;
            continue;
        }
        return Ok((status, text));
    }
}

pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
        return true;
    }
    if status.is_success() {
        return false;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("overloaded")
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    value.parse::<u64>().ok().map(Duration::from_secs)
}

async fn wait_with_backoff(
    provider: &str,
    attempt: usize,
    delay: Duration,
    retry_after: Option<Duration>,
) -> Duration {
    let wait = retry_after.map_or(delay, |retry_after| retry_after.max(delay));
    warn!(
        "{} rate limited; retrying in {:.1}s (attempt {}/{})",
        provider,
        wait.as_secs_f32(),
        attempt,
        RATE_LIMIT_MAX_RETRIES
    );
    sleep(wait).await;
    next_delay(delay)
}

pub(crate) fn next_delay(current: Duration) -> Duration {
    current
        .saturating_mul(2)
        .max(RATE_LIMIT_BASE_DELAY)
        .min(RATE_LIMIT_MAX_DELAY)
}
