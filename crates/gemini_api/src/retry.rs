use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::ErrorPayload;

/// Maximum retry attempts after an initial request attempt.
pub const MAX_RETRIES: u32 = 3;
/// Base delay before the first retry.
pub const BASE_DELAY_MS: u64 = 1000;

/// Google RPC `error.status` values that describe a transient condition.
///
/// `RESOURCE_EXHAUSTED` is quota or rate limiting, `UNAVAILABLE` an overloaded
/// or restarting backend, `DEADLINE_EXCEEDED` a server-side timeout, and
/// `INTERNAL` a generation failure that usually succeeds on a second try.
pub const RETRYABLE_GOOGLE_STATUSES: &[&str] = &[
    "RESOURCE_EXHAUSTED",
    "UNAVAILABLE",
    "DEADLINE_EXCEEDED",
    "INTERNAL",
];

// Bodies that are not a Google error envelope (proxies, load balancers).
fn retryable_text_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|overloaded|try again later|connection.?refused")
            .expect("retry regex must compile")
    })
}

/// Extracts `error.status` from a Gemini error body, if the body is one.
pub fn google_status(error_text: &str) -> Option<String> {
    let payload: ErrorPayload = serde_json::from_str(error_text).ok()?;
    payload.value?.status.filter(|status| !status.trim().is_empty())
}

/// Retry policy for a failed `generateContent` response.
///
/// Retries on transient HTTP statuses, on a transient Google RPC status in the
/// JSON error envelope, and on plain-text bodies that read like an overload.
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    if matches!(status, 429 | 500 | 502 | 503 | 504) {
        return true;
    }

    match google_status(error_text) {
        Some(google_status) => RETRYABLE_GOOGLE_STATUSES.contains(&google_status.as_str()),
        None => retryable_text_regex().is_match(error_text),
    }
}

/// Compute exponential backoff delay for a retry attempt.
pub fn retry_delay_ms(attempt: u32) -> Duration {
    let exponent = attempt.min(30);
    Duration::from_millis(BASE_DELAY_MS * 2u64.saturating_pow(exponent))
}
