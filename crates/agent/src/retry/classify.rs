//! Failure classification and wait-time extraction.

use parley_core::error::ProviderError;
use regex_lite::Regex;
use std::time::Duration;

/// How a failed provider call should be handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Retry after `wait`.
    RateLimited { wait: Duration },
    /// Shrink the context window and retry.
    ContextTooLarge,
    /// Give up.
    Fatal,
}

const SIZE_PATTERNS: &[&str] = &[
    "too large",
    "too long",
    "maximum context length",
    "context_length_exceeded",
    "request_too_large",
    "context window",
    "tokens per min",
];

const RATE_PATTERNS: &[&str] = &[
    "429",
    "rate limit",
    "rate_limit",
    "too many requests",
    "quota",
    "resource_exhausted",
    "retry after",
];

/// Shortest wait derived from a limit/requested token pair.
const MIN_TOKEN_WAIT_SECS: u64 = 10;

/// Classify a provider failure.
///
/// Size patterns win over rate patterns: several providers report an
/// oversized request as a 429.
pub fn classify(error: &ProviderError, default_wait: Duration) -> FailureKind {
    let text = match error {
        // The Display prefix carries "HTTP 429"; the body carries the details.
        ProviderError::RateLimited { .. } | ProviderError::ApiError { .. } => error.to_string(),
        _ => return FailureKind::Fatal,
    };

    match classify_text(&text, default_wait) {
        FailureKind::RateLimited { wait } => {
            let hinted = match error {
                ProviderError::RateLimited {
                    retry_after_secs: Some(secs),
                    ..
                } => Duration::from_secs(*secs),
                _ => wait,
            };
            FailureKind::RateLimited { wait: hinted }
        }
        other => other,
    }
}

/// Classify raw failure text.
pub fn classify_text(text: &str, default_wait: Duration) -> FailureKind {
    let lower = text.to_lowercase();

    if is_context_too_large(&lower) {
        return FailureKind::ContextTooLarge;
    }
    if RATE_PATTERNS.iter().any(|p| lower.contains(p)) {
        return FailureKind::RateLimited {
            wait: extract_wait(&lower).unwrap_or(default_wait),
        };
    }
    FailureKind::Fatal
}

fn is_context_too_large(lower: &str) -> bool {
    SIZE_PATTERNS.iter().any(|p| lower.contains(p))
        || (lower.contains("quota")
            && ["token", "size", "input"].iter().any(|p| lower.contains(p)))
}

/// Parse an explicit wait out of failure text.
///
/// Recognizes "retry after N seconds", "wait N seconds", "wait N minutes" and
/// a "Limit L, Requested R" token pair, which maps to
/// `max(10s, (R - L) / 1000 * 6s)`.
pub fn extract_wait(text: &str) -> Option<Duration> {
    let lower = text.to_lowercase();

    if let Some([secs]) = capture_numbers::<1>(r"retry after (\d+) second", &lower) {
        return Some(Duration::from_secs(secs));
    }
    if let Some([secs]) = capture_numbers::<1>(r"wait (\d+) second", &lower) {
        return Some(Duration::from_secs(secs));
    }
    if let Some([mins]) = capture_numbers::<1>(r"wait (\d+) minute", &lower) {
        return Some(Duration::from_secs(mins.saturating_mul(60)));
    }
    if let Some([limit, requested]) =
        capture_numbers::<2>(r"limit (\d+), requested (\d+)", &lower)
    {
        let excess = requested.saturating_sub(limit) as f64;
        let secs = (excess / 1000.0 * 6.0).ceil() as u64;
        return Some(Duration::from_secs(secs.max(MIN_TOKEN_WAIT_SECS)));
    }
    None
}

fn capture_numbers<const N: usize>(pattern: &str, text: &str) -> Option<[u64; N]> {
    let caps = Regex::new(pattern).ok()?.captures(text)?;
    let mut out = [0u64; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = caps.get(i + 1)?.as_str().parse().ok()?;
    }
    Some(out)
}
