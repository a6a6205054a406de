//! HTTP plumbing shared by every transport: client construction and the
//! status-code → `ProviderError` mapping.

use parley_core::error::ProviderError;
use std::time::Duration;
use tracing::warn;

/// Build a client with the given overall request timeout.
pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client")
}

/// Map a transport-level failure.
pub(crate) fn send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Pass a 2xx response through; turn anything else into a `ProviderError`.
///
/// The error body is kept verbatim because the retry classifier reads it
/// ("Request too large", "maximum context length", "retry after N seconds").
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }

    let retry_after_secs = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    warn!(provider, status, body = %body, "Provider returned error");

    Err(match status {
        429 => ProviderError::RateLimited {
            retry_after_secs,
            message: body,
        },
        401 | 403 => ProviderError::AuthenticationFailed(format!(
            "{provider} rejected the API key (status {status}): {body}"
        )),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    })
}

/// Parse a JSON body, mapping failures to `InvalidResponse`.
pub(crate) async fn parse_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    response
        .json()
        .await
        .map_err(|e| ProviderError::InvalidResponse(format!("{provider}: {e}")))
}
