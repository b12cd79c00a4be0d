//! HTTP-to-ProviderError classification shared by the provider clients.

use reqwest::StatusCode;

use crate::domain::ports::ProviderError;

/// Create a [`ProviderError`] from an HTTP status code and response body.
///
/// Status mapping:
/// - 400: Invalid request
/// - 401, 403: Authentication failed
/// - 429: Rate limit exceeded, or quota exhausted when the body says so
/// - 529: Server overloaded
/// - Any other 5xx: Server error
/// - Anything else: Unknown error
pub fn from_status(provider: &str, status: StatusCode, body: String) -> ProviderError {
    let provider = provider.to_string();
    match status.as_u16() {
        400 => ProviderError::InvalidRequest {
            provider,
            message: body,
        },
        401 | 403 => ProviderError::AuthenticationFailed { provider },
        429 => {
            // Backends signal an exhausted budget on the same status code
            // as throttling; the body disambiguates.
            if body.contains("insufficient_quota") || body.contains("quota") {
                ProviderError::QuotaExhausted { provider }
            } else {
                ProviderError::RateLimitExceeded { provider }
            }
        }
        529 => ProviderError::Overloaded { provider },
        status_code if (500..=599).contains(&status_code) => ProviderError::ServerError {
            provider,
            status: status_code,
            message: body,
        },
        status_code => ProviderError::Unknown {
            provider,
            status: status_code,
            message: body,
        },
    }
}

/// Wrap a transport failure, distinguishing timeouts from other network
/// problems.
pub fn from_transport(provider: &str, err: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
            seconds: timeout_secs,
        }
    } else {
        ProviderError::Network {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}
