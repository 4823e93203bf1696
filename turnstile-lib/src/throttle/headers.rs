//! Handle the `Retry-After` rate limiting header.

use std::time::{Duration, SystemTime};

use http::{HeaderMap, HeaderValue, header};
use thiserror::Error;

/// Backoff applied when a rate-limited response carries no usable
/// `Retry-After` value, 1 second.
pub(crate) const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum RetryAfterParseError {
    #[error("Unable to parse value '{0}'")]
    ValueError(String),

    #[error("Header value contains invalid chars")]
    HeaderValueError,
}

/// Extract the backoff duration a rate-limited response asks for.
///
/// A missing or unparsable `Retry-After` header falls back to
/// [`DEFAULT_RETRY_AFTER`].
pub(crate) fn retry_after_hint(headers: &HeaderMap) -> Duration {
    headers
        .get(header::RETRY_AFTER)
        .and_then(|value| parse_retry_after(value).ok())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Parse the "Retry-After" header as specified per
/// [RFC 7231 section 7.1.3](https://www.rfc-editor.org/rfc/rfc7231#section-7.1.3)
fn parse_retry_after(value: &HeaderValue) -> Result<Duration, RetryAfterParseError> {
    let value = value
        .to_str()
        .map_err(|_| RetryAfterParseError::HeaderValueError)?;

    // RFC 7231: Retry-After = HTTP-date / delay-seconds
    value.parse::<u64>().map(Duration::from_secs).or_else(|_| {
        httpdate::parse_http_date(value)
            .map(|date| {
                date.duration_since(SystemTime::now())
                    // if date is in the past, we can use ZERO
                    .unwrap_or(Duration::ZERO)
            })
            .map_err(|_| RetryAfterParseError::ValueError(value.into()))
    })
}
