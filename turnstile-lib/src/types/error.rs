use http::StatusCode;
use thiserror::Error;
use url::Url;

/// Possible errors when interacting with `turnstile_lib`.
///
/// Two failure modes deliberately never show up here: a transport-level
/// failure resolves to an absent document (`Ok(None)`) rather than an error,
/// and a `429 Too Many Requests` response is handled transparently by the
/// backoff loop.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The underlying HTTP client could not be built
    #[error("Failed to build the request client")]
    BuildRequestClient(#[source] reqwest::Error),
    /// The given string can not be parsed into a valid URL
    #[error("Cannot parse {0} as request URL: ({1})")]
    InvalidUrl(String, url::ParseError),
    /// The given header could not be parsed.
    /// A possible error when converting a `HeaderValue` from a string or byte
    /// slice.
    #[error("Header could not be parsed.")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
    /// The rate limit must allow at least one request per window
    #[error("Rate limit must be at least 1")]
    ZeroRateLimit,
    /// The rate window period must be non-zero
    #[error("Rate period must not be zero")]
    ZeroRatePeriod,
    /// The concurrency capacity must allow at least one in-flight request
    #[error("Concurrency capacity must be at least 1")]
    ZeroCapacity,
    /// The endpoint answered with an unexpected status code.
    /// Rate-limit responses (`429`) are retried instead and never surface
    /// through this variant.
    #[error("Rejected status code {0} for {1}")]
    RejectedStatusCode(StatusCode, Url),
    /// The endpoint kept answering with `429 Too Many Requests` and the
    /// backoff loop gave up
    #[error("Gave up on {1} after {0} rate-limited attempts")]
    TooManyRetries(u64, Url),
    /// The response body could not be read or decoded as JSON
    #[error("Failed to decode response body")]
    ReadResponseBody(#[source] reqwest::Error),
    /// The client has been closed; no further requests can be issued
    #[error("Client is closed")]
    ClientClosed,
}
