//! Handler of rate-limited API calls.
//!
//! This module defines two structs, [`Client`] and [`ClientBuilder`].
//! `Client` owns the HTTP transport and the throttle state and issues
//! admission-controlled requests. `ClientBuilder` exposes a finer level of
//! granularity for building a `Client`.
//!
//! For convenience, a free function [`fetch`] is provided for ad-hoc calls.
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use http::header::{HeaderMap, HeaderValue};
use reqwest::{Url, header};
use serde_json::Value;
use typed_builder::TypedBuilder;

use crate::fetcher::Fetcher;
use crate::throttle::{ConcurrencyGate, RateWindow, SlidingWindow};
use crate::{ErrorKind, Result};

/// Default number of admissions per rate window, 5.
pub const DEFAULT_RATE_LIMIT: usize = 5;
/// Default length of the rolling rate window, 1 second.
pub const DEFAULT_RATE_PERIOD: Duration = Duration::from_secs(1);
/// Default number of rate-limited retries before giving up, 3.
pub const DEFAULT_MAX_RETRIES: u64 = 3;
/// Default user agent, `turnstile-<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("turnstile/", env!("CARGO_PKG_VERSION"));

// Constants currently not configurable by the user.
/// A timeout for only the connect phase of a Client.
const CONNECT_TIMEOUT: u64 = 10;
/// TCP keepalive
/// See <https://tldp.org/HOWTO/TCP-Keepalive-HOWTO/overview.html> for more info
const TCP_KEEPALIVE: u64 = 60;

/// Builder for [`Client`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(setter(into)))]
pub struct ClientBuilder {
    /// Base URL that every endpoint is fetched relative to,
    /// e.g. `https://api.example.com`.
    base_url: String,

    /// Maximum number of requests *started* within any rolling window of
    /// [`ClientBuilder::rate_period`] length.
    #[builder(default = DEFAULT_RATE_LIMIT)]
    rate_limit: usize,

    /// Length of the rolling rate window.
    #[builder(default = DEFAULT_RATE_PERIOD)]
    rate_period: Duration,

    /// Maximum number of simultaneously in-flight requests.
    ///
    /// Defaults to [`ClientBuilder::rate_limit`] when unset.
    #[builder(default)]
    max_concurrency: Option<usize>,

    /// Maximum number of rate-limited attempts per request before returning
    /// an error.
    #[builder(default = DEFAULT_MAX_RETRIES)]
    max_retries: u64,

    /// User-agent used for requests.
    #[builder(default = String::from(DEFAULT_USER_AGENT))]
    user_agent: String,

    /// Sets the default [headers] for every request.
    ///
    /// This allows working around validation issues on some endpoints.
    ///
    /// [headers]: https://docs.rs/http/latest/http/header/struct.HeaderName.html
    #[builder(default)]
    custom_headers: HeaderMap,

    /// Response timeout per request attempt.
    ///
    /// Off by default; fetch calls have no intrinsic deadline without it.
    #[builder(default)]
    timeout: Option<Duration>,

    /// When `true`, accept invalid SSL certificates.
    ///
    /// ## Warning
    ///
    /// You should think very carefully before using this method. If
    /// invalid certificates are trusted, any certificate for any site
    /// will be trusted for use. This includes expired certificates.
    #[builder(default)]
    allow_insecure: bool,
}

impl ClientBuilder {
    /// Instantiates a [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The base URL is invalid.
    /// - The user-agent is invalid.
    /// - The rate limit, rate period, or concurrency capacity is zero.
    /// - The request client cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn client(self) -> Result<Client> {
        let base_url = Url::parse(&self.base_url)
            .map_err(|e| ErrorKind::InvalidUrl(self.base_url.clone(), e))?;

        let mut headers = self.custom_headers;
        headers.insert(header::USER_AGENT, HeaderValue::from_str(&self.user_agent)?);

        let builder = reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers)
            .danger_accept_invalid_certs(self.allow_insecure)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
            .tcp_keepalive(Duration::from_secs(TCP_KEEPALIVE));

        let reqwest_client = (match self.timeout {
            Some(t) => builder.timeout(t),
            None => builder,
        })
        .build()
        .map_err(ErrorKind::BuildRequestClient)?;

        let limit = NonZeroUsize::new(self.rate_limit).ok_or(ErrorKind::ZeroRateLimit)?;
        let rate = RateWindow::new(limit, self.rate_period)?;

        let capacity = NonZeroUsize::new(self.max_concurrency.unwrap_or(self.rate_limit))
            .ok_or(ErrorKind::ZeroCapacity)?;

        let fetcher = Fetcher::new(
            reqwest_client,
            ConcurrencyGate::new(capacity),
            SlidingWindow::new(rate),
            self.max_retries,
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                base_url,
                fetcher,
                closed: AtomicBool::new(false),
            }),
        })
    }
}

/// Issues admission-controlled requests against one base URL.
///
/// See [`ClientBuilder`] which contains sane defaults for all configuration
/// options.
///
/// A `Client` is cheaply cloneable; clones share the transport, the
/// concurrency gate, and the sliding admission window, so any number of
/// concurrent tasks can fetch through the same instance.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    /// Base URL that endpoints are appended to.
    base_url: Url,

    /// Executes requests through the shared throttle state.
    fetcher: Fetcher,

    /// Once set, every further fetch fails with [`ErrorKind::ClientClosed`].
    closed: AtomicBool,
}

impl Client {
    /// Fetch `endpoint` relative to the base URL and decode the response
    /// body as JSON.
    ///
    /// Returns `Ok(None)` when the transport failed; see
    /// [`Client::fetch_with`] for the full contract.
    ///
    /// # Errors
    ///
    /// See [`Client::fetch_with`].
    pub async fn fetch(&self, endpoint: &str) -> Result<Option<Value>> {
        self.fetch_with(endpoint, &[]).await
    }

    /// Fetch `endpoint` with the given query parameters appended.
    ///
    /// The call suspends until it is admitted: until an in-flight slot is
    /// free *and* the sliding rate window has capacity. Rate-limited
    /// responses (`429`) are retried transparently, honoring the server's
    /// `Retry-After` hint. A transport-level failure resolves to `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if
    /// - the client has been closed,
    /// - the endpoint does not form a valid URL,
    /// - the endpoint answers with a non-2xx status other than `429`,
    /// - the response body cannot be decoded as JSON,
    /// - the endpoint stays rate-limited past the configured retry budget.
    pub async fn fetch_with(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>> {
        if self.is_closed() {
            return Err(ErrorKind::ClientClosed);
        }
        let url = self.endpoint_url(endpoint, params)?;
        self.inner.fetcher.fetch(url).await
    }

    /// Stop issuing requests through this client.
    ///
    /// Closing is idempotent: calling it again is a no-op. Afterwards every
    /// fetch fails with [`ErrorKind::ClientClosed`]. The connections held by
    /// the transport pool are released once the last clone of this client is
    /// dropped.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    /// Returns whether [`Client::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// The number of requests currently past the concurrency gate.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.fetcher.gate().in_flight()
    }

    /// Build the request URL for an endpoint.
    ///
    /// The endpoint is appended to the base URL verbatim (a missing leading
    /// slash is inserted); it is *not* resolved the way `Url::join` would,
    /// so a base path like `/v2` is always preserved.
    fn endpoint_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let raw = if endpoint.starts_with('/') {
            format!("{base}{endpoint}")
        } else {
            format!("{base}/{endpoint}")
        };

        let mut url = Url::parse(&raw).map_err(|e| ErrorKind::InvalidUrl(raw, e))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }
}

/// A convenience function to fetch a single endpoint with default throttling.
///
/// This provides the simplest utility without having to keep a [`Client`]
/// around. For more complex scenarios, see documentation of
/// [`ClientBuilder`] instead.
///
/// # Errors
///
/// Returns an `Err` if:
/// - The client cannot be built (see [`ClientBuilder::client`] for failure
///   cases).
/// - The fetch fails (see [`Client::fetch_with`] for failure cases).
pub async fn fetch(base_url: &str, endpoint: &str) -> Result<Option<Value>> {
    let client = ClientBuilder::builder().base_url(base_url).build().client()?;
    client.fetch(endpoint).await
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use futures::future::join_all;
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::ClientBuilder;
    use crate::{ErrorKind, mock_server};

    fn client(base_url: &str) -> crate::Client {
        ClientBuilder::builder()
            .base_url(base_url)
            .build()
            .client()
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_decoded_document() {
        let mock_server = mock_server!(
            StatusCode::OK,
            set_body_json(json!({ "id": 1, "completed": false }))
        );

        let res = client(&mock_server.uri()).fetch("/todos/1").await.unwrap();
        assert_eq!(res, Some(json!({ "id": 1, "completed": false })));
    }

    #[tokio::test]
    async fn test_query_params_are_appended() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::path("/search"))
            .and(wiremock::matchers::query_param("q", "tortoise"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let res = client(&mock_server.uri())
            .fetch_with("search", &[("q", "tortoise")])
            .await
            .unwrap();
        assert_eq!(res, Some(json!([])));
    }

    #[tokio::test]
    async fn test_rejected_status_code() {
        let mock_server = mock_server!(StatusCode::NOT_FOUND);

        let res = client(&mock_server.uri()).fetch("/missing").await;
        assert!(matches!(
            res,
            Err(ErrorKind::RejectedStatusCode(StatusCode::NOT_FOUND, _))
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_yields_absent() {
        // Grab a free port, then close the listener so connecting fails.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let res = client(&format!("http://{addr}")).fetch("/todos/1").await;
        assert!(matches!(res, Ok(None)));
    }

    #[tokio::test]
    async fn test_window_spreads_admissions() {
        let mock_server = mock_server!(StatusCode::OK, set_body_json(json!({})));
        let client = ClientBuilder::builder()
            .base_url(mock_server.uri())
            .rate_limit(5_usize)
            .rate_period(Duration::from_millis(500))
            .build()
            .client()
            .unwrap();

        let start = Instant::now();
        let results = join_all((0..10).map(|_| {
            let client = client.clone();
            async move { client.fetch("/todos/1").await }
        }))
        .await;
        let elapsed = start.elapsed();

        for res in results {
            assert_eq!(res.unwrap(), Some(json!({})));
        }
        // The first five go out immediately, the second five only after the
        // window has rolled past the first batch.
        assert!(elapsed >= Duration::from_millis(500), "finished in {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1500), "finished in {elapsed:?}");
    }

    #[tokio::test]
    async fn test_retry_honors_retry_after_hint() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(StatusCode::TOO_MANY_REQUESTS)
                    .insert_header("Retry-After", "1"),
            )
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_json(json!({ "id": 1 })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let start = Instant::now();
        let res = client(&mock_server.uri()).fetch("/todos/1").await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(res, Some(json!({ "id": 1 })));
        assert!(elapsed >= Duration::from_secs(1), "retried after {elapsed:?}");
    }

    #[tokio::test]
    async fn test_retry_defaults_to_one_second_without_hint() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(StatusCode::TOO_MANY_REQUESTS)
                    .insert_header("Retry-After", "not-a-number"),
            )
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_json(json!({})))
            .mount(&mock_server)
            .await;

        let start = Instant::now();
        let res = client(&mock_server.uri()).fetch("/todos/1").await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(res, Some(json!({})));
        assert!(elapsed >= Duration::from_secs(1), "retried after {elapsed:?}");
    }

    #[tokio::test]
    async fn test_sustained_rate_limiting_exhausts_retries() {
        // Retry-After of zero keeps the test fast; the retry budget still
        // runs out.
        let mock_server = mock_server!(
            StatusCode::TOO_MANY_REQUESTS,
            insert_header("Retry-After", "0")
        );

        let client = ClientBuilder::builder()
            .base_url(mock_server.uri())
            .max_retries(2_u64)
            .build()
            .client()
            .unwrap();

        let res = client.fetch("/todos/1").await;
        assert!(matches!(res, Err(ErrorKind::TooManyRetries(2, _))));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mock_server = mock_server!(StatusCode::OK, set_body_json(json!({})));
        let client = client(&mock_server.uri());

        assert!(!client.is_closed());
        client.close();
        client.close();
        assert!(client.is_closed());

        let res = client.fetch("/todos/1").await;
        assert!(matches!(res, Err(ErrorKind::ClientClosed)));
    }

    #[tokio::test]
    async fn test_clones_share_closed_state() {
        let mock_server = mock_server!(StatusCode::OK, set_body_json(json!({})));
        let client = client(&mock_server.uri());
        let clone = client.clone();

        client.close();
        let res = clone.fetch("/todos/1").await;
        assert!(matches!(res, Err(ErrorKind::ClientClosed)));
    }

    #[tokio::test]
    async fn test_invalid_base_url() {
        let res = ClientBuilder::builder()
            .base_url("not a url")
            .build()
            .client();
        assert!(matches!(res, Err(ErrorKind::InvalidUrl(_, _))));
    }

    #[tokio::test]
    async fn test_zero_throttle_config_is_rejected() {
        let res = ClientBuilder::builder()
            .base_url("https://example.com")
            .rate_limit(0_usize)
            .build()
            .client();
        assert!(matches!(res, Err(ErrorKind::ZeroRateLimit)));

        let res = ClientBuilder::builder()
            .base_url("https://example.com")
            .rate_period(Duration::ZERO)
            .build()
            .client();
        assert!(matches!(res, Err(ErrorKind::ZeroRatePeriod)));

        let res = ClientBuilder::builder()
            .base_url("https://example.com")
            .max_concurrency(0_usize)
            .build()
            .client();
        assert!(matches!(res, Err(ErrorKind::ZeroCapacity)));
    }

    #[tokio::test]
    async fn test_base_path_is_preserved() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::path("/v2/todos/1"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_json(json!({})))
            .mount(&mock_server)
            .await;

        let res = client(&format!("{}/v2", mock_server.uri()))
            .fetch("/todos/1")
            .await
            .unwrap();
        assert_eq!(res, Some(json!({})));
    }
}
