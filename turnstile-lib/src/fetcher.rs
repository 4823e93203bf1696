//! Drives one logical request through admission control and the
//! backoff-and-retry loop for rate-limited responses.

use http::StatusCode;
use reqwest::Url;
use serde_json::Value;
use tokio::time::sleep;

use crate::throttle::{ConcurrencyGate, SlidingWindow, retry_after_hint};
use crate::{ErrorKind, Result};

/// Executes requests on behalf of the client facade.
///
/// Holds the shared throttle state: the concurrency gate and the sliding
/// admission window live here for the lifetime of the client and are
/// consulted by every call.
#[derive(Debug)]
pub(crate) struct Fetcher {
    /// HTTP request client.
    ///
    /// [reqwest]: https://docs.rs/reqwest/latest/reqwest/struct.Client.html
    reqwest_client: reqwest::Client,

    /// Bounds the number of simultaneously in-flight requests.
    gate: ConcurrencyGate,

    /// Bounds the number of requests started per rolling window.
    window: SlidingWindow,

    /// Maximum number of rate-limited attempts before giving up.
    max_retries: u64,
}

impl Fetcher {
    pub(crate) const fn new(
        reqwest_client: reqwest::Client,
        gate: ConcurrencyGate,
        window: SlidingWindow,
        max_retries: u64,
    ) -> Self {
        Self {
            reqwest_client,
            gate,
            window,
            max_retries,
        }
    }

    /// Fetch `url` and decode the response body as JSON.
    ///
    /// Returns `Ok(None)` if the transport itself failed (connection error,
    /// timeout, DNS): transient network trouble degrades to absence of data
    /// instead of aborting the whole batch. The failure is logged.
    ///
    /// A `429 Too Many Requests` response is never surfaced. The fetcher
    /// sleeps for the server's `Retry-After` hint and re-enters the whole
    /// admission sequence: gate permit, window admission, fresh request. The
    /// gate permit is released during the backoff sleep so that other
    /// callers keep their in-flight capacity while this one backs off.
    /// After `max_retries` rate-limited attempts the loop gives up with
    /// [`ErrorKind::TooManyRetries`].
    ///
    /// Any other non-2xx status is propagated as
    /// [`ErrorKind::RejectedStatusCode`].
    pub(crate) async fn fetch(&self, url: Url) -> Result<Option<Value>> {
        let mut retries: u64 = 0;

        loop {
            let permit = self.gate.acquire().await;
            self.window.admit().await;

            let response = match self.reqwest_client.get(url.clone()).send().await {
                Ok(response) => response,
                Err(e) => {
                    log::warn!("Request to {url} failed: {e}");
                    return Ok(None);
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if retries >= self.max_retries {
                    return Err(ErrorKind::TooManyRetries(retries, url));
                }
                retries += 1;

                let wait = retry_after_hint(response.headers());
                log::debug!(
                    "Rate limited on {url}; retrying in {}ms (attempt {retries}/{})",
                    wait.as_millis(),
                    self.max_retries
                );

                // Back off without hogging an in-flight slot.
                drop(permit);
                sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                return Err(ErrorKind::RejectedStatusCode(status, url));
            }

            let document = response
                .json::<Value>()
                .await
                .map_err(ErrorKind::ReadResponseBody)?;
            return Ok(Some(document));
        }
    }

    /// Shared view on the gate, used by the facade for introspection.
    pub(crate) const fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }
}
