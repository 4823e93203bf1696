use std::time::Duration;

use clap::Parser;
use turnstile_lib::{DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT};

/// A demonstration driver for rate-limited API fetching.
///
/// Fetches the given endpoints concurrently through one shared client and
/// prints each decoded JSON document (or `null` for endpoints whose
/// transport failed).
#[derive(Parser, Debug)]
#[command(name = "turnstile", version)]
pub(crate) struct Options {
    /// Base URL of the API, e.g. `https://jsonplaceholder.typicode.com`
    #[arg(env = "TURNSTILE_BASE_URL")]
    pub(crate) base_url: String,

    /// Endpoints to fetch, e.g. `/todos/1`
    #[arg(required = true)]
    pub(crate) endpoints: Vec<String>,

    /// Maximum number of requests started per rate window
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT)]
    pub(crate) rate_limit: usize,

    /// Length of the rolling rate window
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    pub(crate) rate_period: Duration,

    /// Maximum number of simultaneously in-flight requests
    /// [default: same as --rate-limit]
    #[arg(long)]
    pub(crate) max_concurrency: Option<usize>,

    /// Maximum number of rate-limited retries per request
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub(crate) max_retries: u64,

    /// Response timeout per request attempt
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) timeout: Option<Duration>,
}
