//! `turnstile` is a library for making rate-limited calls against HTTP APIs.
//!
//! Every fetch passes two admission checks before it goes out on the wire: a
//! concurrency gate bounding the number of in-flight requests, and a sliding
//! window bounding the number of requests started per rolling period. A `429
//! Too Many Requests` answer is handled transparently by backing off for the
//! server's `Retry-After` hint and re-entering admission.
//!
//! "Hello world" example:
//! ```no_run
//! use turnstile_lib::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let todo = turnstile_lib::fetch("https://jsonplaceholder.typicode.com", "/todos/1").await?;
//!   println!("{todo:?}");
//!   Ok(())
//! }
//! ```
//!
//! For more specific use-cases you can build a turnstile client yourself,
//! using the `ClientBuilder` which can be used to configure the throttle and
//! grants full flexibility:
//!
//! ```no_run
//! use std::time::Duration;
//! use turnstile_lib::{ClientBuilder, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let client = ClientBuilder::builder()
//!       .base_url("https://jsonplaceholder.typicode.com")
//!       .rate_limit(5_usize)
//!       .rate_period(Duration::from_secs(1))
//!       .build()
//!       .client()?;
//!   let todo = client.fetch("/todos/1").await?;
//!   println!("{todo:?}");
//!   client.close();
//!   Ok(())
//! }
//! ```
#![warn(clippy::all, clippy::pedantic)]
// #![deny(missing_docs)]

mod client;
mod fetcher;
mod types;

pub mod throttle;
#[cfg(test)]
#[macro_use]
pub mod test_utils;

pub use client::{
    Client, ClientBuilder, DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT, DEFAULT_RATE_PERIOD,
    DEFAULT_USER_AGENT, fetch,
};
pub use types::*;
