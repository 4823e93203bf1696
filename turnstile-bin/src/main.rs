//! `turnstile` fetches JSON documents from an HTTP API without tripping its
//! rate limits.
//!
//! The turnstile binary is a thin demonstration driver around
//! `turnstile-lib`, which holds the actual admission-control logic.
//!
//! Fetch a single endpoint:
//!
//! ```sh
//! turnstile https://jsonplaceholder.typicode.com /todos/1
//! ```
//!
//! Fetch many endpoints concurrently, at most 5 started per second:
//!
//! ```sh
//! turnstile --rate-limit 5 --rate-period 1s \
//!     https://jsonplaceholder.typicode.com /todos/1 /todos/2 /todos/3
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use futures::future::join_all;
use log::warn;
use serde_json::Value;
use turnstile_lib::ClientBuilder;

mod options;

use options::Options;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().filter_or("RUST_LOG", "info")).init();

    let opts = Options::parse();

    let client = ClientBuilder::builder()
        .base_url(opts.base_url.clone())
        .rate_limit(opts.rate_limit)
        .rate_period(opts.rate_period)
        .max_concurrency(opts.max_concurrency)
        .max_retries(opts.max_retries)
        .timeout(opts.timeout)
        .build()
        .client()
        .context("Cannot create client")?;

    let fetches = opts.endpoints.iter().map(|endpoint| {
        let client = client.clone();
        async move { (endpoint, client.fetch(endpoint).await) }
    });

    let mut failed = false;
    for (endpoint, result) in join_all(fetches).await {
        match result {
            Ok(document) => {
                // Transport failures surface as an absent document.
                let document = document.unwrap_or(Value::Null);
                println!("{}", serde_json::to_string_pretty(&document)?);
            }
            Err(e) => {
                warn!("{endpoint}: {e}");
                failed = true;
            }
        }
    }

    client.close();

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
