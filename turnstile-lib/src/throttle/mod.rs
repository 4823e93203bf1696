//! Admission control for outbound requests.
//!
//! This module decides *when* a request may go out. It combines two
//! independent limits:
//!
//! - [`ConcurrencyGate`]: bounds the number of requests in flight at the
//!   same time
//! - [`SlidingWindow`]: bounds the number of requests *started* within any
//!   rolling interval of a fixed length, configured via [`RateWindow`]
//!
//! A request is *admitted* once it has passed both. The server-side
//! counterpart, the `Retry-After` response header, is parsed in the
//! `headers` submodule.

mod gate;
mod headers;
mod window;

pub use gate::{ConcurrencyGate, GatePermit};
pub(crate) use headers::retry_after_hint;
pub use window::{RateWindow, SlidingWindow};
