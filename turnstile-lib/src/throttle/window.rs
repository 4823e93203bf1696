use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

use crate::types::Result;
use crate::ErrorKind;

/// Configuration for a sliding rate window: at most `limit` admissions
/// within any rolling interval of length `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    limit: NonZeroUsize,
    period: Duration,
}

impl RateWindow {
    /// Create a new rate window.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ZeroRatePeriod`] if `period` is zero. A zero
    /// period would make every admission record stale on arrival, turning
    /// the window into a no-op; rejecting it early keeps the configuration
    /// honest.
    pub fn new(limit: NonZeroUsize, period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(ErrorKind::ZeroRatePeriod);
        }
        Ok(Self { limit, period })
    }

    /// Maximum number of admissions per window.
    #[must_use]
    pub const fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    /// Length of the rolling interval.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

/// Tracks recent admission times and delays callers so that no more than
/// [`RateWindow::limit`] admissions fall into any rolling interval of
/// [`RateWindow::period`].
///
/// The prune-check-decide-record sequence runs as a single critical section
/// under an async mutex, and a caller that has to wait sleeps while still
/// holding it. Without this, several callers could each observe spare
/// capacity and all proceed, blowing past the limit. Queued callers are
/// served in FIFO order, as guaranteed by [`Mutex`].
#[derive(Debug)]
pub struct SlidingWindow {
    rate: RateWindow,
    admissions: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    /// Create an empty tracker for the given rate window.
    #[must_use]
    pub fn new(rate: RateWindow) -> Self {
        Self {
            rate,
            admissions: Mutex::new(VecDeque::with_capacity(rate.limit().get())),
        }
    }

    /// The configured rate window.
    #[must_use]
    pub const fn rate(&self) -> RateWindow {
        self.rate
    }

    /// Suspend until an admission is allowed, record it, and return the
    /// instant of admission.
    ///
    /// Stale records (older than one period) are pruned before every
    /// decision, so the tracker never holds more than `limit` timestamps
    /// that still count against the window.
    pub async fn admit(&self) -> Instant {
        let mut admissions = self.admissions.lock().await;

        let now = Instant::now();
        while let Some(&oldest) = admissions.front() {
            if now.duration_since(oldest) >= self.rate.period() {
                admissions.pop_front();
            } else {
                break;
            }
        }

        if admissions.len() >= self.rate.limit().get()
            && let Some(&oldest) = admissions.front()
        {
            // The wait ends exactly when the oldest record ages out of the
            // window. Saturating math clamps the degenerate case to zero.
            let wait = self.rate.period().saturating_sub(now.duration_since(oldest));
            sleep(wait).await;
        }

        let admitted_at = Instant::now();
        admissions.push_back(admitted_at);
        admitted_at
    }
}
