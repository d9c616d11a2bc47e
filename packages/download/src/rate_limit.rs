//! Global request throttle shared by all download workers.
//!
//! Permits are spaced at least `1s / n` apart with a burst of one, so no rolling
//! one-second window ever holds more than `n` requests. Waiters queue on a
//! fair mutex, which hands out permits in arrival order.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::Mutex;

/// Shared rate limiter for outgoing image requests.
pub struct RequestThrottle {
    limiter: DefaultDirectRateLimiter,
    queue: Mutex<()>,
    per_second: NonZeroU32,
}

impl RequestThrottle {
    /// Allows at most `per_second` requests in any one-second window.
    #[must_use]
    pub fn per_second(per_second: NonZeroU32) -> Self {
        let quota = Quota::with_period(permit_period(per_second))
            .unwrap_or_else(|| Quota::per_second(per_second))
            .allow_burst(NonZeroU32::MIN);

        Self {
            limiter: RateLimiter::direct(quota),
            queue: Mutex::new(()),
            per_second,
        }
    }

    /// Configured requests per second.
    #[must_use]
    pub const fn limit(&self) -> NonZeroU32 {
        self.per_second
    }

    /// Waits for this caller's turn and then for a free permit.
    pub async fn acquire(&self) {
        let _turn = self.queue.lock().await;
        self.limiter.until_ready().await;
    }
}

/// Spacing between permits, rounded up so that `per_second` periods never
/// fit inside one second with room for another permit.
fn permit_period(per_second: NonZeroU32) -> Duration {
    Duration::from_nanos(1_000_000_000_u64.div_ceil(u64::from(per_second.get())))
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("per_second", &self.per_second)
            .finish_non_exhaustive()
    }
}
