//! Minimum spacing between outbound requests to one source.

use bridge_traits::time::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

/// Enforces a delay between consecutive requests.
///
/// The lock is held while sleeping, so concurrent callers queue up behind
/// each other and never fire two requests inside one window.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
    min_delay: Duration,
}

#[derive(Default)]
struct LimiterState {
    last_request_ms: Option<i64>,
    /// Earliest time the next request may go out, set by [`RateLimiter::penalize`]
    not_before_ms: Option<i64>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self::with_clock(min_delay, Arc::new(SystemClock))
    }

    pub fn with_clock(min_delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(LimiterState::default()),
            min_delay,
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Wait until the next request is allowed, then claim the slot.
    pub async fn wait_if_needed(&self) {
        let mut state = self.state.lock().await;
        let now = self.clock.unix_timestamp_millis();

        let mut ready_at = state
            .last_request_ms
            .map(|last| last + self.min_delay.as_millis() as i64)
            .unwrap_or(now);
        if let Some(not_before) = state.not_before_ms.take() {
            ready_at = ready_at.max(not_before);
        }

        if ready_at > now {
            let wait_time = Duration::from_millis((ready_at - now) as u64);
            debug!("Rate limiting: waiting {:?}", wait_time);
            sleep(wait_time).await;
        }

        state.last_request_ms = Some(self.clock.unix_timestamp_millis());
    }

    /// Hold the next request back for at least `delay` from now.
    pub async fn penalize(&self, delay: Duration) {
        let mut state = self.state.lock().await;
        let until = self.clock.unix_timestamp_millis() + delay.as_millis() as i64;
        state.not_before_ms = Some(state.not_before_ms.map_or(until, |v| v.max(until)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_first_request_is_not_delayed() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.wait_if_needed().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_consecutive_requests_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(60));
        limiter.wait_if_needed().await;
        let start = Instant::now();
        limiter.wait_if_needed().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_penalty_extends_wait() {
        let limiter = RateLimiter::new(Duration::ZERO);
        limiter.wait_if_needed().await;
        limiter.penalize(Duration::from_millis(80)).await;

        let start = Instant::now();
        limiter.wait_if_needed().await;
        assert!(start.elapsed() >= Duration::from_millis(70));

        // The penalty applies once.
        let start = Instant::now();
        limiter.wait_if_needed().await;
        assert!(start.elapsed() < Duration::from_millis(70));
    }
}
