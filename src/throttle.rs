//! Self-imposed throttling.
//!
//! When an SMSC starts answering with ESME_RTHROTTLED (or ESME_RMSGQFUL,
//! which this client treats the same way), continuing to push traffic only
//! makes things worse. The session reports each submit outcome here and
//! consults `allow_request` immediately before every send; when denied it
//! sleeps `throttle_delay` and re-checks.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[async_trait]
pub trait ThrottleHandler: Send + Sync {
    /// A throttle response was observed.
    async fn throttled(&self);

    /// A non-throttle response was observed.
    async fn not_throttled(&self);

    /// Whether the next request may be sent.
    async fn allow_request(&self) -> bool;

    /// How long to wait before re-checking after a denial.
    async fn throttle_delay(&self) -> Duration;
}

/// Sliding-window throttle handler.
///
/// Counts throttle and non-throttle responses in buckets of
/// `sampling_period`. Once at least `sample_size` observations exist and
/// the throttle share exceeds `deny_request_at` percent, requests are
/// denied; the backoff grows with the observed share.
pub struct SlidingWindowThrottle {
    sampling_period: Duration,
    sample_size: u64,
    deny_request_at: f64,
    throttle_wait: Duration,
    window: Mutex<Window>,
}

struct Window {
    throttled: u64,
    not_throttled: u64,
    updated_at: Instant,
}

impl Window {
    fn total(&self) -> u64 {
        self.throttled + self.not_throttled
    }
}

impl SlidingWindowThrottle {
    pub fn new(
        sampling_period: Duration,
        sample_size: u64,
        deny_request_at: f64,
        throttle_wait: Duration,
    ) -> Self {
        Self {
            sampling_period,
            sample_size,
            deny_request_at,
            throttle_wait,
            window: Mutex::new(Window {
                throttled: 0,
                not_throttled: 0,
                updated_at: Instant::now(),
            }),
        }
    }

    /// The share of throttle responses, in percent. Below `sample_size`
    /// observations there is not enough data, so the happy case is
    /// assumed.
    pub fn percent_throttled(&self) -> f64 {
        let window = self.window.lock();
        if window.total() < self.sample_size {
            return 0.0;
        }
        (window.throttled as f64 / window.total() as f64) * 100.0
    }
}

impl Default for SlidingWindowThrottle {
    fn default() -> Self {
        Self::new(Duration::from_secs(180), 50, 1.0, Duration::from_secs(3))
    }
}

#[async_trait]
impl ThrottleHandler for SlidingWindowThrottle {
    async fn throttled(&self) {
        self.window.lock().throttled += 1;
    }

    async fn not_throttled(&self) {
        self.window.lock().not_throttled += 1;
    }

    async fn allow_request(&self) -> bool {
        let percent = self.percent_throttled();

        {
            // the window only measures share within one sampling period
            let mut window = self.window.lock();
            if window.updated_at.elapsed() > self.sampling_period {
                window.throttled = 0;
                window.not_throttled = 0;
                window.updated_at = Instant::now();
            }
        }

        if percent > self.deny_request_at {
            info!(
                percent_throttled = percent,
                deny_request_at = self.deny_request_at,
                sample_size = self.sample_size,
                sampling_period = self.sampling_period.as_secs_f64(),
                "denying outbound requests, SMSC is throttling us"
            );
            return false;
        }
        debug!(percent_throttled = percent, "allowing outbound request");
        true
    }

    async fn throttle_delay(&self) -> Duration {
        // back off harder the more we are being throttled
        let percent = self.percent_throttled();
        let scaled = self.throttle_wait.mul_f64(1.0 + percent / 25.0);
        scaled.min(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> SlidingWindowThrottle {
        SlidingWindowThrottle::new(Duration::from_secs(180), 4, 20.0, Duration::from_secs(3))
    }

    #[tokio::test]
    async fn allows_until_sample_size_reached() {
        let throttle = handler();
        throttle.throttled().await;
        throttle.throttled().await;
        throttle.throttled().await;

        // only three observations, not enough data to deny
        assert!(throttle.allow_request().await);
    }

    #[tokio::test]
    async fn denies_once_share_exceeds_threshold() {
        let throttle = handler();
        throttle.throttled().await;
        throttle.throttled().await;
        throttle.not_throttled().await;
        throttle.not_throttled().await;

        // 50% > 20% over 4 observations
        assert!(!throttle.allow_request().await);
    }

    #[tokio::test]
    async fn low_share_is_allowed() {
        let throttle = handler();
        throttle.throttled().await;
        for _ in 0..9 {
            throttle.not_throttled().await;
        }

        // 10% < 20%
        assert!(throttle.allow_request().await);
    }

    #[tokio::test]
    async fn window_resets_after_sampling_period() {
        let throttle =
            SlidingWindowThrottle::new(Duration::from_millis(10), 2, 20.0, Duration::from_secs(3));
        throttle.throttled().await;
        throttle.throttled().await;

        assert!(!throttle.allow_request().await);

        std::thread::sleep(Duration::from_millis(15));
        // first call after the period rolls the window over
        throttle.allow_request().await;
        assert!(throttle.allow_request().await);
    }

    #[tokio::test]
    async fn delay_grows_with_throttle_share() {
        let quiet = handler();
        assert_eq!(quiet.throttle_delay().await, Duration::from_secs(3));

        let busy = handler();
        for _ in 0..3 {
            busy.throttled().await;
        }
        busy.not_throttled().await;

        // 75% share scales the base wait by 4x
        assert_eq!(busy.throttle_delay().await, Duration::from_secs(12));
    }
}
