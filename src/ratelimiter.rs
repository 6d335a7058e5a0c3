//! Outbound admission control.
//!
//! The dispatcher awaits `acquire` before every submit; the default is a
//! token bucket refilled at `send_rate` tokens per second. Replacements
//! (for example a limiter shared across processes) honor the same
//! contract: return only when the caller may send.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until a send is admitted.
    async fn acquire(&self);
}

/// Token bucket rate limiter.
///
/// Capacity is `max_tokens` (generally equal to `send_rate`); tokens
/// refill continuously at `send_rate` per second and each admitted send
/// consumes one. When empty, the caller sleeps `delay_for_tokens` between
/// refill checks.
pub struct TokenBucket {
    send_rate: f64,
    max_tokens: f64,
    delay_for_tokens: Duration,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    updated_at: Instant,
    sends_since_update: u64,
    effective_send_rate: f64,
}

impl TokenBucket {
    pub fn new(send_rate: f64, max_tokens: f64, delay_for_tokens: Duration) -> Self {
        Self {
            send_rate,
            max_tokens,
            delay_for_tokens,
            state: Mutex::new(BucketState {
                tokens: max_tokens,
                updated_at: Instant::now(),
                sends_since_update: 0,
                effective_send_rate: 0.0,
            }),
        }
    }

    /// A bucket whose capacity equals its refill rate.
    pub fn per_second(send_rate: f64) -> Self {
        Self::new(send_rate, send_rate, Duration::from_secs(1))
    }

    fn try_take(&self) -> Option<f64> {
        let mut state = self.state.lock();

        let elapsed = state.updated_at.elapsed().as_secs_f64();
        let refill = elapsed * self.send_rate;
        if refill >= 1.0 {
            state.tokens = (state.tokens + refill).min(self.max_tokens);
            state.effective_send_rate = state.sends_since_update as f64 / elapsed;
            state.updated_at = Instant::now();
            state.sends_since_update = 0;
        }

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            state.sends_since_update += 1;
            None
        } else {
            Some(state.effective_send_rate)
        }
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        // effectively unlimited unless the operator configures a rate
        Self::per_second(100_000.0)
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn acquire(&self) {
        loop {
            match self.try_take() {
                None => return,
                Some(effective_send_rate) => {
                    info!(
                        send_rate = self.send_rate,
                        delay = self.delay_for_tokens.as_secs_f64(),
                        effective_send_rate,
                        "rate limiting outbound sends"
                    );
                    tokio::time::sleep(self.delay_for_tokens).await;
                }
            }
        }
    }
}
