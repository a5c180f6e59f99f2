//! Optional stream-open rate limiting.

use crate::Identity;
use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

/// Gate applied once per stream open, never per block.
pub trait RateLimiter: Send + Sync {
    /// Whether this identity may open a stream right now.
    fn allow(&self, identity: &Identity) -> bool;
}

#[derive(Debug)]
struct BucketState {
    level: u32,
    last_drip: Instant,
}

/// A leaky bucket of capacity `size` draining one slot per `drip_rate`.
#[derive(Debug)]
pub struct LeakyBucketLimiter {
    size: u32,
    drip_rate: Duration,
    state: Mutex<BucketState>,
}

impl LeakyBucketLimiter {
    /// Creates a bucket with the given capacity and drain rate.
    pub fn new(size: u32, drip_rate: Duration) -> Self {
        Self {
            size,
            drip_rate,
            state: Mutex::new(BucketState { level: 0, last_drip: Instant::now() }),
        }
    }
}

impl RateLimiter for LeakyBucketLimiter {
    fn allow(&self, _identity: &Identity) -> bool {
        let mut state = self.state.lock().expect("limiter lock");

        if !self.drip_rate.is_zero() {
            let dripped = (state.last_drip.elapsed().as_nanos() / self.drip_rate.as_nanos())
                .min(u128::from(u32::MAX)) as u32;
            if dripped > 0 {
                state.level = state.level.saturating_sub(dripped);
                state.last_drip = Instant::now();
            }
        }

        if state.level >= self.size {
            return false;
        }
        state.level += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_up_then_rejects() {
        let limiter = LeakyBucketLimiter::new(2, Duration::from_secs(3600));
        let identity = Identity::default();

        assert!(limiter.allow(&identity));
        assert!(limiter.allow(&identity));
        assert!(!limiter.allow(&identity));
    }

    #[test]
    fn drains_over_time() {
        let limiter = LeakyBucketLimiter::new(1, Duration::from_millis(5));
        let identity = Identity::default();

        assert!(limiter.allow(&identity));
        assert!(!limiter.allow(&identity));
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.allow(&identity));
    }
}
