//! Keyed fixed-window rate limiting.
//!
//! Process-local and best-effort: counters reset on restart and are not shared
//! across instances. Abuse-dampening only, never a correctness mechanism.
//! Behind a trait so deployments with more than one process can swap in a
//! shared counter service.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Keyed rate-limit capability consumed by the managers.
pub trait BaseRateLimiter: Send + Sync {
    /// Returns true if the request under `key` is within `max_requests` per
    /// `window`, recording the request as a side effect.
    fn check(&self, key: &str, max_requests: u32, window: Duration) -> bool;
}

struct WindowState {
    count: u32,
    reset_at: Instant,
}

/// In-process fixed-window counter map.
pub struct FixedWindowRateLimiter {
    windows: Mutex<HashMap<String, WindowState>>,
}

impl FixedWindowRateLimiter {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for FixedWindowRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseRateLimiter for FixedWindowRateLimiter {
    fn check(&self, key: &str, max_requests: u32, window: Duration) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();

        match windows.get_mut(key) {
            Some(state) if state.reset_at > now => {
                if state.count >= max_requests {
                    return false;
                }
                state.count += 1;
                true
            }
            _ => {
                windows.insert(
                    key.to_string(),
                    WindowState {
                        count: 1,
                        reset_at: now + window,
                    },
                );
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn allows_up_to_max_then_rejects() {
        let limiter = FixedWindowRateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check("pairing:abc", 5, WINDOW));
        }
        assert!(!limiter.check("pairing:abc", 5, WINDOW));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = FixedWindowRateLimiter::new();
        assert!(limiter.check("a", 1, WINDOW));
        assert!(!limiter.check("a", 1, WINDOW));
        assert!(limiter.check("b", 1, WINDOW));
    }

    #[test]
    fn window_expiry_resets_the_counter() {
        let limiter = FixedWindowRateLimiter::new();
        // Zero-length window: every call starts a fresh window
        assert!(limiter.check("a", 1, Duration::ZERO));
        assert!(limiter.check("a", 1, Duration::ZERO));
    }
}
