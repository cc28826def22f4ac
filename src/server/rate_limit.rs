use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{ Quota, RateLimiter };
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::time::{ Duration, Instant };
use thiserror::Error;

/// Bucket key: the client plus the index of the fixed window it falls in.
type WindowKey = (IpAddr, u64);
type KeyedLimiter = RateLimiter<WindowKey, DefaultKeyedStateStore<WindowKey>, DefaultClock>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("rate limit window must be longer than zero")]
    ZeroWindow,
}

/// Fixed-window limiter: each client gets `limit` requests per `window`, and
/// every client's allowance resets together at the window boundary.
///
/// Each window is its own governor key whose quota releases one slot per
/// `window` with a burst of `limit`, so a key can never admit more than
/// `limit` requests before its window is over.
pub struct ClientRateLimiter {
    limiter: KeyedLimiter,
    started: Instant,
    limit: NonZeroU32,
    window: Duration,
}

impl ClientRateLimiter {
    pub fn new(limit: NonZeroU32, window: Duration) -> Result<Self, RateLimitError> {
        let quota = Quota::with_period(window).ok_or(RateLimitError::ZeroWindow)?.allow_burst(limit);
        Ok(Self {
            limiter: RateLimiter::keyed(quota),
            started: Instant::now(),
            limit,
            window,
        })
    }

    pub fn per_minute(limit: NonZeroU32) -> Result<Self, RateLimitError> {
        Self::new(limit, Duration::from_secs(60))
    }

    /// `Ok(())` when the request may proceed, otherwise how long until the
    /// current window closes.
    pub fn check(&self, client: IpAddr) -> Result<(), Duration> {
        let elapsed = self.started.elapsed();
        let window_nanos = self.window.as_nanos().max(1);
        let index = (elapsed.as_nanos() / window_nanos) as u64;

        match self.limiter.check_key(&(client, index)) {
            Ok(()) => Ok(()),
            Err(_) => {
                let closes_at = self.window.saturating_mul(u32::try_from(index + 1).unwrap_or(u32::MAX));
                Err(closes_at.saturating_sub(elapsed))
            }
        }
    }

    /// Drops buckets of past windows once governor considers them idle.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn limit(&self) -> u32 {
        self.limit.get()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn limiter(limit: u32, window: Duration) -> ClientRateLimiter {
        ClientRateLimiter::new(NonZeroU32::new(limit).unwrap(), window).unwrap()
    }

    #[test]
    fn eleventh_request_in_window_is_rejected() {
        let limiter = ClientRateLimiter::per_minute(NonZeroU32::new(10).unwrap()).unwrap();
        assert_eq!(limiter.limit(), 10);
        assert_eq!(limiter.window(), Duration::from_secs(60));
        for _ in 0..10 {
            assert!(limiter.check(ip(1)).is_ok());
        }
        let wait = limiter.check(ip(1)).unwrap_err();
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_secs(60));
    }

    #[test]
    fn no_slot_returns_before_the_window_closes() {
        let limiter = limiter(10, Duration::from_millis(1000));
        for _ in 0..10 {
            assert!(limiter.check(ip(4)).is_ok());
        }
        std::thread::sleep(Duration::from_millis(150));
        let wait = limiter.check(ip(4)).unwrap_err();
        assert!(wait <= Duration::from_millis(850));
        std::thread::sleep(Duration::from_millis(150));
        assert!(limiter.check(ip(4)).is_err());
    }

    #[test]
    fn clients_are_limited_independently() {
        let limiter = ClientRateLimiter::per_minute(NonZeroU32::new(2).unwrap()).unwrap();
        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(1)).is_err());
        assert!(limiter.check(ip(2)).is_ok());
    }

    #[test]
    fn full_allowance_returns_after_window() {
        let limiter = limiter(10, Duration::from_millis(300));
        for _ in 0..10 {
            assert!(limiter.check(ip(3)).is_ok());
        }
        let wait = limiter.check(ip(3)).unwrap_err();
        std::thread::sleep(wait + Duration::from_millis(20));
        for _ in 0..10 {
            assert!(limiter.check(ip(3)).is_ok());
        }
        assert!(limiter.check(ip(3)).is_err());
    }

    #[test]
    fn zero_window_is_rejected() {
        let result = ClientRateLimiter::new(NonZeroU32::new(10).unwrap(), Duration::ZERO);
        assert_eq!(result.err(), Some(RateLimitError::ZeroWindow));
    }
}
