//! Token-bucket pacing for calls to the generation service.

use std::cell::Cell;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::{BatchError, Result};

/// Waits are split into slices of at most this length so cancellation is
/// noticed promptly.
const MAX_SLEEP_SLICE: Duration = Duration::from_millis(100);

pub trait Clock {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only moves when slept on.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Allows `calls` acquisitions per `per`, starting with a full bucket.
///
/// Spacing is measured between acquisitions, that is from the start of one
/// call to the start of the next. Time spent inside a slow call counts
/// toward the next token, so a call that outlasts the period is followed
/// immediately by the next one.
#[derive(Debug)]
pub struct RateLimiter<C: Clock> {
    clock: C,
    capacity: u32,
    available: u32,
    period: Duration,
    last_refill: Duration,
}

impl<C: Clock> RateLimiter<C> {
    pub fn new(clock: C, calls: u32, per: Duration) -> Self {
        let capacity = calls.max(1);
        let last_refill = clock.now();
        Self {
            clock,
            capacity,
            available: capacity,
            period: per / capacity,
            last_refill,
        }
    }

    /// Wait-free limiter, for tests and dry runs.
    pub fn unlimited(clock: C) -> Self {
        Self::new(clock, 1, Duration::ZERO)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn refill(&mut self) {
        let now = self.clock.now();
        if self.period.is_zero() {
            self.available = self.capacity;
            self.last_refill = now;
            return;
        }
        let elapsed = now.saturating_sub(self.last_refill);
        let earned = elapsed.as_nanos() / self.period.as_nanos();
        if earned == 0 {
            return;
        }
        let room = u128::from(self.capacity - self.available);
        if earned >= room {
            self.available = self.capacity;
            self.last_refill = now;
        } else {
            // earned < room <= u32::MAX
            let earned = earned as u32;
            self.available += earned;
            self.last_refill += self.period * earned;
        }
    }

    /// Takes one token, sleeping until one is available.
    pub fn acquire(&mut self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(BatchError::Cancelled);
            }
            self.refill();
            if self.available > 0 {
                self.available -= 1;
                return Ok(());
            }
            let wait = (self.last_refill + self.period).saturating_sub(self.clock.now());
            debug!(wait_ms = wait.as_millis() as u64, "rate limited");
            self.clock.sleep(wait.min(MAX_SLEEP_SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_is_immediate_then_spaced() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(&clock, 1, Duration::from_secs(7));
        let cancel = CancellationToken::new();

        limiter.acquire(&cancel).unwrap();
        assert_eq!(clock.now(), Duration::ZERO);
        limiter.acquire(&cancel).unwrap();
        assert_eq!(clock.now(), Duration::from_secs(7));
        limiter.acquire(&cancel).unwrap();
        assert_eq!(clock.now(), Duration::from_secs(14));
    }

    #[test]
    fn idle_time_counts_toward_next_token() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(&clock, 1, Duration::from_secs(7));
        let cancel = CancellationToken::new();

        limiter.acquire(&cancel).unwrap();
        clock.advance(Duration::from_secs(5));
        limiter.acquire(&cancel).unwrap();
        assert_eq!(clock.now(), Duration::from_secs(7));
    }

    #[test]
    fn slow_call_is_followed_without_gap() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(&clock, 1, Duration::from_secs(7));
        let cancel = CancellationToken::new();

        limiter.acquire(&cancel).unwrap();
        clock.advance(Duration::from_secs(30));
        limiter.acquire(&cancel).unwrap();
        assert_eq!(clock.now(), Duration::from_secs(30));
    }

    #[test]
    fn burst_up_to_capacity() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(&clock, 3, Duration::from_secs(3));
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            limiter.acquire(&cancel).unwrap();
        }
        assert_eq!(clock.now(), Duration::ZERO);
        limiter.acquire(&cancel).unwrap();
        assert_eq!(clock.now(), Duration::from_secs(1));
    }

    #[test]
    fn cancelled_token_stops_waiting() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(&clock, 1, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).unwrap();

        cancel.cancel();
        let err = limiter.acquire(&cancel).unwrap_err();
        assert!(matches!(err, BatchError::Cancelled));
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn unlimited_never_sleeps() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::unlimited(&clock);
        let cancel = CancellationToken::new();
        for _ in 0..5 {
            limiter.acquire(&cancel).unwrap();
        }
        assert_eq!(clock.now(), Duration::ZERO);
    }
}
