use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Injectable clock so breaker tests can advance time without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// For tests: a clock whose `now()` is an offset from construction time,
/// advanced explicitly.
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

enum Inner {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { successes: u32 },
}

/// Three-state circuit breaker, one per service.
///
/// Closed → Open after `threshold` consecutive failures. Open → HalfOpen
/// once `reset_timeout` has elapsed since the last failure (checked lazily
/// on read — "transition-on-read"). HalfOpen → Closed after `half_open_max`
/// consecutive successes; any HalfOpen failure → Open.
pub struct CircuitBreaker {
    threshold: u32,
    reset_timeout: Duration,
    half_open_max: u32,
    state: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, reset_timeout: Duration, half_open_max: u32) -> Self {
        Self::with_clock(threshold, reset_timeout, half_open_max, Arc::new(SystemClock))
    }

    pub fn with_clock(
        threshold: u32,
        reset_timeout: Duration,
        half_open_max: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            threshold,
            reset_timeout,
            half_open_max,
            state: Mutex::new(Inner::Closed { failures: 0 }),
            clock,
        }
    }

    pub fn defaults() -> Self {
        Self::new(5, Duration::from_secs(30), 2)
    }

    /// Whether a call should be allowed right now. Performs the Open →
    /// HalfOpen transition if `reset_timeout` has elapsed.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock();
        if let Inner::Open { opened_at } = *state {
            if self.clock.now().duration_since(opened_at) >= self.reset_timeout {
                *state = Inner::HalfOpen { successes: 0 };
            }
        }
        !matches!(*state, Inner::Open { .. })
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        match &mut *state {
            Inner::Closed { failures } => *failures = 0,
            Inner::HalfOpen { successes } => {
                *successes += 1;
                if *successes >= self.half_open_max {
                    *state = Inner::Closed { failures: 0 };
                }
            }
            Inner::Open { .. } => {}
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        match &mut *state {
            Inner::Closed { failures } => {
                *failures += 1;
                if *failures >= self.threshold {
                    *state = Inner::Open {
                        opened_at: self.clock.now(),
                    };
                }
            }
            Inner::HalfOpen { .. } => {
                *state = Inner::Open {
                    opened_at: self.clock.now(),
                };
            }
            Inner::Open { .. } => {}
        }
    }

    /// Snapshot the current state. May itself transition Open → HalfOpen
    /// (transition-on-read), matching `allow()`.
    pub fn state(&self) -> BreakerState {
        if !self.allow() {
            return BreakerState::Open;
        }
        match *self.state.lock() {
            Inner::Closed { .. } => BreakerState::Closed,
            Inner::HalfOpen { .. } => BreakerState::HalfOpen,
            Inner::Open { .. } => BreakerState::Open,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_threshold_failures() {
        let cb = CircuitBreaker::new(3, Duration::from_millis(100), 1);
        assert_eq!(cb.state(), BreakerState::Closed);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.allow());
    }

    #[test]
    fn recovers_through_half_open() {
        let clock = ManualClock::new();
        let cb = CircuitBreaker::with_clock(3, Duration::from_millis(100), 1, clock.clone());
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);

        clock.advance(Duration::from_millis(200));
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert!(cb.allow());

        cb.record_success();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let clock = ManualClock::new();
        let cb = CircuitBreaker::with_clock(2, Duration::from_millis(50), 2, clock.clone());
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);

        clock.advance(Duration::from_millis(60));
        assert_eq!(cb.state(), BreakerState::HalfOpen);

        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
    }
}
