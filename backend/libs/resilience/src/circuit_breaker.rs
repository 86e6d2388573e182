/// Circuit breaker with generation-based request counting
///
/// State transitions:
/// - Closed → Open: once `min_requests` calls were seen in the current interval
///   and the failure ratio reaches `failure_ratio`
/// - Open → HalfOpen: after `open_timeout`
/// - HalfOpen → Closed: after `half_open_max_requests` consecutive successes
/// - HalfOpen → Open: on any failure
///
/// Every transition (and every interval rollover while closed) starts a new
/// generation. Results of calls admitted in an older generation are ignored.
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests pass through
    Closed,
    /// Circuit is open, requests fail fast
    Open,
    /// Probing the peer, a bounded number of trial requests pass
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Name used in log lines
    pub name: String,
    /// Minimum requests in an interval before the failure ratio is considered
    pub min_requests: u32,
    /// Failure ratio (0.0 - 1.0) that trips the breaker
    pub failure_ratio: f64,
    /// Closed-state counting window; counts reset when it elapses
    pub interval: Duration,
    /// How long the breaker stays open before probing
    pub open_timeout: Duration,
    /// Trial requests admitted while half-open, and successes needed to close
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            min_requests: 10,
            failure_ratio: 0.6,
            interval: Duration::from_secs(60),
            open_timeout: Duration::from_secs(30),
            half_open_max_requests: 5,
        }
    }
}

/// Request tallies for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_success(&mut self) {
        self.total_successes += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }

    pub fn failure_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        f64::from(self.total_failures) / f64::from(self.requests)
    }
}

#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// Breaker is open, the call was not attempted
    Open,
    /// Breaker is half-open and its trial budget is spent
    TooManyRequests,
    /// The call ran and failed
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitBreakerError::Open => write!(f, "Circuit breaker is open - failing fast"),
            CircuitBreakerError::TooManyRequests => {
                write!(f, "Circuit breaker is half-open - too many trial requests")
            }
            CircuitBreakerError::Inner(e) => write!(f, "Call failed: {}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for CircuitBreakerError<E> {}

#[derive(Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    inner: Arc<Mutex<BreakerInner>>,
}

struct BreakerInner {
    state: CircuitState,
    generation: u64,
    counts: Counts,
    /// Closed: end of the counting interval. Open: when probing may start.
    expiry: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let expiry = Some(Instant::now() + config.interval);
        Self {
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry,
            })),
        }
    }

    /// Execute a future with circuit breaker protection.
    ///
    /// Only `Err` results from `f` count as failures.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let generation = self.before_call()?;

        match f().await {
            Ok(value) => {
                self.after_call(generation, true);
                Ok(value)
            }
            Err(e) => {
                self.after_call(generation, false);
                Err(CircuitBreakerError::Inner(e))
            }
        }
    }

    fn before_call<E>(&self) -> Result<u64, CircuitBreakerError<E>> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let state = self.current_state(&mut inner, now);

        match state {
            CircuitState::Open => return Err(CircuitBreakerError::Open),
            CircuitState::HalfOpen
                if inner.counts.requests >= self.config.half_open_max_requests =>
            {
                return Err(CircuitBreakerError::TooManyRequests)
            }
            _ => {}
        }

        inner.counts.requests += 1;
        Ok(inner.generation)
    }

    fn after_call(&self, generation: u64, success: bool) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let state = self.current_state(&mut inner, now);
        if inner.generation != generation {
            return;
        }

        if success {
            inner.counts.on_success();
            if state == CircuitState::HalfOpen
                && inner.counts.consecutive_successes >= self.config.half_open_max_requests
            {
                self.transition(&mut inner, CircuitState::Closed, now);
            }
            return;
        }

        inner.counts.on_failure();
        match state {
            CircuitState::Closed if self.ready_to_trip(&inner.counts) => {
                warn!(
                    breaker = %self.config.name,
                    requests = inner.counts.requests,
                    failures = inner.counts.total_failures,
                    "Circuit breaker tripped"
                );
                self.transition(&mut inner, CircuitState::Open, now);
            }
            CircuitState::HalfOpen => {
                warn!(breaker = %self.config.name, "Circuit breaker trial request failed");
                self.transition(&mut inner, CircuitState::Open, now);
            }
            _ => {}
        }
    }

    fn ready_to_trip(&self, counts: &Counts) -> bool {
        counts.requests >= self.config.min_requests
            && counts.failure_ratio() >= self.config.failure_ratio
    }

    /// Resolve time-driven transitions (interval rollover, open timeout).
    fn current_state(&self, inner: &mut BreakerInner, now: Instant) -> CircuitState {
        match inner.state {
            CircuitState::Closed => {
                if inner.expiry.map_or(false, |expiry| expiry <= now) {
                    self.new_generation(inner, now);
                }
            }
            CircuitState::Open => {
                if inner.expiry.map_or(true, |expiry| expiry <= now) {
                    self.transition(inner, CircuitState::HalfOpen, now);
                }
            }
            CircuitState::HalfOpen => {}
        }
        inner.state
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState, now: Instant) {
        if inner.state == to {
            return;
        }
        info!(breaker = %self.config.name, from = %inner.state, to = %to, "Circuit breaker state change");
        inner.state = to;
        self.new_generation(inner, now);
    }

    fn new_generation(&self, inner: &mut BreakerInner, now: Instant) {
        inner.generation += 1;
        inner.counts = Counts::default();
        inner.expiry = match inner.state {
            CircuitState::Closed => Some(now + self.config.interval),
            CircuitState::Open => Some(now + self.config.open_timeout),
            CircuitState::HalfOpen => None,
        };
    }

    /// Get current circuit state (for monitoring)
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.current_state(&mut inner, Instant::now())
    }

    /// Get the tallies of the current generation (for monitoring)
    pub fn counts(&self) -> Counts {
        let mut inner = self.inner.lock();
        self.current_state(&mut inner, Instant::now());
        inner.counts
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }
}
