/// Resilience patterns for calls that leave the process
///
/// - **Circuit Breaker**: fails fast once a peer's failure ratio crosses a threshold
/// - **Token Bucket**: non-blocking admission control in front of a peer
/// - **Timeout**: enforces a deadline on a single call
///
/// # Example: guarded peer call
///
/// ```rust,no_run
/// use resilience::{CircuitBreaker, CircuitBreakerConfig, RateLimitConfig, TokenBucket};
///
/// #[tokio::main]
/// async fn main() {
///     let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
///     let bucket = TokenBucket::new(&RateLimitConfig::default()).unwrap();
///
///     if bucket.try_acquire() {
///         let result = breaker.call(|| async {
///             // Your peer call here
///             Ok::<_, String>(())
///         }).await;
///     }
/// }
/// ```

pub mod circuit_breaker;
pub mod rate_limit;
pub mod timeout;

// Re-export main types for convenience
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState, Counts};
pub use rate_limit::{RateLimitConfig, RateLimitError, TokenBucket};
pub use timeout::{with_timeout, TimeoutError};
