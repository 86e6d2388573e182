//! Seams to services this engine does not own.

use async_trait::async_trait;
use resilience::{
    with_timeout, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, RateLimitConfig,
    TimeoutError, TokenBucket,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

use crate::error::{EngagementError, Result};
use crate::model::{Author, EntityId, EntityKind};

/// Resolves a session token pair to the user it belongs to.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Fails with `Unauthenticated` for an invalid or expired token.
    async fn verify(&self, token: &str, refresh_token: &str) -> Result<EntityId>;
}

#[async_trait]
pub trait EntityDirectory: Send + Sync {
    async fn exists(&self, kind: EntityKind, id: EntityId) -> Result<bool>;
}

#[async_trait]
pub trait AuthorDirectory: Send + Sync {
    /// Ids with no author are absent from the result.
    async fn batch_get(&self, ids: &[EntityId]) -> Result<HashMap<EntityId, Author>>;
}

/// Token verification behind admission control, a circuit breaker and a deadline.
///
/// Rejected tokens are an answer, not a peer failure, and do not count
/// against the breaker.
pub struct GuardedVerifier<V> {
    inner: V,
    breaker: CircuitBreaker,
    bucket: TokenBucket,
    timeout: Duration,
}

impl<V: TokenVerifier> GuardedVerifier<V> {
    pub fn new(
        inner: V,
        breaker: CircuitBreakerConfig,
        rate_limit: &RateLimitConfig,
        timeout: Duration,
    ) -> Result<Self> {
        let bucket = TokenBucket::new(rate_limit)
            .map_err(|e| EngagementError::Validation(e.to_string()))?;

        Ok(Self {
            inner,
            breaker: CircuitBreaker::new(breaker),
            bucket,
            timeout,
        })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

#[async_trait]
impl<V: TokenVerifier> TokenVerifier for GuardedVerifier<V> {
    async fn verify(&self, token: &str, refresh_token: &str) -> Result<EntityId> {
        if !self.bucket.try_acquire() {
            warn!(breaker = %self.breaker.name(), "Token verification rate limited");
            return Err(EngagementError::Upstream(
                "identity service rate limit exceeded".to_string(),
            ));
        }

        let outcome = self
            .breaker
            .call(|| async {
                let call = self.inner.verify(token, refresh_token);
                match with_timeout("verify_token", self.timeout, call).await {
                    Ok(user_id) => Ok(Ok(user_id)),
                    Err(TimeoutError::Failed(EngagementError::Unauthenticated(msg))) => {
                        Ok(Err(EngagementError::Unauthenticated(msg)))
                    }
                    Err(TimeoutError::Failed(err)) => Err(err),
                    Err(TimeoutError::Elapsed { elapsed, .. }) => Err(EngagementError::Timeout(
                        format!("token verification exceeded {:?}", elapsed),
                    )),
                }
            })
            .await;

        match outcome {
            Ok(verdict) => verdict,
            Err(CircuitBreakerError::Inner(err)) => Err(err),
            Err(CircuitBreakerError::Open) | Err(CircuitBreakerError::TooManyRequests) => {
                Err(EngagementError::Upstream(format!(
                    "{} circuit breaker is open",
                    self.breaker.name()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience::CircuitState;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Copy)]
    enum Behavior {
        Accept,
        Reject,
        Fail,
        Hang,
    }

    struct ScriptedVerifier {
        behavior: Behavior,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl TokenVerifier for ScriptedVerifier {
        async fn verify(&self, token: &str, _refresh_token: &str) -> Result<EntityId> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Accept => Ok(token.len() as EntityId),
                Behavior::Reject => Err(EngagementError::Unauthenticated("bad token".into())),
                Behavior::Fail => Err(EngagementError::Upstream("connection refused".into())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(0)
                }
            }
        }
    }

    fn guarded(behavior: Behavior, burst: u32) -> (GuardedVerifier<ScriptedVerifier>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let verifier = GuardedVerifier::new(
            ScriptedVerifier {
                behavior,
                calls: calls.clone(),
            },
            CircuitBreakerConfig {
                name: "identity".to_string(),
                min_requests: 3,
                failure_ratio: 0.6,
                ..Default::default()
            },
            &RateLimitConfig {
                per_second: 1,
                burst,
            },
            Duration::from_millis(50),
        )
        .unwrap();
        (verifier, calls)
    }

    #[tokio::test]
    async fn test_accepts_valid_token() {
        let (verifier, _) = guarded(Behavior::Accept, 10);
        assert_eq!(verifier.verify("abcd", "r").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_rejections_do_not_trip_breaker() {
        let (verifier, calls) = guarded(Behavior::Reject, 10);

        for _ in 0..5 {
            let result = verifier.verify("t", "r").await;
            assert!(matches!(result, Err(EngagementError::Unauthenticated(_))));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(verifier.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_peer_failures_open_breaker() {
        let (verifier, calls) = guarded(Behavior::Fail, 10);

        for _ in 0..3 {
            assert!(matches!(
                verifier.verify("t", "r").await,
                Err(EngagementError::Upstream(_))
            ));
        }
        assert_eq!(verifier.breaker().state(), CircuitState::Open);

        // Fails fast without reaching the peer
        assert!(matches!(
            verifier.verify("t", "r").await,
            Err(EngagementError::Upstream(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_slow_peer_times_out() {
        let (verifier, _) = guarded(Behavior::Hang, 10);
        assert!(matches!(
            verifier.verify("t", "r").await,
            Err(EngagementError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_without_calling_peer() {
        let (verifier, calls) = guarded(Behavior::Accept, 2);

        assert!(verifier.verify("t", "r").await.is_ok());
        assert!(verifier.verify("t", "r").await.is_ok());
        assert!(matches!(
            verifier.verify("t", "r").await,
            Err(EngagementError::Upstream(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
