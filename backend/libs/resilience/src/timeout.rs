/// Deadline wrapper for calls to peers
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug)]
pub enum TimeoutError<E> {
    Elapsed {
        operation: &'static str,
        elapsed: Duration,
    },
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for TimeoutError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutError::Elapsed { operation, elapsed } => {
                write!(f, "{} timed out after {:?}", operation, elapsed)
            }
            TimeoutError::Failed(e) => write!(f, "{}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for TimeoutError<E> {}

/// Run a fallible future under a deadline, keeping its error type intact.
pub async fn with_timeout<F, T, E>(
    operation: &'static str,
    duration: Duration,
    future: F,
) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(duration, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TimeoutError::Failed(e)),
        Err(_) => {
            tracing::warn!(operation, timeout_ms = duration.as_millis() as u64, "Operation timed out");
            Err(TimeoutError::Elapsed {
                operation,
                elapsed: duration,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_success() {
        let result = with_timeout("lookup", Duration::from_secs(1), async { Ok::<_, String>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_timeout_elapsed() {
        let result = with_timeout("lookup", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, String>(42)
        })
        .await;

        assert!(matches!(
            result,
            Err(TimeoutError::Elapsed { operation: "lookup", .. })
        ));
    }

    #[tokio::test]
    async fn test_inner_error_is_preserved() {
        let result = with_timeout("lookup", Duration::from_secs(1), async {
            Err::<i32, _>("operation failed")
        })
        .await;

        assert!(matches!(result, Err(TimeoutError::Failed("operation failed"))));
    }
}
