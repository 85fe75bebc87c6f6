use std::sync::Arc;
use std::time::Duration;

use failsafe::backoff::Exponential;
use failsafe::failure_policy::{consecutive_failures, ConsecutiveFailures};
use failsafe::futures::CircuitBreaker;
pub use failsafe::FailurePredicate;
use failsafe::{backoff, Config, StateMachine};
use futures_core::TryFuture;

pub type Error<E> = failsafe::Error<E>;
type FailurePolicy = ConsecutiveFailures<Exponential>;

/// Number of consecutive failures after which an endpoint is skipped
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// One alternative guarded by its own circuit breaker
struct Guarded<T> {
    value: Arc<T>,
    breaker: StateMachine<FailurePolicy, ()>,
}

impl<T> Clone for Guarded<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            breaker: self.breaker.clone(),
        }
    }
}

impl<E, T: FailurePredicate<E>> FailurePredicate<E> for &Guarded<T> {
    fn is_err(&self, err: &E) -> bool {
        self.value.is_err(err)
    }
}

impl<T> Guarded<T> {
    fn new(value: T) -> Self {
        let backoff = backoff::exponential(Duration::from_secs(10), Duration::from_secs(60));

        Self {
            value: Arc::new(value),
            breaker: Config::new()
                .failure_policy(consecutive_failures(MAX_CONSECUTIVE_FAILURES, backoff))
                .build(),
        }
    }

    async fn call<F>(&self, f: impl FnOnce(Arc<T>) -> F) -> Result<F::Ok, Error<F::Error>>
    where
        F: TryFuture,
        T: FailurePredicate<F::Error>,
    {
        self.breaker.call_with(self, f(self.value.clone())).await
    }

    fn is_available(&self) -> bool {
        self.breaker.is_call_permitted()
    }
}

/// Ordered list of interchangeable values (typically RPC endpoints). Calls go to the first
/// value whose circuit breaker is closed; a value is skipped after
/// [`MAX_CONSECUTIVE_FAILURES`] failures as decided by its [`FailurePredicate`].
pub struct WithFallback<T> {
    values: Vec<Guarded<T>>,
}

impl<T> Clone for WithFallback<T> {
    fn clone(&self) -> Self {
        Self { values: self.values.clone() }
    }
}

impl<T> Default for WithFallback<T> {
    fn default() -> Self {
        Self { values: vec![] }
    }
}

impl<T> WithFallback<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, alternative: T) -> Self {
        self.values.push(Guarded::new(alternative));
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Runs `f` once against the first available value and returns its outcome.
    /// Returns [`Error::Rejected`] when every breaker is open.
    pub async fn call<F>(&self, f: impl FnOnce(Arc<T>) -> F) -> Result<F::Ok, Error<F::Error>>
    where
        F: TryFuture,
        T: FailurePredicate<F::Error>,
    {
        match self.values.iter().find(|x| x.is_available()) {
            Some(value) => value.call(f).await,
            None => Err(Error::Rejected),
        }
    }

    /// Runs `f` against each available value in order until one succeeds.
    pub async fn call_all<F>(&self, f: impl Fn(Arc<T>) -> F) -> Result<F::Ok, Error<F::Error>>
    where
        F: TryFuture,
        T: FailurePredicate<F::Error>,
    {
        for value in self.values.iter().filter(|x| x.is_available()) {
            if let Ok(result) = value.call(&f).await {
                return Ok(result);
            }
        }

        Err(Error::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use failsafe::FailurePredicate;

    use crate::service::fallback::{Error, WithFallback};

    #[derive(Debug, PartialEq)]
    enum EndpointError {
        Unreachable,
        Rejected,
    }

    struct Endpoint(Arc<dyn Fn(u64) -> Result<u64, EndpointError> + Send + Sync>);

    impl Endpoint {
        fn new(f: impl Fn(u64) -> Result<u64, EndpointError> + Send + Sync + 'static) -> Self {
            Self(Arc::new(f))
        }

        fn gas_price(&self, epoch: u64) -> Result<u64, EndpointError> {
            self.0(epoch)
        }
    }

    impl FailurePredicate<EndpointError> for Endpoint {
        fn is_err(&self, err: &EndpointError) -> bool {
            matches!(err, EndpointError::Unreachable)
        }
    }

    #[tokio::test]
    async fn empty_fallback_rejects() {
        let endpoints: WithFallback<Endpoint> = WithFallback::new();

        let result = endpoints.call(|x| async move { x.gas_price(0) }).await;
        assert!(matches!(result, Err(Error::Rejected)))
    }

    #[tokio::test]
    async fn single_endpoint_is_called() {
        let endpoints = WithFallback::new().with(Endpoint::new(|_| Ok(750)));

        let result = endpoints.call(|x| async move { x.gas_price(0) }).await;
        assert!(matches!(result, Ok(750)))
    }

    #[tokio::test]
    async fn failing_endpoint_is_not_skipped_on_first_failure() {
        let endpoints = WithFallback::new()
            .with(Endpoint::new(|_| Err(EndpointError::Unreachable)))
            .with(Endpoint::new(|_| Ok(1000)));

        let result = endpoints.call(|x| async move { x.gas_price(0) }).await;
        assert!(matches!(result, Err(Error::Inner(EndpointError::Unreachable))))
    }

    #[tokio::test]
    async fn failing_endpoint_is_eventually_skipped() {
        let endpoints = WithFallback::new()
            .with(Endpoint::new(|_| Err(EndpointError::Unreachable)))
            .with(Endpoint::new(|_| Ok(1000)));

        let mut failures = 0;
        loop {
            match endpoints.call(|x| async move { x.gas_price(0) }).await {
                Ok(price) => {
                    assert_eq!(price, 1000);
                    break;
                },
                Err(_) => failures += 1,
            }
        }

        assert_eq!(failures, 3)
    }

    #[tokio::test]
    async fn non_failure_errors_keep_endpoint_available() {
        let endpoints = WithFallback::new()
            .with(Endpoint::new(|_| Err(EndpointError::Rejected)))
            .with(Endpoint::new(|_| Ok(1000)));

        for _ in 0..10 {
            let result = endpoints.call(|x| async move { x.gas_price(0) }).await;
            assert!(matches!(result, Err(Error::Inner(EndpointError::Rejected))))
        }
    }

    #[tokio::test]
    async fn call_all_moves_to_next_endpoint() {
        let endpoints = WithFallback::new()
            .with(Endpoint::new(|_| Err(EndpointError::Unreachable)))
            .with(Endpoint::new(|epoch| Ok(epoch + 1)));

        let result = endpoints.call_all(|x| async move { x.gas_price(41) }).await;
        assert!(matches!(result, Ok(42)))
    }
}
