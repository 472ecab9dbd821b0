use crate::{CircuitBreaker, CircuitBreakerError};
use futures::future::BoxFuture;
use safeguard_core::Classify;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower layer that routes calls through a shared [`CircuitBreaker`].
///
/// Every service produced by the layer shares the breaker's state, so a
/// tower stack and direct callers of the same named breaker agree on
/// whether the dependency is isolated.
///
/// ```rust
/// use safeguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
/// use safeguard_core::ErrorKind;
/// use tower::{ServiceBuilder, service_fn};
///
/// let breaker = CircuitBreaker::new(CircuitBreakerConfig::builder().name("db").build().unwrap());
///
/// let service = ServiceBuilder::new()
///     .layer(breaker.layer())
///     .service(service_fn(|req: String| async move { Ok::<_, ErrorKind>(req) }));
/// ```
#[derive(Clone, Debug)]
pub struct CircuitBreakerLayer {
    breaker: CircuitBreaker,
}

impl CircuitBreakerLayer {
    /// Creates a layer around an existing breaker.
    pub fn new(breaker: CircuitBreaker) -> Self {
        Self { breaker }
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreakerService {
            inner: service,
            breaker: self.breaker.clone(),
        }
    }
}

/// A Tower service guarded by a circuit breaker.
#[derive(Clone, Debug)]
pub struct CircuitBreakerService<S> {
    inner: S,
    breaker: CircuitBreaker,
}

impl<S> CircuitBreakerService<S> {
    /// The breaker guarding this service.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<S, Req> Service<Req> for CircuitBreakerService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Classify + Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let breaker = self.breaker.clone();
        // Take the service that was driven to readiness, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let permit = breaker.try_acquire()?;
            let result = inner.call(req).await;
            permit.record(&result);
            result.map_err(CircuitBreakerError::Inner)
        })
    }
}
