use crate::{RetryEngine, RetryError, RetryPolicy};
use futures::future::BoxFuture;
use safeguard_core::{Classify, ErrorContext};
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// A Tower [`Layer`] that retries failed requests under a [`RetryPolicy`].
///
/// Requests must be `Clone`: each attempt sends its own copy.
///
/// ```
/// use safeguard_core::ErrorKind;
/// use safeguard_retry::{RetryEngine, RetryPolicy};
/// use tower::{service_fn, ServiceBuilder};
///
/// let engine = RetryEngine::default();
/// let service = ServiceBuilder::new()
///     .layer(engine.layer(RetryPolicy::default()))
///     .service(service_fn(|req: String| async move { Ok::<_, ErrorKind>(req) }));
/// ```
#[derive(Clone, Debug)]
pub struct RetryLayer {
    engine: RetryEngine,
    policy: Arc<RetryPolicy>,
}

impl RetryLayer {
    pub fn new(engine: RetryEngine, policy: RetryPolicy) -> Self {
        Self {
            engine,
            policy: Arc::new(policy),
        }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RetryService {
            inner: service,
            engine: self.engine.clone(),
            policy: Arc::clone(&self.policy),
        }
    }
}

/// Service produced by [`RetryLayer`].
#[derive(Clone, Debug)]
pub struct RetryService<S> {
    inner: S,
    engine: RetryEngine,
    policy: Arc<RetryPolicy>,
}

impl<S, Req> Service<Req> for RetryService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Classify + fmt::Display + Send + 'static,
    Req: Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = RetryError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    // Readiness is driven per attempt on a fresh clone.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let service = self.inner.clone();
        let engine = self.engine.clone();
        let policy = Arc::clone(&self.policy);

        Box::pin(async move {
            let context = ErrorContext::new(engine.name());
            engine
                .execute(&policy, &context, move || service.clone().oneshot(req.clone()))
                .await
        })
    }
}
