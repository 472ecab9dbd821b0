//! Tower layer implementation for the bulkhead.

use crate::bulkhead::Bulkhead;
use crate::error::BulkheadError;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that routes calls through a shared [`Bulkhead`].
///
/// ```
/// use safeguard_bulkhead::{Bulkhead, BulkheadConfig, BulkheadError};
/// use tower::{ServiceBuilder, service_fn};
///
/// let bulkhead = Bulkhead::new(BulkheadConfig::builder().capacity(10).build().unwrap());
///
/// let service = ServiceBuilder::new()
///     .layer(bulkhead.layer())
///     .service(service_fn(|req: String| async move { Ok::<_, BulkheadError>(req) }));
/// ```
#[derive(Clone, Debug)]
pub struct BulkheadLayer {
    bulkhead: Bulkhead,
}

impl BulkheadLayer {
    /// Creates a layer around an existing bulkhead.
    pub fn new(bulkhead: Bulkhead) -> Self {
        Self { bulkhead }
    }
}

impl<S> Layer<S> for BulkheadLayer {
    type Service = BulkheadService<S>;

    fn layer(&self, service: S) -> Self::Service {
        BulkheadService {
            inner: service,
            bulkhead: self.bulkhead.clone(),
        }
    }
}

/// Service that holds a bulkhead slot for the duration of each call.
#[derive(Clone, Debug)]
pub struct BulkheadService<S> {
    inner: S,
    bulkhead: Bulkhead,
}

impl<S> BulkheadService<S> {
    pub fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }
}

impl<S, Request> Service<Request> for BulkheadService<S>
where
    S: Service<Request> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: From<BulkheadError> + Send + 'static,
    Request: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let bulkhead = self.bulkhead.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let _slot = bulkhead.enter().await?;
            inner.call(request).await
        })
    }
}
