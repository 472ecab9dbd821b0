//! `protect()`: one operation through bulkhead, breaker, retry and timeout.

use crate::messages::UserFacingError;
use crate::Resilience;
use futures::future::BoxFuture;
use futures::FutureExt;
use safeguard_bulkhead::Bulkhead;
use safeguard_circuitbreaker::{CallPermit, CircuitBreaker};
use safeguard_core::{Classify, ConfigError, ErrorContext, ErrorKind, ResilienceError, Severity};
use safeguard_monitor::ErrorEvent;
use safeguard_retry::RetryPolicy;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Alternative producer run once every protection failed.
///
/// Receives the kind of the final failure and the call's context.
pub type Fallback<T, E> =
    Arc<dyn Fn(ErrorKind, ErrorContext) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

#[derive(Debug, Clone)]
enum RetrySelection {
    Policy(RetryPolicy),
    /// Looked up from the config source by operation type.
    Lookup(String),
}

/// What to wrap an operation in. Built once per call site.
///
/// Everything is optional except the operation name: without a breaker name
/// no breaker is consulted, without a retry policy the operation runs once.
pub struct ProtectConfig<T, E> {
    operation_name: String,
    circuit_breaker_name: Option<String>,
    bulkhead_name: Option<String>,
    retry: Option<RetrySelection>,
    timeout: Option<Duration>,
    fallback: Option<Fallback<T, E>>,
    user_friendly_errors: bool,
}

impl<T, E> ProtectConfig<T, E> {
    /// `operation_name` labels every log line, event and alert of the call.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            circuit_breaker_name: None,
            bulkhead_name: None,
            retry: None,
            timeout: None,
            fallback: None,
            user_friendly_errors: false,
        }
    }

    /// Routes the call through the named breaker.
    pub fn circuit_breaker(mut self, name: impl Into<String>) -> Self {
        self.circuit_breaker_name = Some(name.into());
        self
    }

    /// Runs the call inside a slot of the named bulkhead.
    pub fn bulkhead(mut self, name: impl Into<String>) -> Self {
        self.bulkhead_name = Some(name.into());
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(RetrySelection::Policy(policy));
        self
    }

    /// Uses the config source's policy for `operation_type`.
    pub fn retry_config(mut self, operation_type: impl Into<String>) -> Self {
        self.retry = Some(RetrySelection::Lookup(operation_type.into()));
        self
    }

    /// Bounds every single attempt, not the whole retry sequence.
    ///
    /// A timed-out attempt is dropped and fails with
    /// [`ErrorKind::Timeout`], which is retryable by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Runs `fallback` when the call fails for good. Its result is returned
    /// as is; a failing fallback is reported but never retried.
    ///
    /// The fallback receives only the final [`ErrorKind`] and the call's
    /// [`ErrorContext`]. Anything else it needs, such as a cache handle or
    /// the original request, has to be captured by the closure.
    ///
    /// ```
    /// use safeguard::ProtectConfig;
    /// use safeguard_core::ErrorKind;
    /// use std::sync::Arc;
    ///
    /// let cached = Arc::new(vec!["bestsellers".to_string()]);
    /// let config = ProtectConfig::<Vec<String>, ErrorKind>::new("recommendations")
    ///     .fallback(move |_kind, _context| {
    ///         let cached = Arc::clone(&cached);
    ///         async move { Ok(cached.as_ref().clone()) }
    ///     });
    /// # let _ = config;
    /// ```
    pub fn fallback<F, Fut>(mut self, fallback: F) -> Self
    where
        F: Fn(ErrorKind, ErrorContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.fallback = Some(Arc::new(move |kind, context| fallback(kind, context).boxed()));
        self
    }

    /// Surfaces failures as [`ProtectError::UserFacing`] catalog messages.
    pub fn user_friendly_errors(mut self, enabled: bool) -> Self {
        self.user_friendly_errors = enabled;
        self
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn circuit_breaker_name(&self) -> Option<&str> {
        self.circuit_breaker_name.as_deref()
    }

    pub fn bulkhead_name(&self) -> Option<&str> {
        self.bulkhead_name.as_deref()
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

impl<T, E> Clone for ProtectConfig<T, E> {
    fn clone(&self) -> Self {
        Self {
            operation_name: self.operation_name.clone(),
            circuit_breaker_name: self.circuit_breaker_name.clone(),
            bulkhead_name: self.bulkhead_name.clone(),
            retry: self.retry.clone(),
            timeout: self.timeout,
            fallback: self.fallback.clone(),
            user_friendly_errors: self.user_friendly_errors,
        }
    }
}

impl<T, E> fmt::Debug for ProtectConfig<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectConfig")
            .field("operation_name", &self.operation_name)
            .field("circuit_breaker_name", &self.circuit_breaker_name)
            .field("bulkhead_name", &self.bulkhead_name)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("fallback", &self.fallback.is_some())
            .field("user_friendly_errors", &self.user_friendly_errors)
            .finish()
    }
}

/// Failure of a protected call.
#[derive(Debug)]
pub enum ProtectError<E> {
    /// The classified failure, with user-friendly errors off.
    Failed(ResilienceError<E>),
    /// The catalog message, with user-friendly errors on.
    UserFacing(UserFacingError),
    /// A named breaker or bulkhead could not be built from its settings.
    /// The operation did not run.
    Misconfigured(ConfigError),
}

impl<E> ProtectError<E> {
    /// The classified failure, unless it was translated for end users.
    pub fn into_failure(self) -> Option<ResilienceError<E>> {
        match self {
            ProtectError::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_failure(&self) -> Option<&ResilienceError<E>> {
        match self {
            ProtectError::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn user_facing(&self) -> Option<&UserFacingError> {
        match self {
            ProtectError::UserFacing(err) => Some(err),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for ProtectError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtectError::Failed(err) => err.fmt(f),
            ProtectError::UserFacing(err) => err.fmt(f),
            ProtectError::Misconfigured(err) => write!(f, "misconfigured protection: {err}"),
        }
    }
}

impl<E> std::error::Error for ProtectError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtectError::Failed(err) => err.source(),
            ProtectError::UserFacing(_) => None,
            ProtectError::Misconfigured(err) => Some(err),
        }
    }
}

impl<E: Classify> Classify for ProtectError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            ProtectError::Failed(err) => err.kind(),
            ProtectError::UserFacing(err) => err.kind,
            ProtectError::Misconfigured(_) => ErrorKind::Unknown,
        }
    }
}

struct Resolved {
    bulkhead: Option<Bulkhead>,
    breaker: Option<CircuitBreaker>,
    policy: RetryPolicy,
}

impl Resilience {
    /// Runs `operation` under `config` with a fresh context.
    pub async fn protect<T, E, F, Fut>(
        &self,
        config: &ProtectConfig<T, E>,
        operation: F,
    ) -> Result<T, ProtectError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let context = ErrorContext::new(config.operation_name.as_str());
        self.protect_with_context(config, context, operation).await
    }

    /// Runs `operation` under `config`, reporting with `context`.
    ///
    /// The outcome is recorded exactly once with the monitor, whichever
    /// stage ended the call.
    pub async fn protect_with_context<T, E, F, Fut>(
        &self,
        config: &ProtectConfig<T, E>,
        context: ErrorContext,
        operation: F,
    ) -> Result<T, ProtectError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        self.ensure_evaluator();
        let resolved = match self.resolve(config) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::error!(
                    operation = %config.operation_name,
                    correlation_id = context.correlation_id(),
                    error = %err,
                    "protection is misconfigured"
                );
                return Err(if config.user_friendly_errors {
                    ProtectError::UserFacing(self.messages().translate(
                        ErrorKind::Unknown,
                        Severity::High,
                        context.correlation_id(),
                    ))
                } else {
                    ProtectError::Misconfigured(err)
                });
            }
        };

        let err = match self.run(config, &resolved, &context, operation).await {
            Ok(value) => {
                self.monitor().record_success(&context);
                tracing::debug!(
                    operation = %config.operation_name,
                    correlation_id = context.correlation_id(),
                    "protected call succeeded"
                );
                return Ok(value);
            }
            Err(err) => err,
        };

        let kind = err.kind();
        let severity = severity_of(&err);
        let mut message = err.to_string();

        if let Some(fallback) = &config.fallback {
            match fallback(kind, context.clone()).await {
                Ok(value) => {
                    message.push_str("; served by fallback");
                    self.report(&context, &err, severity, message);
                    tracing::info!(
                        operation = %config.operation_name,
                        correlation_id = context.correlation_id(),
                        %kind,
                        "fallback served the call"
                    );
                    return Ok(value);
                }
                Err(fallback_err) => {
                    message.push_str(&format!("; fallback failed: {fallback_err}"));
                }
            }
        }

        tracing::warn!(
            operation = %config.operation_name,
            correlation_id = context.correlation_id(),
            %kind,
            %severity,
            error = %message,
            "protected call failed"
        );
        self.report(&context, &err, severity, message);

        if config.user_friendly_errors {
            Err(ProtectError::UserFacing(self.messages().translate(
                kind,
                severity,
                context.correlation_id(),
            )))
        } else {
            Err(ProtectError::Failed(err))
        }
    }

    fn resolve<T, E>(&self, config: &ProtectConfig<T, E>) -> Result<Resolved, ConfigError> {
        let bulkhead = config
            .bulkhead_name
            .as_deref()
            .map(|name| self.bulkhead(name))
            .transpose()?;
        let breaker = config
            .circuit_breaker_name
            .as_deref()
            .map(|name| self.circuit_breaker(name))
            .transpose()?;
        let policy = match &config.retry {
            Some(RetrySelection::Policy(policy)) => policy.clone(),
            Some(RetrySelection::Lookup(operation_type)) => self.retry_policy(operation_type),
            None => RetryPolicy::no_retry(),
        };
        Ok(Resolved {
            bulkhead,
            breaker,
            policy,
        })
    }

    async fn run<T, E, F, Fut>(
        &self,
        config: &ProtectConfig<T, E>,
        resolved: &Resolved,
        context: &ErrorContext,
        mut operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let _slot = match &resolved.bulkhead {
            Some(bulkhead) => Some(bulkhead.enter().await?),
            None => None,
        };
        let permit = match &resolved.breaker {
            Some(breaker) => Some(breaker.try_acquire()?),
            None => None,
        };
        let permit: Option<&CallPermit> = permit.as_ref();
        let timeout = config.timeout;
        let operation_name = config.operation_name.as_str();

        self.retry_engine()
            .execute(&resolved.policy, context, move || {
                // Later attempts stop as soon as the circuit opens.
                let attempt = match permit {
                    Some(permit) if permit.circuit_opened() => None,
                    _ => Some(operation()),
                };
                async move {
                    let Some(attempt) = attempt else {
                        let name = permit.map(|p| p.breaker().name().to_string());
                        return Err(ResilienceError::CircuitOpen {
                            name: name.unwrap_or_default(),
                        });
                    };
                    let result = match timeout {
                        Some(after) => match tokio::time::timeout(after, attempt).await {
                            Ok(result) => result.map_err(ResilienceError::Application),
                            Err(_) => Err(ResilienceError::Timeout {
                                operation: operation_name.to_string(),
                                after,
                            }),
                        },
                        None => attempt.await.map_err(ResilienceError::Application),
                    };
                    if let Some(permit) = permit {
                        permit.record(&result);
                    }
                    result
                }
            })
            .await
            .map_err(ResilienceError::from)
    }

    fn report<E: Classify>(
        &self,
        context: &ErrorContext,
        err: &ResilienceError<E>,
        severity: Severity,
        message: String,
    ) {
        let event = if err.is_bulkhead_full() {
            ErrorEvent::capacity_rejection(context.clone())
        } else {
            ErrorEvent::failure(err.kind(), context.clone()).with_severity(severity)
        };
        self.monitor().record(event.with_message(message));
    }
}

/// Severity of a final failure. A dependency that kept failing through every
/// retry ranks one level above a single failure of the same kind.
fn severity_of<E: Classify>(err: &ResilienceError<E>) -> Severity {
    let base = err.kind().default_severity();
    if !err.is_retry_exhausted() {
        return base;
    }
    match base {
        Severity::Low => Severity::Medium,
        Severity::Medium => Severity::High,
        Severity::High | Severity::Critical => Severity::Critical,
    }
}
