//! Diagnostic context attached to every protected call.

use serde::Serialize;
use std::collections::BTreeMap;
use tokio::time::Instant;

/// Immutable description of one protected call.
///
/// Built once per invocation and passed by value through the wrapper chain,
/// so every failure, event and alert can be traced back to the caller.
///
/// ```
/// use safeguard_core::ErrorContext;
///
/// let ctx = ErrorContext::builder("load_wallet")
///     .user_id("user-42")
///     .metadata("wallet_id", 7)
///     .build();
///
/// assert_eq!(ctx.operation(), "load_wallet");
/// assert_eq!(ctx.user_id(), Some("user-42"));
/// assert_eq!(ctx.metadata().get("wallet_id"), Some(&serde_json::json!(7)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorContext {
    operation: String,
    correlation_id: String,
    user_id: Option<String>,
    #[serde(skip)]
    timestamp: Instant,
    metadata: BTreeMap<String, serde_json::Value>,
}

impl ErrorContext {
    /// Creates a context for `operation` with a fresh correlation id.
    pub fn new(operation: impl Into<String>) -> Self {
        Self::builder(operation).build()
    }

    /// Starts building a context for `operation`.
    pub fn builder(operation: impl Into<String>) -> ErrorContextBuilder {
        ErrorContextBuilder {
            operation: operation.into(),
            correlation_id: None,
            user_id: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// When the context was created.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Caller-supplied metadata, ordered by key.
    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Returns a copy with one more metadata entry.
    ///
    /// The original stays untouched; contexts are never mutated in place.
    pub fn with_metadata(
        &self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        let mut next = self.clone();
        next.metadata.insert(key.into(), value.into());
        next
    }
}

/// Builder for [`ErrorContext`].
#[derive(Debug, Clone)]
pub struct ErrorContextBuilder {
    operation: String,
    correlation_id: Option<String>,
    user_id: Option<String>,
    metadata: BTreeMap<String, serde_json::Value>,
}

impl ErrorContextBuilder {
    /// Uses an existing correlation id, e.g. one propagated from an inbound request.
    ///
    /// Default: a random UUID v4.
    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Sets the user on whose behalf the call runs.
    pub fn user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    /// Adds a metadata entry. A repeated key overwrites the earlier value.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Freezes the context, stamping it with the current instant.
    pub fn build(self) -> ErrorContext {
        ErrorContext {
            operation: self.operation,
            correlation_id: self
                .correlation_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            user_id: self.user_id,
            timestamp: Instant::now(),
            metadata: self.metadata,
        }
    }
}
