//! Stable, non-leaking messages for end users.
//!
//! Internal error text names dependencies, hosts and queries. None of it
//! crosses this boundary: a [`UserFacingError`] carries a catalog code, a
//! catalog message and the correlation id support staff can look up.

use safeguard_core::{ErrorKind, Severity};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub code: &'static str,
    pub message: Cow<'static, str>,
}

/// Error as shown to an end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message} (reference: {reference})")]
pub struct UserFacingError {
    pub code: &'static str,
    pub message: Cow<'static, str>,
    pub kind: ErrorKind,
    pub severity: Severity,
    /// Correlation id of the failed call.
    pub reference: String,
}

/// Maps `(ErrorKind, Severity)` to a user message.
///
/// Every kind has an entry. Critical failures of dependency-side kinds get
/// the outage message instead of their kind's entry.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    entries: BTreeMap<ErrorKind, CatalogEntry>,
    outage: CatalogEntry,
}

impl MessageCatalog {
    pub fn new() -> Self {
        let entries = ErrorKind::ALL
            .iter()
            .map(|&kind| (kind, default_entry(kind)))
            .collect();
        Self {
            entries,
            outage: CatalogEntry {
                code: "outage",
                message: Cow::Borrowed(
                    "The service is experiencing a disruption. Please try again later.",
                ),
            },
        }
    }

    /// Replaces the message shown for `kind`.
    pub fn with_message(
        mut self,
        kind: ErrorKind,
        code: &'static str,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.entries.insert(
            kind,
            CatalogEntry {
                code,
                message: message.into(),
            },
        );
        self
    }

    /// Replaces the message shown for critical dependency failures.
    pub fn with_outage_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.outage.message = message.into();
        self
    }

    pub fn entry(&self, kind: ErrorKind) -> &CatalogEntry {
        self.entries.get(&kind).unwrap_or(&self.outage)
    }

    pub fn translate(
        &self,
        kind: ErrorKind,
        severity: Severity,
        reference: impl Into<String>,
    ) -> UserFacingError {
        let entry = if severity == Severity::Critical && !kind.is_caller_fault() {
            &self.outage
        } else {
            self.entry(kind)
        };
        UserFacingError {
            code: entry.code,
            message: entry.message.clone(),
            kind,
            severity,
            reference: reference.into(),
        }
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn default_entry(kind: ErrorKind) -> CatalogEntry {
    let (code, message) = match kind {
        ErrorKind::ServiceUnavailable => (
            "service_unavailable",
            "The service is temporarily unavailable. Please try again shortly.",
        ),
        ErrorKind::Timeout => (
            "timeout",
            "The request took too long to complete. Please try again.",
        ),
        ErrorKind::ValidationFailure => (
            "invalid_request",
            "The request could not be processed. Please check your input.",
        ),
        ErrorKind::PermissionDenied => (
            "permission_denied",
            "You do not have permission to perform this action.",
        ),
        ErrorKind::ResourceExhausted => (
            "busy",
            "The system is busy right now. Please try again in a moment.",
        ),
        ErrorKind::NotFound => ("not_found", "The requested item could not be found."),
        ErrorKind::Conflict => (
            "conflict",
            "The request conflicts with the current state. Please refresh and try again.",
        ),
        ErrorKind::Unknown => (
            "internal_error",
            "Something went wrong. Please try again later.",
        ),
    };
    CatalogEntry {
        code,
        message: Cow::Borrowed(message),
    }
}
