//! Error types for the siteconfig operator
//!
//! Errors carry enough context (resource names, the operation that failed) to
//! be useful in a log line without a backtrace. The controller's error policy
//! uses [`Error::is_retryable`] to pick a requeue delay.

use std::time::Duration;

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for siteconfig operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// A namespaced resource arrived without a namespace
    #[error("{kind} {name} has no namespace")]
    MissingNamespace {
        /// Resource kind
        kind: String,
        /// Resource name
        name: String,
    },

    /// The per-reconciliation deadline expired before the store answered
    #[error("reconciliation of {resource} timed out after {elapsed:?}")]
    Timeout {
        /// namespace/name of the resource being reconciled
        resource: String,
        /// The deadline that was exceeded
        elapsed: Duration,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "patch")
        context: String,
    },
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

impl Error {
    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a missing-namespace error for the given resource
    pub fn missing_namespace(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::MissingNamespace {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a timeout error for the given resource
    pub fn timeout(resource: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            resource: resource.into(),
            elapsed,
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Conflicts (409) and throttling (429) are retried like any transport
    /// failure. Other 4xx responses and serialization failures need a fix
    /// elsewhere before a retry can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => match source {
                kube::Error::Api(ae) => {
                    ae.code == 409 || ae.code == 429 || !(400..500).contains(&ae.code)
                }
                _ => true,
            },
            Error::Serialization { .. } => false,
            Error::MissingNamespace { .. } => false,
            Error::Timeout { .. } => true,
            Error::Internal { .. } => true,
        }
    }

    /// Check if this error is an optimistic-concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 409)
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Internal { context, .. } => Some(context),
            _ => None,
        }
    }
}
