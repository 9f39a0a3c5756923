//! Error types for reconciliation.
//!
//! The set of conditions a caller can observe is closed: validation failures,
//! a missing resource, a failed or timed-out task, transport failures, HTTP
//! statuses the protocol gives no meaning to, conflicts and cancellation.
//! Errors from the HTTP library never leak through; they are folded into
//! [`Error::Transport`].

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::types::ResourceKind;

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Desired state violates a local rule; nothing was sent.
    Validation,
    /// The resource does not exist.
    NotFound,
    /// Network or decode failure (transient, retryable).
    Network,
    /// Gate answered with a status the protocol does not define.
    Protocol,
    /// The control plane reported a terminal task failure.
    TaskFailed,
    /// Polling ran out of time; the task may still complete.
    Timeout,
    /// Remote object exists but cannot be matched to the desired one.
    Conflict,
    /// Waiting was cancelled by the caller.
    Cancelled,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Whether this error can be safely ignored by a delete ("already gone").
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid resource definition",
            Self::NotFound => "Resource not found",
            Self::Network => "Network connectivity issue",
            Self::Protocol => "Unexpected Gate response",
            Self::TaskFailed => "Task failed",
            Self::Timeout => "Timed out waiting for task",
            Self::Conflict => "Conflicting remote resource",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Fix the resource definition; no request was sent",
            Self::NotFound => "Check the resource name and owning application",
            Self::Network => "Check that Gate is reachable and try again",
            Self::Protocol => "Inspect the response body; Gate or its backends may be unhealthy",
            Self::TaskFailed => "Check the task in the Spinnaker UI, then re-run apply",
            Self::Timeout => "The task may still finish; re-run apply later to re-check",
            Self::Conflict => "Remove or rename the conflicting remote object",
            Self::Cancelled => "Re-run apply to continue",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Local validation failures, raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required name is empty.
    #[error("name must not be empty")]
    EmptyName,

    /// No constraint is known for the provider.
    #[error("cloud provider {provider} is not supported")]
    UnsupportedProvider {
        /// Provider tag as declared.
        provider: String,
    },

    /// Name does not fully match the provider pattern.
    #[error("name {name} for cloud provider {provider} doesn't match {pattern}")]
    NamePatternMismatch {
        /// Offending name.
        name: String,
        /// Provider tag.
        provider: String,
        /// Pattern that was not matched.
        pattern: String,
    },

    /// Name exceeds the provider length limit.
    #[error("name {name} for cloud provider {provider} is {length} characters, limit is {max}")]
    NameTooLong {
        /// Offending name.
        name: String,
        /// Provider tag.
        provider: String,
        /// Actual length in characters.
        length: usize,
        /// Provider limit.
        max: usize,
    },

    /// Plain identifier contains characters other than alphanumerics and `-`.
    #[error("{name} may only contain alphanumeric characters and hyphens")]
    InvalidIdentifier {
        /// Offending identifier.
        name: String,
    },

    /// Access level outside READ, WRITE, EXECUTE.
    #[error("access {access} is not supported")]
    UnsupportedAccessLevel {
        /// Access level as declared.
        access: String,
    },

    /// The same principal was declared twice for one access level.
    #[error("permission {access} for {principal} is declared more than once")]
    DuplicatePermission {
        /// Repeated principal.
        principal: String,
        /// Access level it was repeated under.
        access: String,
    },

    /// A constraint pattern does not compile.
    #[error("pattern for cloud provider {provider} is invalid: {message}")]
    InvalidPattern {
        /// Provider tag.
        provider: String,
        /// Compiler message.
        message: String,
    },

    /// A nested document cannot be used.
    #[error("invalid document: {reason}")]
    InvalidDocument {
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors surfaced by the reconciler and the task waiter.
#[derive(Debug, Error)]
pub enum Error {
    /// Resource does not exist on the control plane.
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource name.
        name: String,
    },

    /// Local validation failed.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The control plane reported a terminal failure.
    #[error("task {task} failed: {reason}")]
    TaskFailed {
        /// Task id.
        task: String,
        /// Failure reason reported by the control plane.
        reason: String,
    },

    /// Polling exceeded its time budget.
    #[error("task {task} did not finish within {}s", .elapsed.as_secs())]
    Timeout {
        /// Task id.
        task: String,
        /// Time spent waiting.
        elapsed: Duration,
    },

    /// Network or decode failure.
    #[error("transport error: {cause}")]
    Transport {
        /// Underlying cause.
        cause: String,
    },

    /// HTTP status with no defined meaning at this step.
    #[error("unexpected response {code}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        code: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// Remote object exists but no identifier could be resolved for it.
    #[error("{kind} {name} exists but {reason}")]
    Conflict {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource name.
        name: String,
        /// Why it cannot be reconciled.
        reason: String,
    },

    /// Waiting was cancelled.
    #[error("cancelled while waiting for task {task}")]
    Cancelled {
        /// Task id.
        task: String,
    },
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Validation(_) => ErrorCategory::Validation,
            Error::TaskFailed { .. } => ErrorCategory::TaskFailed,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Transport { .. } => ErrorCategory::Network,
            Error::UnexpectedStatus { .. } => ErrorCategory::Protocol,
            Error::Conflict { .. } => ErrorCategory::Conflict,
            Error::Cancelled { .. } => ErrorCategory::Cancelled,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error can be safely ignored.
    pub fn is_ignorable(&self) -> bool {
        self.category().is_ignorable()
    }

    /// Build an error from an unexpected response.
    pub fn unexpected(response: &gatekit::RawResponse) -> Self {
        Error::UnexpectedStatus {
            code: response.status,
            body: response.body.clone(),
        }
    }
}

impl From<gatekit::Error> for Error {
    fn from(err: gatekit::Error) -> Self {
        Error::Transport {
            cause: err.to_string(),
        }
    }
}
