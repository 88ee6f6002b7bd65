//! OES error types.
//!
//! Every failure of a forwarding-state operation is an [`OesError`]; each
//! variant maps to exactly one [`OesStatus`].

use crate::status::OesStatus;
use oes_types::ParseError;
use std::fmt;
use thiserror::Error;

/// Error type for OES operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OesError {
    /// General failure.
    #[error("Operation failed: {message}")]
    Failed { message: String },

    #[error("Not initialized: {what}")]
    NotInitialized { what: String },

    /// A table or pool has no room for another entry.
    #[error("No resources: {resource}")]
    NoResources { resource: String },

    /// The operation does not accept this command.
    #[error("Command {cmd} unsupported by {op}")]
    CmdUnsupported { cmd: String, op: &'static str },

    /// A required argument was not supplied.
    #[error("Missing parameter: {param}")]
    ParamNull { param: &'static str },

    #[error("Invalid parameter: {message}")]
    ParamError { message: String },

    #[error("Parameter {param} = {value} out of range [{min}..{max}]")]
    ParamExceedsRange {
        param: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Entry not found: {entry}")]
    EntryNotFound { entry: String },

    #[error("Entry already exists: {entry}")]
    EntryAlreadyExists { entry: String },

    /// The object is still referenced and cannot be removed.
    #[error("Resource in use: {object}")]
    ResourceInUse { object: String },
}

impl OesError {
    /// Returns the status code this error is reported as.
    pub fn status(&self) -> OesStatus {
        match self {
            OesError::Failed { .. } => OesStatus::Error,
            OesError::NotInitialized { .. } => OesStatus::NotInitialized,
            OesError::NoResources { .. } => OesStatus::NoResources,
            OesError::CmdUnsupported { .. } => OesStatus::CmdUnsupported,
            OesError::ParamNull { .. } => OesStatus::ParamNull,
            OesError::ParamError { .. } => OesStatus::ParamError,
            OesError::ParamExceedsRange { .. } => OesStatus::ParamExceedsRange,
            OesError::EntryNotFound { .. } => OesStatus::EntryNotFound,
            OesError::EntryAlreadyExists { .. } => OesStatus::EntryAlreadyExists,
            OesError::ResourceInUse { .. } => OesStatus::ResourceInUse,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        OesError::Failed {
            message: message.into(),
        }
    }

    pub fn no_resources(resource: impl Into<String>) -> Self {
        OesError::NoResources {
            resource: resource.into(),
        }
    }

    pub fn param(message: impl Into<String>) -> Self {
        OesError::ParamError {
            message: message.into(),
        }
    }

    /// Unwraps an optional argument, failing with `PARAM_NULL`.
    pub fn require<T>(value: Option<T>, param: &'static str) -> OesResult<T> {
        value.ok_or(OesError::ParamNull { param })
    }

    pub fn not_found(entry: impl Into<String>) -> Self {
        OesError::EntryNotFound {
            entry: entry.into(),
        }
    }

    pub fn already_exists(entry: impl Into<String>) -> Self {
        OesError::EntryAlreadyExists {
            entry: entry.into(),
        }
    }

    pub fn in_use(object: impl Into<String>) -> Self {
        OesError::ResourceInUse {
            object: object.into(),
        }
    }

    /// Checks `value` against an inclusive range.
    pub fn check_range(param: &'static str, value: i64, min: i64, max: i64) -> OesResult<()> {
        if value < min || value > max {
            return Err(OesError::ParamExceedsRange {
                param,
                value,
                min,
                max,
            });
        }
        Ok(())
    }
}

impl From<ParseError> for OesError {
    fn from(err: ParseError) -> Self {
        OesError::param(err.to_string())
    }
}

/// Result type for OES operations.
pub type OesResult<T> = Result<T, OesError>;

/// Failure of a batch operation.
///
/// Entries that were applied successfully stay applied; `failed` holds the
/// entries that were rejected and `error` the reason of the first rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure<T> {
    pub error: OesError,
    pub failed: Vec<T>,
}

impl<T> BatchFailure<T> {
    pub fn status(&self) -> OesStatus {
        self.error.status()
    }
}

impl<T> fmt::Display for BatchFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} entries failed, first error: {}", self.failed.len(), self.error)
    }
}

impl<T: fmt::Debug> std::error::Error for BatchFailure<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<T> From<OesError> for BatchFailure<T> {
    fn from(error: OesError) -> Self {
        BatchFailure {
            error,
            failed: Vec::new(),
        }
    }
}
