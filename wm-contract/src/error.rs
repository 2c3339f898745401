//! Configuration-time and dependency-resolution error types.
//!
//! [`ContractError`] covers every failure the DI container and route
//! registry can produce. Status-bearing variants (`Validation`, `Reject`)
//! let a decision callback or validator short-circuit to a specific HTTP
//! status without the engine needing to special-case the dependency's name.

use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum ContractError {
    /// `resolve(name)` was called for a name with no registered descriptor
    /// and no well-known synthetic meaning.
    #[error("unknown dependency '{0}'")]
    UnknownDependency(String),

    /// The dependency graph contains a cycle reachable from the requested name.
    #[error("dependency cycle detected while resolving '{0}'")]
    Cycle(String),

    /// A user-provided callable raised/returned an error.
    #[error("dependency '{name}' failed: {message}")]
    Underlying {
        name: String,
        message: String,
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },

    /// A resolved value did not have the type the caller expected.
    #[error("dependency value did not match expected type '{expected}'")]
    TypeMismatch { expected: String },

    /// A required parameter of a registered callable has no matching
    /// synthetic or dependency — detected at first invocation.
    #[error("unbound parameter '{parameter}' required by dependency '{name}'")]
    UnboundParameter { name: String, parameter: String },

    /// A validator rejected its input with a specific status code.
    #[error("validation failed: {message}")]
    Validation { status: u16, message: String },

    /// Route registration conflict: same (method, normalized template) twice.
    #[error("route {method} {template} is already registered")]
    DuplicateRoute { method: String, template: String },

    /// A dependency name was registered more than once.
    #[error("dependency '{0}' is already registered")]
    DuplicateDependency(String),

    /// A path template segment was syntactically invalid.
    #[error("invalid path template '{0}': {1}")]
    InvalidPathTemplate(String, String),
}

impl ContractError {
    pub fn underlying(name: impl Into<String>, message: impl Into<String>) -> Self {
        ContractError::Underlying {
            name: name.into(),
            message: message.into(),
            source: None,
        }
    }
}
