//! Dynamically-typed values that flow through the dependency graph.
//!
//! The source framework resolves dependencies via runtime parameter
//! introspection: a callable declares the *names* of what it needs and the
//! container supplies them. Rust has no such reflection, so parameter names
//! are resolved once at registration time (see `DependencyDescriptor`) and
//! the values themselves are carried as `Arc<dyn Any + Send + Sync>`,
//! downcast by whichever decision node or handler knows the expected type
//! for that name's convention. This keeps the hot path free of string
//! matching — only registration pays for the name lookup.

use crate::error::ContractError;
use crate::response::Response;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A single resolved dependency value, erased to `Any` for storage in caches
/// that hold heterogeneous values under their dependency name.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Boxed future returned by a dependency callable.
pub type DependencyFuture = Pin<Box<dyn Future<Output = Result<AnyValue, ContractError>> + Send>>;

/// A registered dependency's producer: takes its already-resolved parameters
/// (in declared order) and produces a value or a `ContractError`.
pub type DependencyCallable = Arc<dyn Fn(Vec<AnyValue>) -> DependencyFuture + Send + Sync>;

/// Boxed future returned by a route handler.
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<HandlerReturn, ContractError>> + Send>>;

/// A registered route handler: same calling convention as a dependency
/// callable, but its result is a tagged union of the shapes a
/// handler to return, rather than a single opaque value.
pub type HandlerCallable = Arc<dyn Fn(Vec<AnyValue>) -> HandlerFuture + Send + Sync>;

/// The outcome of `resource_exists`: a non-nil value both satisfies the
/// decision and provides the resource object under the dependency's name.
#[derive(Clone)]
pub enum ResourceState {
    Exists(AnyValue),
    Missing,
}

impl ResourceState {
    pub fn exists(&self) -> bool {
        matches!(self, ResourceState::Exists(_))
    }
}

/// The outcome of an `authorized` decision callback. A plain `bool` can't
/// carry a `WWW-Authenticate` hint for the 401 response, so authorization
/// callbacks return this instead.
#[derive(Debug, Clone)]
pub enum AuthDecision {
    Granted,
    Denied { www_authenticate: Option<String> },
}

impl AuthDecision {
    pub fn granted(&self) -> bool {
        matches!(self, AuthDecision::Granted)
    }
}

/// Tagged union covering every shape a handler is allowed to return.
///
/// Source handlers may return a bare value, a value paired with a status
/// override, a value with both a status and header overrides, `None`, or an
/// already-built `Response`. This enum gives each shape a distinct, matched
/// Rust variant instead of relying on runtime type inspection of a tuple.
pub enum HandlerReturn {
    Bare(AnyValue),
    WithStatus(AnyValue, u16),
    WithStatusAndHeaders(AnyValue, u16, crate::headers::CaseInsensitiveMultiMap),
    Empty,
    Explicit(Response),
}

/// Downcast a resolved `AnyValue`, producing a `TypeMismatch` on failure.
pub fn downcast<T: Send + Sync + 'static>(value: &AnyValue, what: &str) -> Result<Arc<T>, ContractError> {
    Arc::downcast::<T>(Arc::clone(value)).map_err(|_| ContractError::TypeMismatch {
        expected: what.to_string(),
    })
}
