//! Dependency descriptors: the registration-time record of a named,
//! injectable value.

/// The lifetime over which a resolved value is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Cached for the lifetime of a single request.
    Request,
    /// Cached for the lifetime of the process, shared across requests.
    Session,
}

/// What a dependency's resolved value means to the decision machine. Plain
/// `Value` dependencies carry no special interpretation; every other kind
/// drives exactly one decision node or content-negotiation/validation
/// step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DependencyKind {
    Value,
    DecisionCallback,
    Validator,
    RendererSelector,
    EtagProvider,
    LastModifiedProvider,
    ResourceExistence,
    Authorization,
    Forbidden,
    ServiceAvailable,
    Malformed,
    Startup,
    Shutdown,
}

/// Registration-time record of an injectable dependency.
///
/// `param_names` is the ordered list of parameter names the callable
/// declares; the container resolves each one (well-known synthetic, then
/// named dependency) before invoking the callable. The callable itself is
/// stored separately by the engine's registry (it owns the `Arc<dyn Fn>>`),
/// since this crate has no opinion on the runtime representation of a
/// closure beyond its calling convention (see `crate::value`).
#[derive(Debug, Clone)]
pub struct DependencyDescriptor {
    pub name: String,
    pub scope: Scope,
    pub param_names: Vec<String>,
    pub kind: DependencyKind,
}

impl DependencyDescriptor {
    pub fn new(name: impl Into<String>, scope: Scope, kind: DependencyKind) -> Self {
        Self {
            name: name.into(),
            scope,
            param_names: Vec::new(),
            kind,
        }
    }

    pub fn with_params(mut self, params: Vec<impl Into<String>>) -> Self {
        self.param_names = params.into_iter().map(Into::into).collect();
        self
    }
}

/// Names the container can produce directly from the current `Request`,
/// without a registered descriptor.
pub const SYNTHETIC_NAMES: &[&str] = &[
    "request",
    "path_params",
    "query_params",
    "request_headers",
    "json_body",
    "body",
];

pub fn is_synthetic(name: &str) -> bool {
    SYNTHETIC_NAMES.contains(&name)
}
