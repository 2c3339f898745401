//! The dependency-injection container.
//!
//! Resolution is demand-driven and memoized: each name is resolved at most
//! once per scope, and the SESSION cache additionally single-flights
//! concurrent first resolutions across requests so a SESSION producer runs
//! exactly once per process lifetime.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{trace, warn};
use wm_contract::dependency::is_synthetic;
use wm_contract::{AnyValue, ContractError, DependencyCallable, DependencyDescriptor, Request, Scope};

/// Registration-time store of dependency descriptors and their callables,
/// plus the process-wide SESSION cache.
pub struct DiContainer {
    descriptors: HashMap<String, DependencyDescriptor>,
    callables: HashMap<String, DependencyCallable>,
    session_cache: DashMap<String, AnyValue>,
    session_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Default for DiContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl DiContainer {
    pub fn new() -> Self {
        Self {
            descriptors: HashMap::new(),
            callables: HashMap::new(),
            session_cache: DashMap::new(),
            session_locks: DashMap::new(),
        }
    }

    /// Register a dependency. A duplicate name is a configuration error
    /// detected at registration.
    pub fn register(
        &mut self,
        descriptor: DependencyDescriptor,
        callable: DependencyCallable,
    ) -> Result<(), ContractError> {
        if self.descriptors.contains_key(&descriptor.name) {
            return Err(ContractError::DuplicateDependency(descriptor.name.clone()));
        }
        self.callables.insert(descriptor.name.clone(), callable);
        self.descriptors.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn descriptor(&self, name: &str) -> Option<&DependencyDescriptor> {
        self.descriptors.get(name)
    }

    pub fn merge(&mut self, other: DiContainer) -> Result<(), ContractError> {
        for (name, descriptor) in other.descriptors {
            if self.descriptors.contains_key(&name) {
                return Err(ContractError::DuplicateDependency(name));
            }
            let callable = other.callables.get(&name).cloned().expect("callable present for every descriptor");
            self.descriptors.insert(name.clone(), descriptor);
            self.callables.insert(name, callable);
        }
        Ok(())
    }

    /// Seed the SESSION cache directly — used by `Application::startup` to
    /// install a startup handler's result under its own name.
    pub fn seed_session(&self, name: impl Into<String>, value: AnyValue) {
        self.session_cache.insert(name.into(), value);
    }

    pub fn session_value(&self, name: &str) -> Option<AnyValue> {
        self.session_cache.get(name).map(|v| Arc::clone(v.value()))
    }
}

/// Per-request DI scope: an empty REQUEST cache layered over the shared
/// SESSION cache, plus the in-flight "resolving" set used for cycle
/// detection. Dropped when the request finishes; never shared.
pub struct RequestScope<'a> {
    container: &'a DiContainer,
    request: &'a Request,
    request_cache: Mutex<HashMap<String, AnyValue>>,
    resolving: Mutex<HashSet<String>>,
}

impl<'a> RequestScope<'a> {
    pub fn new(container: &'a DiContainer, request: &'a Request) -> Self {
        Self {
            container,
            request,
            request_cache: Mutex::new(HashMap::new()),
            resolving: Mutex::new(HashSet::new()),
        }
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    pub fn container(&self) -> &DiContainer {
        self.container
    }

    /// Resolve `name`, consulting REQUEST then SESSION cache, producing
    /// synthetics directly, or recursively resolving a registered
    /// dependency's parameters before invoking its callable.
    pub async fn resolve(&self, name: &str) -> Result<AnyValue, ContractError> {
        if let Some(v) = self.request_cache.lock().await.get(name) {
            return Ok(Arc::clone(v));
        }
        if let Some(v) = self.container.session_value(name) {
            return Ok(v);
        }
        if is_synthetic(name) {
            let value = self.produce_synthetic(name)?;
            self.request_cache
                .lock()
                .await
                .insert(name.to_string(), Arc::clone(&value));
            return Ok(value);
        }

        let Some(descriptor) = self.container.descriptor(name) else {
            return Err(ContractError::UnknownDependency(name.to_string()));
        };

        {
            let mut resolving = self.resolving.lock().await;
            if resolving.contains(name) {
                return Err(ContractError::Cycle(name.to_string()));
            }
            resolving.insert(name.to_string());
        }

        let result = self.resolve_uncached(name, descriptor).await;

        self.resolving.lock().await.remove(name);
        result
    }

    async fn resolve_uncached(
        &self,
        name: &str,
        descriptor: &DependencyDescriptor,
    ) -> Result<AnyValue, ContractError> {
        // Resolved one at a time, not concurrently: two sibling parameters
        // can share a transitive dependency (a diamond — e.g. an etag
        // provider and a last-modified provider both taking the same
        // resource-existence dependency), and running them concurrently
        // would let both observe that shared name as "in flight" and either
        // raise a spurious cycle error or invoke its producer twice.
        // Resolving in order means the first occurrence completes and is
        // cached before any sibling that shares it is resolved.
        let mut args = Vec::with_capacity(descriptor.param_names.len());
        for param in &descriptor.param_names {
            trace!(dependency = name, parameter = %param, "resolving parameter");
            args.push(Box::pin(self.resolve(param)).await?);
        }

        let callable = self
            .container
            .callables
            .get(name)
            .expect("descriptor implies a registered callable");

        match descriptor.scope {
            Scope::Request => {
                let value = callable(args).await.map_err(|e| {
                    warn!(dependency = name, error = %e, "dependency producer failed");
                    e
                })?;
                self.request_cache
                    .lock()
                    .await
                    .insert(name.to_string(), Arc::clone(&value));
                Ok(value)
            }
            Scope::Session => self.resolve_session(name, callable, args).await,
        }
    }

    /// Single-flight SESSION resolution: the first caller to observe a miss
    /// computes the value under a per-name lock; later callers (in this or
    /// any other request) observe the cache hit and never invoke the
    /// producer again.
    async fn resolve_session(
        &self,
        name: &str,
        callable: &DependencyCallable,
        args: Vec<AnyValue>,
    ) -> Result<AnyValue, ContractError> {
        if let Some(v) = self.container.session_value(name) {
            return Ok(v);
        }
        let lock = self
            .container
            .session_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;
        if let Some(v) = self.container.session_value(name) {
            return Ok(v);
        }
        let value = callable(args).await?;
        self.container.seed_session(name.to_string(), Arc::clone(&value));
        Ok(value)
    }

    fn produce_synthetic(&self, name: &str) -> Result<AnyValue, ContractError> {
        match name {
            "request" => Ok(Arc::new(self.request.clone())),
            "path_params" => Ok(Arc::new(self.request.path_params.clone())),
            "query_params" => Ok(Arc::new(self.request.query_params.clone())),
            "request_headers" => Ok(Arc::new(self.request.headers.clone())),
            "body" => Ok(Arc::new(self.request.body.clone())),
            "json_body" => {
                let body = self.request.body.as_deref().unwrap_or(b"");
                let parsed: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
                    ContractError::underlying("json_body", format!("invalid JSON body: {e}"))
                })?;
                Ok(Arc::new(parsed))
            }
            other => Err(ContractError::UnknownDependency(other.to_string())),
        }
    }
}
