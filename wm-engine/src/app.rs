//! The `Application` facade: the single object embedding code
//! composes against — route/dependency registration, lifecycle hooks, error
//! policy, and the one entry point, `execute`.

use std::sync::Arc;

use tracing::debug;
use wm_contract::dependency::{DependencyKind, Scope};
use wm_contract::{ContractError, DependencyCallable, DependencyDescriptor, Method, Request, Response};

use crate::container::{DiContainer, RequestScope};
use crate::errors::{ErrorHandlerFn, ErrorPolicy};
use crate::machine;
use crate::registry::{HandlerFut, RendererFn, Route, RouteBuilder, RouteRegistry};

/// Runtime limits the embedding application may override (the
/// in-process analogue of a config file, since the core performs no I/O).
#[derive(Debug, Clone)]
pub struct EngineLimits {
    pub max_uri_length: usize,
    pub default_content_type: String,
    pub default_error_media_type: String,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_uri_length: 8192,
            default_content_type: "application/json".to_string(),
            default_error_media_type: "application/json".to_string(),
        }
    }
}

impl EngineLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_uri_length(mut self, max: usize) -> Self {
        self.max_uri_length = max;
        self
    }

    pub fn with_default_error_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.default_error_media_type = media_type.into();
        self
    }
}

struct LifecycleHandler {
    name: String,
    param_names: Vec<String>,
    callable: DependencyCallable,
}

/// Composes the dependency container, route registry, default renderer set,
/// lifecycle handlers, and error policy into the single object adapters
/// drive.
pub struct Application {
    container: DiContainer,
    registry: RouteRegistry,
    pub(crate) default_renderers: Vec<(String, RendererFn)>,
    startup_handlers: Vec<LifecycleHandler>,
    shutdown_handlers: Vec<LifecycleHandler>,
    error_policy: ErrorPolicy,
    limits: EngineLimits,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self::with_limits(EngineLimits::default())
    }

    pub fn with_limits(limits: EngineLimits) -> Self {
        Self {
            container: DiContainer::new(),
            registry: RouteRegistry::new(),
            default_renderers: Vec::new(),
            startup_handlers: Vec::new(),
            shutdown_handlers: Vec::new(),
            error_policy: ErrorPolicy::new(limits.default_error_media_type.clone()),
            limits,
        }
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    pub fn container(&self) -> &DiContainer {
        &self.container
    }

    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    pub fn error_policy(&self) -> &ErrorPolicy {
        &self.error_policy
    }

    /// Register a compiled route.
    pub fn route(&mut self, route: Route) -> Result<&mut Self, ContractError> {
        debug!(method = %route.method, template = %route.template.raw, "registering route");
        self.registry.add_route(route)?;
        Ok(self)
    }

    pub fn get(
        &mut self,
        template: impl Into<String>,
        handler_params: Vec<impl Into<String>>,
        handler: impl Fn(Vec<wm_contract::AnyValue>) -> crate::registry::HandlerFut + Send + Sync + 'static,
    ) -> Result<&mut Self, ContractError> {
        self.route(RouteBuilder::get(template, handler_params, handler).build()?)
    }

    pub fn post(
        &mut self,
        template: impl Into<String>,
        handler_params: Vec<impl Into<String>>,
        handler: impl Fn(Vec<wm_contract::AnyValue>) -> crate::registry::HandlerFut + Send + Sync + 'static,
    ) -> Result<&mut Self, ContractError> {
        self.route(RouteBuilder::post(template, handler_params, handler).build()?)
    }

    pub fn put(
        &mut self,
        template: impl Into<String>,
        handler_params: Vec<impl Into<String>>,
        handler: impl Fn(Vec<wm_contract::AnyValue>) -> crate::registry::HandlerFut + Send + Sync + 'static,
    ) -> Result<&mut Self, ContractError> {
        self.route(RouteBuilder::put(template, handler_params, handler).build()?)
    }

    pub fn patch(
        &mut self,
        template: impl Into<String>,
        handler_params: Vec<impl Into<String>>,
        handler: impl Fn(Vec<wm_contract::AnyValue>) -> crate::registry::HandlerFut + Send + Sync + 'static,
    ) -> Result<&mut Self, ContractError> {
        self.route(RouteBuilder::patch(template, handler_params, handler).build()?)
    }

    pub fn delete(
        &mut self,
        template: impl Into<String>,
        handler_params: Vec<impl Into<String>>,
        handler: impl Fn(Vec<wm_contract::AnyValue>) -> crate::registry::HandlerFut + Send + Sync + 'static,
    ) -> Result<&mut Self, ContractError> {
        self.route(RouteBuilder::delete(template, handler_params, handler).build()?)
    }

    /// Mount a sub-registry's routes under `prefix`, rebasing each route's
    /// path template.
    pub fn mount(&mut self, prefix: &str, sub: RouteRegistry) -> Result<&mut Self, ContractError> {
        for mut route in sub.into_routes() {
            let rebased = format!("{}{}", prefix.trim_end_matches('/'), route.template.raw);
            route.template = wm_contract::PathTemplate::parse(&rebased)?;
            self.registry.add_route(route)?;
        }
        Ok(self)
    }

    /// Register a named dependency.
    pub fn dependency(
        &mut self,
        descriptor: DependencyDescriptor,
        callable: DependencyCallable,
    ) -> Result<&mut Self, ContractError> {
        debug!(name = %descriptor.name, scope = ?descriptor.scope, "registering dependency");
        self.container.register(descriptor, callable)?;
        Ok(self)
    }

    /// Convenience for `dependency` with `Scope::Request` and `DependencyKind::Value`.
    pub fn value(
        &mut self,
        name: impl Into<String>,
        param_names: Vec<impl Into<String>>,
        callable: DependencyCallable,
    ) -> Result<&mut Self, ContractError> {
        let descriptor = DependencyDescriptor::new(name, Scope::Request, DependencyKind::Value)
            .with_params(param_names);
        self.dependency(descriptor, callable)
    }

    pub fn default_renderer(&mut self, media_type: impl Into<String>, renderer: RendererFn) -> &mut Self {
        self.default_renderers.push((media_type.into(), renderer));
        self
    }

    pub fn error_handler(&mut self, status: u16, handler: ErrorHandlerFn) -> &mut Self {
        self.error_policy.register(status, None, handler);
        self
    }

    pub fn error_handler_for_media_type(
        &mut self,
        status: u16,
        media_type: impl Into<String>,
        handler: ErrorHandlerFn,
    ) -> &mut Self {
        self.error_policy.register(status, Some(media_type.into()), handler);
        self
    }

    /// Register an `on_startup` handler. Its declared parameters are
    /// resolved before every request is served; its return value becomes a
    /// SESSION dependency under `name`.
    pub fn on_startup(
        &mut self,
        name: impl Into<String>,
        param_names: Vec<impl Into<String>>,
        callable: DependencyCallable,
    ) -> &mut Self {
        self.startup_handlers.push(LifecycleHandler {
            name: name.into(),
            param_names: param_names.into_iter().map(Into::into).collect(),
            callable,
        });
        self
    }

    /// Register an `on_shutdown` handler. Declared parameters are typically
    /// SESSION dependency names the handler needs for cleanup; its return
    /// value is discarded.
    pub fn on_shutdown(
        &mut self,
        name: impl Into<String>,
        param_names: Vec<impl Into<String>>,
        callable: DependencyCallable,
    ) -> &mut Self {
        self.shutdown_handlers.push(LifecycleHandler {
            name: name.into(),
            param_names: param_names.into_iter().map(Into::into).collect(),
            callable,
        });
        self
    }

    /// Run startup handlers in registration order. Each handler's
    /// parameters are resolved against a throwaway request scope — only
    /// SESSION-cached values and synthetics are meaningful this early.
    pub async fn startup(&self) -> Result<(), ContractError> {
        let placeholder = Request::new(Method::Get, "/");
        for handler in &self.startup_handlers {
            debug!(name = %handler.name, "running startup handler");
            let scope = RequestScope::new(&self.container, &placeholder);
            let mut args = Vec::with_capacity(handler.param_names.len());
            for param in &handler.param_names {
                args.push(scope.resolve(param).await?);
            }
            let value = (handler.callable)(args).await?;
            self.container.seed_session(handler.name.clone(), value);
        }
        Ok(())
    }

    /// Run shutdown handlers in registration order.
    pub async fn shutdown(&self) -> Result<(), ContractError> {
        let placeholder = Request::new(Method::Get, "/");
        for handler in &self.shutdown_handlers {
            debug!(name = %handler.name, "running shutdown handler");
            let scope = RequestScope::new(&self.container, &placeholder);
            let mut args = Vec::with_capacity(handler.param_names.len());
            for param in &handler.param_names {
                args.push(scope.resolve(param).await?);
            }
            (handler.callable)(args).await?;
        }
        Ok(())
    }

    /// The single entry point adapters call. Never panics and never
    /// returns an error — every failure is mapped to a `Response` by the
    /// machine's error policy.
    pub async fn execute(&self, request: Request) -> Response {
        machine::run(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RouteBuilder;
    use std::sync::atomic::{AtomicI64, Ordering};
    use wm_contract::HandlerReturn;

    #[tokio::test]
    async fn startup_seeds_session_and_handler_reuses_it() {
        let mut app = Application::new();
        app.default_renderer(
            "application/json",
            Arc::new(|v, _r| {
                let n: Arc<i64> = wm_contract::value::downcast(v, "i64").unwrap();
                Ok(n.to_string().into_bytes())
            }),
        );
        app.on_startup(
            "db",
            Vec::<String>::new(),
            Arc::new(|_args| Box::pin(async { Ok(Arc::new(0i64) as wm_contract::AnyValue) })),
        );

        let counter = Arc::new(AtomicI64::new(0));
        let counter_clone = Arc::clone(&counter);
        app.value(
            "next",
            vec!["db"],
            Arc::new(move |_args| {
                let counter = Arc::clone(&counter_clone);
                Box::pin(async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(Arc::new(n) as wm_contract::AnyValue)
                })
            }),
        )
        .unwrap();

        app.route(
            RouteBuilder::get("/count", vec!["next"], |args| {
                Box::pin(async move { Ok(HandlerReturn::Bare(args[0].clone())) })
            })
            .build()
            .unwrap(),
        )
        .unwrap();

        app.startup().await.unwrap();

        for expected in 1..=3i64 {
            let resp = app.execute(Request::new(Method::Get, "/count")).await;
            assert_eq!(resp.status, 200);
            assert_eq!(resp.body, expected.to_string().into_bytes());
        }
    }
}
