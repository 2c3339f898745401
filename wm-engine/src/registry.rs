//! Route storage and matching.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use wm_contract::{
    AnyValue, ContractError, HandlerCallable, Method, PathTemplate, RouteCapabilities,
};

/// `(value, request) -> bytes` — turns a handler's return value into the
/// bytes of a specific media type.
pub type RendererFn =
    Arc<dyn Fn(&AnyValue, &wm_contract::Request) -> Result<Vec<u8>, ContractError> + Send + Sync>;

/// The input counterpart to a renderer: bytes of a given Content-Type to a
/// structured value.
pub type ParserFn = Arc<dyn Fn(&[u8]) -> Result<AnyValue, ContractError> + Send + Sync>;

/// A single registered route: a method/template pair, its handler, the
/// decision callbacks and content-type handlers it locally binds, and the
/// capability flags computed from them at registration time.
pub struct Route {
    pub method: Method,
    pub template: PathTemplate,
    pub handler: HandlerCallable,
    pub handler_params: Vec<String>,

    pub authorized: Option<String>,
    pub forbidden: Option<String>,
    pub resource_exists: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub service_available: Option<String>,
    pub malformed: Option<String>,
    pub validators: Vec<String>,

    pub renderers: Vec<(String, RendererFn)>,
    pub parsers: Vec<(String, ParserFn)>,

    pub capabilities: RouteCapabilities,
}

impl Route {
    fn compute_capabilities(&self) -> RouteCapabilities {
        RouteCapabilities {
            needs_authorization: self.authorized.is_some(),
            needs_forbidden_check: self.forbidden.is_some(),
            needs_service_available_check: self.service_available.is_some(),
            needs_malformed_check: self.malformed.is_some(),
            needs_conditional: self.etag.is_some() || self.last_modified.is_some(),
            content_types_provided: self.renderers.iter().map(|(mt, _)| mt.clone()).collect(),
            content_types_accepted: self.parsers.iter().map(|(mt, _)| mt.clone()).collect(),
            has_validators: !self.validators.is_empty(),
        }
    }
}

/// Builder mirroring the application's registration helpers — chained, consumed by
/// `build()`, which compiles the path template and fills in capability flags.
pub struct RouteBuilder {
    method: Method,
    template: String,
    handler: HandlerCallable,
    handler_params: Vec<String>,
    authorized: Option<String>,
    forbidden: Option<String>,
    resource_exists: Option<String>,
    etag: Option<String>,
    last_modified: Option<String>,
    service_available: Option<String>,
    malformed: Option<String>,
    validators: Vec<String>,
    renderers: Vec<(String, RendererFn)>,
    parsers: Vec<(String, ParserFn)>,
}

pub type HandlerFut = Pin<Box<dyn Future<Output = Result<wm_contract::HandlerReturn, ContractError>> + Send>>;

impl RouteBuilder {
    pub fn new(
        method: Method,
        template: impl Into<String>,
        handler_params: Vec<impl Into<String>>,
        handler: impl Fn(Vec<AnyValue>) -> HandlerFut + Send + Sync + 'static,
    ) -> Self {
        Self {
            method,
            template: template.into(),
            handler: Arc::new(handler),
            handler_params: handler_params.into_iter().map(Into::into).collect(),
            authorized: None,
            forbidden: None,
            resource_exists: None,
            etag: None,
            last_modified: None,
            service_available: None,
            malformed: None,
            validators: Vec::new(),
            renderers: Vec::new(),
            parsers: Vec::new(),
        }
    }

    pub fn get(
        template: impl Into<String>,
        handler_params: Vec<impl Into<String>>,
        handler: impl Fn(Vec<AnyValue>) -> HandlerFut + Send + Sync + 'static,
    ) -> Self {
        Self::new(Method::Get, template, handler_params, handler)
    }

    pub fn post(
        template: impl Into<String>,
        handler_params: Vec<impl Into<String>>,
        handler: impl Fn(Vec<AnyValue>) -> HandlerFut + Send + Sync + 'static,
    ) -> Self {
        Self::new(Method::Post, template, handler_params, handler)
    }

    pub fn put(
        template: impl Into<String>,
        handler_params: Vec<impl Into<String>>,
        handler: impl Fn(Vec<AnyValue>) -> HandlerFut + Send + Sync + 'static,
    ) -> Self {
        Self::new(Method::Put, template, handler_params, handler)
    }

    pub fn patch(
        template: impl Into<String>,
        handler_params: Vec<impl Into<String>>,
        handler: impl Fn(Vec<AnyValue>) -> HandlerFut + Send + Sync + 'static,
    ) -> Self {
        Self::new(Method::Patch, template, handler_params, handler)
    }

    pub fn delete(
        template: impl Into<String>,
        handler_params: Vec<impl Into<String>>,
        handler: impl Fn(Vec<AnyValue>) -> HandlerFut + Send + Sync + 'static,
    ) -> Self {
        Self::new(Method::Delete, template, handler_params, handler)
    }

    pub fn authorized(mut self, dependency_name: impl Into<String>) -> Self {
        self.authorized = Some(dependency_name.into());
        self
    }

    pub fn forbidden(mut self, dependency_name: impl Into<String>) -> Self {
        self.forbidden = Some(dependency_name.into());
        self
    }

    pub fn resource_exists(mut self, dependency_name: impl Into<String>) -> Self {
        self.resource_exists = Some(dependency_name.into());
        self
    }

    pub fn etag(mut self, dependency_name: impl Into<String>) -> Self {
        self.etag = Some(dependency_name.into());
        self
    }

    pub fn last_modified(mut self, dependency_name: impl Into<String>) -> Self {
        self.last_modified = Some(dependency_name.into());
        self
    }

    pub fn service_available(mut self, dependency_name: impl Into<String>) -> Self {
        self.service_available = Some(dependency_name.into());
        self
    }

    pub fn malformed(mut self, dependency_name: impl Into<String>) -> Self {
        self.malformed = Some(dependency_name.into());
        self
    }

    pub fn validator(mut self, dependency_name: impl Into<String>) -> Self {
        self.validators.push(dependency_name.into());
        self
    }

    pub fn renderer(mut self, media_type: impl Into<String>, renderer: RendererFn) -> Self {
        self.renderers.push((media_type.into(), renderer));
        self
    }

    pub fn parser(mut self, media_type: impl Into<String>, parser: ParserFn) -> Self {
        self.parsers.push((media_type.into(), parser));
        self
    }

    pub fn build(self) -> Result<Route, ContractError> {
        let template = PathTemplate::parse(&self.template)?;
        let mut route = Route {
            method: self.method,
            template,
            handler: self.handler,
            handler_params: self.handler_params,
            authorized: self.authorized,
            forbidden: self.forbidden,
            resource_exists: self.resource_exists,
            etag: self.etag,
            last_modified: self.last_modified,
            service_available: self.service_available,
            malformed: self.malformed,
            validators: self.validators,
            renderers: self.renderers,
            parsers: self.parsers,
            capabilities: RouteCapabilities::default(),
        };
        route.capabilities = route.compute_capabilities();
        Ok(route)
    }
}

/// The result of matching a `(method, path)` pair against the registry.
pub enum MatchOutcome<'a> {
    Matched {
        route: &'a Route,
        path_params: HashMap<String, String>,
    },
    MethodNotAllowed {
        allowed: Vec<Method>,
    },
    NotFound,
}

/// Stores routes in registration order and matches incoming requests
/// against them.
#[derive(Default)]
pub struct RouteRegistry {
    routes: Vec<Route>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a route. A conflicting `(method, normalized template)` is a
    /// configuration error.
    pub fn add_route(&mut self, route: Route) -> Result<(), ContractError> {
        let key = route.template.normalized_key();
        for existing in &self.routes {
            if existing.method == route.method && existing.template.normalized_key() == key {
                return Err(ContractError::DuplicateRoute {
                    method: route.method.as_str().to_string(),
                    template: route.template.raw.clone(),
                });
            }
        }
        self.routes.push(route);
        Ok(())
    }

    pub fn merge(&mut self, mut other: RouteRegistry) -> Result<(), ContractError> {
        for route in other.routes.drain(..) {
            self.add_route(route)?;
        }
        Ok(())
    }

    /// Consume the registry, yielding its routes in registration order — used
    /// by `Application::mount` to rebase each route under a prefix.
    pub fn into_routes(self) -> Vec<Route> {
        self.routes
    }

    pub fn match_request(&self, method: Method, normalized_path: &str) -> MatchOutcome<'_> {
        for route in &self.routes {
            if route.method != method {
                continue;
            }
            if let Some(path_params) = route.template.matches(normalized_path) {
                return MatchOutcome::Matched { route, path_params };
            }
        }

        let allowed: Vec<Method> = self
            .routes
            .iter()
            .filter(|r| r.template.matches(normalized_path).is_some())
            .map(|r| r.method)
            .collect();

        if allowed.is_empty() {
            MatchOutcome::NotFound
        } else {
            MatchOutcome::MethodNotAllowed { allowed }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_handler() -> impl Fn(Vec<AnyValue>) -> HandlerFut + Send + Sync + 'static {
        |_args| Box::pin(async { Ok(wm_contract::HandlerReturn::Empty) })
    }

    #[test]
    fn registers_and_matches_exact_route() {
        let mut reg = RouteRegistry::new();
        let route = RouteBuilder::get("/hello", Vec::<String>::new(), noop_handler())
            .build()
            .unwrap();
        reg.add_route(route).unwrap();
        match reg.match_request(Method::Get, "/hello") {
            MatchOutcome::Matched { path_params, .. } => assert!(path_params.is_empty()),
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn duplicate_route_is_rejected() {
        let mut reg = RouteRegistry::new();
        reg.add_route(
            RouteBuilder::get("/hello", Vec::<String>::new(), noop_handler())
                .build()
                .unwrap(),
        )
        .unwrap();
        let err = reg
            .add_route(
                RouteBuilder::get("/hello", Vec::<String>::new(), noop_handler())
                    .build()
                    .unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, ContractError::DuplicateRoute { .. }));
    }

    #[test]
    fn method_mismatch_reports_allowed_methods() {
        let mut reg = RouteRegistry::new();
        reg.add_route(
            RouteBuilder::get("/x", Vec::<String>::new(), noop_handler())
                .build()
                .unwrap(),
        )
        .unwrap();
        match reg.match_request(Method::Post, "/x") {
            MatchOutcome::MethodNotAllowed { allowed } => assert_eq!(allowed, vec![Method::Get]),
            _ => panic!("expected method not allowed"),
        }
    }

    #[test]
    fn unknown_path_is_not_found() {
        let reg = RouteRegistry::new();
        assert!(matches!(
            reg.match_request(Method::Get, "/nope"),
            MatchOutcome::NotFound
        ));
    }

    #[test]
    fn capability_flags_reflect_bound_callbacks() {
        let route = RouteBuilder::get("/item/{id}", Vec::<String>::new(), noop_handler())
            .authorized("auth")
            .etag("etag")
            .validator("v1")
            .build()
            .unwrap();
        assert!(route.capabilities.needs_authorization);
        assert!(route.capabilities.needs_conditional);
        assert!(route.capabilities.has_validators);
        assert!(!route.capabilities.needs_forbidden_check);
    }
}
