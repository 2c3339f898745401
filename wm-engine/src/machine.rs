//! The decision state machine: a linear walk through named nodes,
//! each short-circuiting to a terminal `Response` on failure. Nodes are
//! plain async functions driven by a loop in `run`, not an allocated graph —
//! the route's pre-computed capability flags decide which nodes actually run.

use tracing::{info, trace, warn};

use wm_contract::conditional::ConditionalHeaders;
use wm_contract::value::downcast;
use wm_contract::{AuthDecision, CaseInsensitiveMultiMap, ContractError, HandlerReturn, Method, Request, Response, ResourceState};

use crate::app::Application;
use crate::conditional::{self, ConditionalOutcome};
use crate::container::RequestScope;
use crate::errors::EngineError;
use crate::negotiation::{select_parser, select_renderer, SelectedRenderer};
use crate::registry::{MatchOutcome, Route};

/// Entry point used by `Application::execute`. Normalizes the path, drives
/// the request through every applicable decision node, and always returns a
/// `Response` — no error escapes this function.
pub async fn run(app: &Application, mut request: Request) -> Response {
    let start = std::time::Instant::now();
    request.path = Request::normalized_path(&request.path);
    info!(method = %request.method, path = %request.path, "request received");

    let outcome = drive(app, &mut request).await;

    let response = match outcome {
        Ok(response) => response,
        Err(err) => {
            let mut response = app.error_policy().build_error(&err, &request);
            match &err {
                EngineError::MethodNotAllowed { allowed, .. } => {
                    response.headers.set("Allow", allowed.join(", "));
                }
                EngineError::Unauthorized {
                    www_authenticate: Some(hint),
                } => {
                    response.headers.set("WWW-Authenticate", hint.clone());
                }
                _ => {}
            }
            response
        }
    };

    info!(
        status = response.status,
        elapsed_us = start.elapsed().as_micros() as u64,
        "request completed"
    );
    response
}

async fn drive(app: &Application, request: &mut Request) -> Result<Response, EngineError> {
    // 1. route_exists
    let (route, path_params) = match app.registry().match_request(request.method, &request.path) {
        MatchOutcome::Matched { route, path_params } => (route, path_params),
        MatchOutcome::MethodNotAllowed { allowed } => {
            return Err(EngineError::MethodNotAllowed {
                method: request.method.as_str().to_string(),
                path: request.path.clone(),
                allowed: allowed.iter().map(|m| m.as_str().to_string()).collect(),
            });
        }
        MatchOutcome::NotFound => {
            return Err(EngineError::RouteNotFound {
                method: request.method.as_str().to_string(),
                path: request.path.clone(),
            });
        }
    };
    request.path_params = path_params;

    let scope = RequestScope::new(app.container(), request);

    // 2. service_available
    if route.capabilities.needs_service_available_check {
        let name = route.service_available.as_deref().expect("capability implies dependency");
        if !resolve_bool(&scope, name).await? {
            trace!(node = "service_available", "short-circuit: 503");
            return Err(EngineError::ServiceUnavailable);
        }
    }

    // 3. known_method — guaranteed by the closed `Method` enum; retained for
    // symmetry with the source decision graph.

    // 4. uri_too_long
    if request.path.len() > app.limits().max_uri_length {
        trace!(node = "uri_too_long", "short-circuit: 414");
        return Err(EngineError::UriTooLong);
    }

    // 5. method_allowed — guaranteed by the registry match above.

    // 6. malformed_request
    if route.capabilities.needs_malformed_check {
        let name = route.malformed.as_deref().expect("capability implies dependency");
        if resolve_bool(&scope, name).await? {
            trace!(node = "malformed_request", "short-circuit: 400");
            return Err(EngineError::BadRequest("malformed request".to_string()));
        }
    }

    // 7. authorized
    if route.capabilities.needs_authorization {
        let name = route.authorized.as_deref().expect("capability implies dependency");
        let value = scope
            .resolve(name)
            .await
            .map_err(|e| EngineError::from_contract_error(name, e))?;
        let decision: std::sync::Arc<AuthDecision> = downcast(&value, "AuthDecision")?;
        if let AuthDecision::Denied { www_authenticate } = &*decision {
            trace!(node = "authorized", "short-circuit: 401");
            return Err(EngineError::Unauthorized {
                www_authenticate: www_authenticate.clone(),
            });
        }
    }

    // 8. forbidden
    if route.capabilities.needs_forbidden_check {
        let name = route.forbidden.as_deref().expect("capability implies dependency");
        if resolve_bool(&scope, name).await? {
            trace!(node = "forbidden", "short-circuit: 403");
            return Err(EngineError::Forbidden);
        }
    }

    // 9. content_headers_valid — a parser must exist for a body-carrying
    // request's declared Content-Type.
    let content_type = request.headers.get("content-type").map(str::to_string);
    if request.method.carries_body() && request.body.is_some() {
        require_parser(route, content_type.as_deref())?;
    }

    // 10. resource_exists
    if let Some(name) = &route.resource_exists {
        let value = scope
            .resolve(name)
            .await
            .map_err(|e| EngineError::from_contract_error(name, e))?;
        let state: std::sync::Arc<ResourceState> = downcast(&value, "ResourceState")?;
        if !state.exists() && request.method != Method::Post {
            trace!(node = "resource_exists", "short-circuit: 404");
            return Err(EngineError::RouteNotFound {
                method: request.method.as_str().to_string(),
                path: request.path.clone(),
            });
        }
    }

    // 11. conditional gate
    if route.capabilities.needs_conditional {
        let headers = ConditionalHeaders::parse(
            request.headers.get("if-match"),
            request.headers.get("if-none-match"),
            request.headers.get("if-modified-since"),
            request.headers.get("if-unmodified-since"),
        );
        if headers.is_present() {
            let outcome = conditional::evaluate(
                &scope,
                &headers,
                route.etag.as_deref(),
                route.last_modified.as_deref(),
                route.resource_exists.as_deref(),
            )
            .await
            .map_err(|e| EngineError::from_contract_error("conditional", e))?;
            match outcome {
                ConditionalOutcome::Proceed => {}
                ConditionalOutcome::NotModified { etag } => {
                    trace!(node = "conditional", "short-circuit: 304");
                    return Err(EngineError::NotModified { etag });
                }
                ConditionalOutcome::PreconditionFailed => {
                    trace!(node = "conditional", "short-circuit: 412");
                    return Err(EngineError::PreconditionFailed);
                }
            }
        }
    }

    // 12. content_types_provided
    let accept = request.headers.get("accept");
    let selected_renderer = select_renderer(&route.renderers, &app.default_renderers, accept)
        .ok_or(EngineError::NotAcceptable)?;

    // 13. content_types_accepted — re-checked for PUT/PATCH/POST bodies now
    // that resource_exists has run; same condition as node 9.
    if matches!(request.method, Method::Put | Method::Patch | Method::Post) && request.body.is_some() {
        require_parser(route, content_type.as_deref())?;
    }

    // 14. validate
    for name in &route.validators {
        scope
            .resolve(name)
            .await
            .map_err(|e| EngineError::from_contract_error(name, e))?;
    }

    // 15. execute_and_render
    execute_and_render(&scope, route, request, &selected_renderer).await
}

fn require_parser(route: &Route, content_type: Option<&str>) -> Result<(), EngineError> {
    let content_type = content_type.unwrap_or("application/octet-stream");
    if select_parser(route, content_type).is_none() {
        trace!(node = "content_headers_valid", "short-circuit: 415");
        return Err(EngineError::UnsupportedMediaType(content_type.to_string()));
    }
    Ok(())
}

async fn resolve_bool(scope: &RequestScope<'_>, name: &str) -> Result<bool, EngineError> {
    let value = scope
        .resolve(name)
        .await
        .map_err(|e| EngineError::from_contract_error(name, e))?;
    let flag: std::sync::Arc<bool> = downcast(&value, "bool")?;
    Ok(*flag)
}

async fn execute_and_render(
    scope: &RequestScope<'_>,
    route: &Route,
    request: &Request,
    selected_renderer: &SelectedRenderer,
) -> Result<Response, EngineError> {
    let mut args = Vec::with_capacity(route.handler_params.len());
    for name in &route.handler_params {
        let value = scope
            .resolve(name)
            .await
            .map_err(|e| EngineError::from_contract_error(name, e))?;
        args.push(value);
    }

    let handler_return = (route.handler)(args).await.map_err(|e| match e {
        ContractError::Validation { status, message } => {
            EngineError::ValidationFailed { status, message }
        }
        other => {
            warn!(route = %route.template.raw, error = %other, "handler failed");
            EngineError::HandlerError(other.to_string())
        }
    })?;

    let mut response = marshal(handler_return, route.method, request, selected_renderer)?;

    if let Some(name) = &route.etag {
        if let Ok(value) = scope.resolve(name).await {
            if let Ok(tag) = downcast::<String>(&value, "etag") {
                response.headers.set("ETag", (*tag).clone());
            }
        }
    }
    if let Some(name) = &route.last_modified {
        if let Ok(value) = scope.resolve(name).await {
            if let Ok(dt) = downcast::<chrono::DateTime<chrono::Utc>>(&value, "last_modified") {
                response.headers.set("Last-Modified", dt.to_rfc2822());
            }
        }
    }

    Ok(response)
}

/// Marshal a handler's return value into a terminal `Response`.
fn marshal(
    handler_return: HandlerReturn,
    method: Method,
    request: &Request,
    selected_renderer: &SelectedRenderer,
) -> Result<Response, EngineError> {
    match handler_return {
        HandlerReturn::Explicit(response) => Ok(response),
        HandlerReturn::Empty => Ok(Response::new(204)),
        HandlerReturn::Bare(value) => {
            render(&value, default_status(method), CaseInsensitiveMultiMap::new(), request, selected_renderer)
        }
        HandlerReturn::WithStatus(value, status) => {
            render(&value, status, CaseInsensitiveMultiMap::new(), request, selected_renderer)
        }
        HandlerReturn::WithStatusAndHeaders(value, status, headers) => {
            render(&value, status, headers, request, selected_renderer)
        }
    }
}

fn render(
    value: &wm_contract::AnyValue,
    status: u16,
    header_overrides: CaseInsensitiveMultiMap,
    request: &Request,
    selected_renderer: &SelectedRenderer,
) -> Result<Response, EngineError> {
    let bytes = (selected_renderer.render)(value, request)
        .map_err(|e| EngineError::HandlerError(e.to_string()))?;
    let mut response = Response::new(status)
        .with_header("Content-Type", selected_renderer.media_type.clone())
        .with_body(bytes);
    for (name, value) in header_overrides.iter() {
        response.headers.set(name, value.to_string());
    }
    Ok(response)
}

/// Default status for a handler's bare return: 201 for POST, 200 otherwise
/// (see DESIGN.md for the reasoning).
fn default_status(method: Method) -> u16 {
    if method == Method::Post {
        201
    } else {
        200
    }
}

impl From<ContractError> for EngineError {
    fn from(err: ContractError) -> Self {
        EngineError::from_contract_error("dependency", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Application;
    use crate::registry::RouteBuilder;
    use std::sync::Arc;
    use wm_contract::DependencyDescriptor;
    use wm_contract::dependency::{DependencyKind, Scope};

    fn json_renderer() -> crate::registry::RendererFn {
        Arc::new(|value, _req| {
            let v = downcast::<serde_json::Value>(value, "json").map_err(|e| ContractError::underlying("renderer", e.to_string()))?;
            Ok(serde_json::to_vec(&*v).unwrap())
        })
    }

    #[tokio::test]
    async fn simple_get_returns_rendered_body() {
        let mut app = Application::new();
        app.default_renderer("application/json", json_renderer());
        app.route(
            RouteBuilder::get("/hello", Vec::<String>::new(), |_args| {
                Box::pin(async {
                    Ok(HandlerReturn::Bare(Arc::new(
                        serde_json::json!({"message": "Hello, World!"}),
                    )))
                })
            })
            .build()
            .unwrap(),
        )
        .unwrap();

        let req = Request::new(Method::Get, "/hello").with_header("Accept", "application/json");
        let resp = run(&app, req).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.headers.get("content-type"), Some("application/json"));
        assert_eq!(resp.body, serde_json::to_vec(&serde_json::json!({"message": "Hello, World!"})).unwrap());
    }

    #[tokio::test]
    async fn missing_authorization_is_rejected() {
        let mut app = Application::new();
        app.default_renderer("application/json", json_renderer());
        app.dependency(
            DependencyDescriptor::new("auth", Scope::Request, DependencyKind::Authorization)
                .with_params(vec!["request_headers"]),
            Arc::new(|args| {
                Box::pin(async move {
                    let headers: Arc<wm_contract::CaseInsensitiveMultiMap> =
                        downcast(&args[0], "headers")?;
                    let granted = headers.get("authorization") == Some("Bearer t");
                    Ok(Arc::new(if granted {
                        AuthDecision::Granted
                    } else {
                        AuthDecision::Denied { www_authenticate: None }
                    }) as wm_contract::AnyValue)
                })
            }),
        )
        .unwrap();
        app.route(
            RouteBuilder::get("/secret", Vec::<String>::new(), |_args| {
                Box::pin(async { Ok(HandlerReturn::Bare(Arc::new(serde_json::json!({})))) })
            })
            .authorized("auth")
            .build()
            .unwrap(),
        )
        .unwrap();

        let denied = run(&app, Request::new(Method::Get, "/secret")).await;
        assert_eq!(denied.status, 401);

        let granted = run(
            &app,
            Request::new(Method::Get, "/secret").with_header("authorization", "Bearer t"),
        )
        .await;
        assert_eq!(granted.status, 200);
    }

    #[tokio::test]
    async fn method_mismatch_reports_allow_header() {
        let mut app = Application::new();
        app.default_renderer("application/json", json_renderer());
        app.route(
            RouteBuilder::get("/x", Vec::<String>::new(), |_args| {
                Box::pin(async { Ok(HandlerReturn::Empty) })
            })
            .build()
            .unwrap(),
        )
        .unwrap();

        let resp = run(&app, Request::new(Method::Post, "/x")).await;
        assert_eq!(resp.status, 405);
        assert_eq!(resp.headers.get("allow"), Some("GET"));
    }
}
