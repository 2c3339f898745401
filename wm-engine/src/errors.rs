//! `EngineError` and the central error-response constructor `build_error`.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use wm_contract::{ContractError, MediaType, Request, Response};

use crate::conditional;

/// Every recoverable condition the decision machine can produce. Each
/// variant carries the context `build_error` needs to render a response
/// without consulting the machine again.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum EngineError {
    #[error("no route matches {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: Vec<String>,
    },

    #[error("request URI exceeds the configured length limit")]
    UriTooLong,

    #[error("method {0} is not implemented")]
    NotImplemented(String),

    #[error("service unavailable")]
    ServiceUnavailable,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("not acceptable")]
    NotAcceptable,

    #[error("unauthorized")]
    Unauthorized { www_authenticate: Option<String> },

    #[error("forbidden")]
    Forbidden,

    #[error("precondition failed")]
    PreconditionFailed,

    #[error("not modified")]
    NotModified { etag: Option<String> },

    #[error("validation failed: {message}")]
    ValidationFailed { status: u16, message: String },

    #[error("handler failed: {0}")]
    HandlerError(String),

    #[error("dependency resolution failed: {0}")]
    DependencyError(ContractError),
}

impl EngineError {
    /// The default status for this error kind. A registered
    /// error handler may still override the body; the status is fixed here
    /// except where the kind itself carries one (`ValidationFailed`).
    pub fn status(&self) -> u16 {
        match self {
            EngineError::RouteNotFound { .. } => 404,
            EngineError::MethodNotAllowed { .. } => 405,
            EngineError::UriTooLong => 414,
            EngineError::NotImplemented(_) => 501,
            EngineError::ServiceUnavailable => 503,
            EngineError::BadRequest(_) => 400,
            EngineError::UnsupportedMediaType(_) => 415,
            EngineError::NotAcceptable => 406,
            EngineError::Unauthorized { .. } => 401,
            EngineError::Forbidden => 403,
            EngineError::PreconditionFailed => 412,
            EngineError::NotModified { .. } => 304,
            EngineError::ValidationFailed { status, .. } => *status,
            EngineError::HandlerError(_) => 500,
            EngineError::DependencyError(_) => 500,
        }
    }

    /// Classify a dependency-resolution failure into the `EngineError` the
    /// machine should route to `build_error`. A validator surfaces its
    /// carried status as `ValidationFailed`; everything else is a generic
    /// 500-class `DependencyError`.
    pub fn from_contract_error(name: &str, err: ContractError) -> Self {
        match err {
            ContractError::Validation { status, message } => {
                EngineError::ValidationFailed { status, message }
            }
            other => EngineError::DependencyError(ContractError::underlying(
                name,
                other.to_string(),
            )),
        }
    }
}

/// `(error, request) -> Response` — a user-registered override for a
/// specific status, optionally narrowed to one negotiated media type.
pub type ErrorHandlerFn = Arc<dyn Fn(&EngineError, &Request) -> Response + Send + Sync>;

/// Selects the best-matching user-registered error handler and falls back
/// to a minimal JSON body in the negotiated media type.
pub struct ErrorPolicy {
    by_status_and_media: HashMap<(u16, String), ErrorHandlerFn>,
    by_status: HashMap<u16, ErrorHandlerFn>,
    default_media_type: String,
}

impl ErrorPolicy {
    pub fn new(default_media_type: impl Into<String>) -> Self {
        Self {
            by_status_and_media: HashMap::new(),
            by_status: HashMap::new(),
            default_media_type: default_media_type.into(),
        }
    }

    pub fn register(&mut self, status: u16, media_type: Option<String>, handler: ErrorHandlerFn) {
        match media_type {
            Some(mt) => {
                self.by_status_and_media
                    .insert((status, mt.to_ascii_lowercase()), handler);
            }
            None => {
                self.by_status.insert(status, handler);
            }
        }
    }

    /// Candidate media types this error could be rendered in: every media
    /// type a handler is registered against for this status, plus the
    /// application default.
    fn candidate_media_types(&self, status: u16) -> Vec<String> {
        let mut candidates: Vec<String> = self
            .by_status_and_media
            .keys()
            .filter(|(s, _)| *s == status)
            .map(|(_, mt)| mt.clone())
            .collect();
        if !candidates.contains(&self.default_media_type) {
            candidates.push(self.default_media_type.clone());
        }
        candidates
    }

    fn negotiate_media_type(&self, status: u16, accept: Option<&str>) -> String {
        let candidates = self.candidate_media_types(status);
        let accepted = MediaType::parse_accept(accept.unwrap_or("*/*"));
        let accepted = if accepted.is_empty() {
            vec![MediaType::exact("*", "*")]
        } else {
            accepted
        };
        let mut best: Option<(f32, u8, &String)> = None;
        for candidate in &candidates {
            let Some(parsed) = MediaType::parse_single(candidate) else {
                continue;
            };
            for range in &accepted {
                if range.accepts(&parsed.type_, &parsed.subtype) {
                    let key = (range.q, parsed.specificity());
                    let better = match &best {
                        None => true,
                        Some((q, spec, _)) => key > (*q, *spec),
                    };
                    if better {
                        best = Some((range.q, parsed.specificity(), candidate));
                    }
                }
            }
        }
        best.map(|(_, _, mt)| mt.clone())
            .unwrap_or_else(|| self.default_media_type.clone())
    }

    pub fn build_error(&self, error: &EngineError, request: &Request) -> Response {
        let status = error.status();

        // 304 carries no body and isn't subject to error-body negotiation —
        // a registered handler may still override it, but the default is
        // the bare conditional response, not a JSON error envelope.
        if let EngineError::NotModified { etag } = error {
            if let Some(handler) = self.by_status.get(&status) {
                return handler(error, request);
            }
            return conditional::build_not_modified(etag.clone());
        }

        let accept = request.headers.get("accept");
        let media_type = self.negotiate_media_type(status, accept);

        if let Some(handler) = self.by_status_and_media.get(&(status, media_type.clone())) {
            return handler(error, request);
        }
        if let Some(handler) = self.by_status.get(&status) {
            return handler(error, request);
        }
        default_error_response(status, error, &media_type)
    }
}

fn default_error_response(status: u16, error: &EngineError, media_type: &str) -> Response {
    let body = serde_json::json!({
        "status": status,
        "error": error.to_string(),
    });
    Response::new(status)
        .with_header("Content-Type", media_type.to_string())
        .with_body(serde_json::to_vec(&body).unwrap_or_default())
}
