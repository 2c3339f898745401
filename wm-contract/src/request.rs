//! The immutable inbound request, as the adapter hands it to `execute`.

use crate::headers::CaseInsensitiveMultiMap;
use crate::method::Method;
use std::collections::HashMap;

/// Parsed client certificate, present only on a TLS connection that
/// presented one.
#[derive(Debug, Clone)]
pub struct ClientCert {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: chrono::DateTime<chrono::Utc>,
    pub not_after: chrono::DateTime<chrono::Utc>,
}

/// An inbound HTTP request. Immutable once constructed — path params are
/// filled in by the route registry at match time, everything else comes
/// from the adapter.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, Vec<String>>,
    pub headers: CaseInsensitiveMultiMap,
    pub body: Option<Vec<u8>>,
    pub tls: bool,
    pub client_cert: Option<ClientCert>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: HashMap::new(),
            query_params: HashMap::new(),
            headers: CaseInsensitiveMultiMap::new(),
            body: None,
            tls: false,
            client_cert: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// `path` normalized to origin-form: a single leading slash. A trailing
    /// slash is left untouched — it is significant whenever the matched
    /// route's template declares one (`PathTemplate::matches`), so stripping
    /// it here would make that distinction unreachable.
    pub fn normalized_path(path: &str) -> String {
        if path.is_empty() {
            return "/".to_string();
        }
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_missing_leading_slash() {
        assert_eq!(Request::normalized_path("hello"), "/hello");
    }

    #[test]
    fn preserves_significant_trailing_slash() {
        assert_eq!(Request::normalized_path("/hello/"), "/hello/");
        assert_eq!(Request::normalized_path("/hello"), "/hello");
        assert_eq!(Request::normalized_path("/"), "/");
    }

    #[test]
    fn builder_round_trips() {
        let req = Request::new(Method::Get, "/hello")
            .with_header("Accept", "application/json")
            .with_query("q", "1");
        assert_eq!(req.headers.get("accept"), Some("application/json"));
        assert_eq!(req.query_params.get("q").unwrap(), &vec!["1".to_string()]);
    }
}
