//! Path templates and the data produced by matching one against a request.

use crate::error::ContractError;
use std::collections::HashMap;

/// One segment of a compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled route path template: an ordered sequence of literal and
/// named-parameter segments. Trailing slashes are significant only if
/// present in the template itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    pub raw: String,
    segments: Vec<Segment>,
    trailing_slash: bool,
}

impl PathTemplate {
    /// Compile a template such as `/v1/items/{id}`. A bare `{name}` segment
    /// must be non-empty and must not itself contain `/`.
    pub fn parse(template: &str) -> Result<Self, ContractError> {
        let trailing_slash = template.len() > 1 && template.ends_with('/');
        let trimmed = template.trim_matches('/');
        let mut segments = Vec::new();
        if !trimmed.is_empty() {
            for part in trimmed.split('/') {
                if part.is_empty() {
                    return Err(ContractError::InvalidPathTemplate(
                        template.to_string(),
                        "empty path segment".to_string(),
                    ));
                }
                if part.starts_with('{') && part.ends_with('}') {
                    let name = &part[1..part.len() - 1];
                    if name.is_empty() {
                        return Err(ContractError::InvalidPathTemplate(
                            template.to_string(),
                            "empty parameter name".to_string(),
                        ));
                    }
                    segments.push(Segment::Param(name.to_string()));
                } else if part.contains('{') || part.contains('}') {
                    return Err(ContractError::InvalidPathTemplate(
                        template.to_string(),
                        format!("malformed parameter segment '{part}'"),
                    ));
                } else {
                    segments.push(Segment::Literal(part.to_string()));
                }
            }
        }
        Ok(Self {
            raw: template.to_string(),
            segments,
            trailing_slash,
        })
    }

    /// Normalized identity used to detect duplicate registrations: the
    /// segment shape plus whether a trailing slash is significant.
    pub fn normalized_key(&self) -> String {
        let mut key = String::new();
        for seg in &self.segments {
            key.push('/');
            match seg {
                Segment::Literal(s) => key.push_str(s),
                Segment::Param(_) => key.push_str("{}"),
            }
        }
        if key.is_empty() {
            key.push('/');
        }
        if self.trailing_slash {
            key.push('/');
        }
        key
    }

    /// Attempt to match a concrete, normalized path, returning extracted
    /// path parameters on success.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let path_trailing_slash = path.len() > 1 && path.ends_with('/');
        if path_trailing_slash != self.trailing_slash {
            return None;
        }
        let trimmed = path.trim_matches('/');
        let parts: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = HashMap::new();
        for (seg, part) in self.segments.iter().zip(parts.iter()) {
            match seg {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

/// The result of a successful route lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub path_params: HashMap<String, String>,
}

/// Boolean flags derived by inspecting which decision kinds and renderers a
/// route binds, pre-computed at registration so the machine can skip
/// irrelevant decision nodes.
#[derive(Debug, Clone, Default)]
pub struct RouteCapabilities {
    pub needs_authorization: bool,
    pub needs_forbidden_check: bool,
    pub needs_service_available_check: bool,
    pub needs_malformed_check: bool,
    pub needs_conditional: bool,
    pub content_types_provided: Vec<String>,
    pub content_types_accepted: Vec<String>,
    pub has_validators: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_only_template_matches_exact_path() {
        let t = PathTemplate::parse("/hello").unwrap();
        assert!(t.matches("/hello").is_some());
        assert!(t.matches("/hello/world").is_none());
    }

    #[test]
    fn param_segment_captures_value() {
        let t = PathTemplate::parse("/item/{id}").unwrap();
        let params = t.matches("/item/42").unwrap();
        assert_eq!(params.get("id").unwrap(), "42");
    }

    #[test]
    fn param_does_not_cross_segment_boundary() {
        let t = PathTemplate::parse("/item/{id}").unwrap();
        assert!(t.matches("/item/42/extra").is_none());
    }

    #[test]
    fn trailing_slash_is_significant() {
        let with_slash = PathTemplate::parse("/hello/").unwrap();
        let without_slash = PathTemplate::parse("/hello").unwrap();
        assert!(with_slash.matches("/hello/").is_some());
        assert!(with_slash.matches("/hello").is_none());
        assert!(without_slash.matches("/hello/").is_none());
    }

    #[test]
    fn empty_param_name_is_rejected() {
        assert!(PathTemplate::parse("/item/{}").is_err());
    }

    #[test]
    fn root_template_matches_root_path() {
        let t = PathTemplate::parse("/").unwrap();
        assert!(t.matches("/").is_some());
        assert!(t.matches("/x").is_none());
    }

    #[test]
    fn normalized_key_distinguishes_param_names_as_equivalent() {
        let a = PathTemplate::parse("/item/{id}").unwrap();
        let b = PathTemplate::parse("/item/{other}").unwrap();
        assert_eq!(a.normalized_key(), b.normalized_key());
    }
}
