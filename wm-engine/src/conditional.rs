//! Conditional-request evaluation against a resource's current validators
//! (§4.5). Evaluation order follows RFC 7232 §6 exactly; missing validators
//! are treated as "this header condition cannot be satisfied".

use wm_contract::conditional::EntityTag;
use wm_contract::{AnyValue, ConditionalHeaders, ContractError, Response};

use crate::container::RequestScope;

/// What the evaluator decided. `Proceed` means the caller should continue
/// to the next decision node; the other variants carry a terminal status.
pub enum ConditionalOutcome {
    Proceed,
    NotModified { etag: Option<String> },
    PreconditionFailed,
}

/// Resolve `etag`/`last_modified`/`resource_exists` (if the route binds
/// them) and run the RFC 7232 §6 precedence chain against the parsed
/// conditional headers.
pub async fn evaluate(
    scope: &RequestScope<'_>,
    headers: &ConditionalHeaders,
    etag_dependency: Option<&str>,
    last_modified_dependency: Option<&str>,
    resource_exists_dependency: Option<&str>,
) -> Result<ConditionalOutcome, ContractError> {
    let current_etag = resolve_etag(scope, etag_dependency).await?;
    let current_last_modified = resolve_last_modified(scope, last_modified_dependency).await?;
    let resource_present = resolve_resource_presence(scope, resource_exists_dependency).await?;

    let is_get_or_head = matches!(
        scope.request().method,
        wm_contract::Method::Get | wm_contract::Method::Head
    );

    // 1. If-Match
    if let Some(tags) = &headers.if_match {
        let matched = match_if_match(tags, current_etag.as_ref(), resource_present);
        if !matched {
            return Ok(ConditionalOutcome::PreconditionFailed);
        }
    } else if let Some(since) = headers.if_unmodified_since {
        // 2. If-Unmodified-Since (only when If-Match absent)
        if let Some(last_modified) = current_last_modified {
            if last_modified > since {
                return Ok(ConditionalOutcome::PreconditionFailed);
            }
        }
    }

    // 3. If-None-Match
    if let Some(tags) = &headers.if_none_match {
        let matched = match_if_none_match(tags, current_etag.as_ref());
        if matched {
            return Ok(if is_get_or_head {
                ConditionalOutcome::NotModified {
                    etag: current_etag,
                }
            } else {
                ConditionalOutcome::PreconditionFailed
            });
        }
    } else if let Some(since) = headers.if_modified_since {
        // 4. If-Modified-Since (only when If-None-Match absent)
        if is_get_or_head {
            if let Some(last_modified) = current_last_modified {
                if last_modified <= since {
                    return Ok(ConditionalOutcome::NotModified {
                        etag: current_etag,
                    });
                }
            }
        }
    }

    Ok(ConditionalOutcome::Proceed)
}

fn match_if_match(tags: &[EntityTag], current: Option<&String>, resource_present: bool) -> bool {
    if tags.iter().any(|t| t.is_wildcard()) {
        return resource_present;
    }
    match current {
        Some(current) => {
            let Some(current_tag) = EntityTag::parse(current) else {
                return false;
            };
            tags.iter().any(|t| t.strong_eq(&current_tag))
        }
        None => false,
    }
}

fn match_if_none_match(tags: &[EntityTag], current: Option<&String>) -> bool {
    if tags.iter().any(|t| t.is_wildcard()) {
        return current.is_some();
    }
    match current {
        Some(current) => {
            let Some(current_tag) = EntityTag::parse(current) else {
                return false;
            };
            tags.iter().any(|t| t.weak_eq(&current_tag))
        }
        None => false,
    }
}

async fn resolve_etag(
    scope: &RequestScope<'_>,
    dependency: Option<&str>,
) -> Result<Option<String>, ContractError> {
    let Some(name) = dependency else {
        return Ok(None);
    };
    let value = scope.resolve(name).await?;
    let tag: std::sync::Arc<String> = wm_contract::value::downcast(&value, "String (etag)")?;
    Ok(Some((*tag).clone()))
}

async fn resolve_last_modified(
    scope: &RequestScope<'_>,
    dependency: Option<&str>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, ContractError> {
    let Some(name) = dependency else {
        return Ok(None);
    };
    let value = scope.resolve(name).await?;
    let dt: std::sync::Arc<chrono::DateTime<chrono::Utc>> =
        wm_contract::value::downcast(&value, "DateTime<Utc> (last_modified)")?;
    Ok(Some(*dt))
}

async fn resolve_resource_presence(
    scope: &RequestScope<'_>,
    dependency: Option<&str>,
) -> Result<bool, ContractError> {
    let Some(name) = dependency else {
        return Ok(true);
    };
    let value: AnyValue = scope.resolve(name).await?;
    let state: std::sync::Arc<wm_contract::ResourceState> =
        wm_contract::value::downcast(&value, "ResourceState")?;
    Ok(state.exists())
}

pub fn build_not_modified(etag: Option<String>) -> Response {
    let mut resp = Response::new(304);
    if let Some(etag) = etag {
        resp = resp.with_header("ETag", etag);
    }
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_match_wildcard_matches_existing_resource() {
        assert!(match_if_match(
            &[EntityTag::parse("*").unwrap()],
            None,
            true
        ));
        assert!(!match_if_match(
            &[EntityTag::parse("*").unwrap()],
            None,
            false
        ));
    }

    #[test]
    fn if_match_uses_strong_comparison() {
        let tags = vec![EntityTag::parse("W/\"1\"").unwrap()];
        assert!(!match_if_match(&tags, Some(&"1".to_string()), true));
    }

    #[test]
    fn if_none_match_uses_weak_comparison() {
        let tags = vec![EntityTag::parse("W/\"1\"").unwrap()];
        assert!(match_if_none_match(&tags, Some(&"1".to_string())));
    }

    #[test]
    fn missing_validator_does_not_satisfy_specific_if_match() {
        let tags = vec![EntityTag::parse("\"1\"").unwrap()];
        assert!(!match_if_match(&tags, None, true));
    }
}
