//! Renderer/parser selection against a route's bound content types.

use wm_contract::MediaType;

use crate::registry::{ParserFn, RendererFn, Route};

/// A selected renderer: its exact media type (for `Content-Type`) and the
/// callable that turns a handler's return value into bytes.
pub struct SelectedRenderer {
    pub media_type: String,
    pub render: RendererFn,
}

/// Candidate list is route-local renderers first (in registration order),
/// then the application's default renderer set — "route-local over default"
/// is achieved by trying the route's candidates before falling through.
pub fn select_renderer(
    route_renderers: &[(String, RendererFn)],
    default_renderers: &[(String, RendererFn)],
    accept_header: Option<&str>,
) -> Option<SelectedRenderer> {
    let accepted = MediaType::parse_accept(accept_header.unwrap_or("*/*"));
    let accepted = if accepted.is_empty() {
        vec![MediaType::exact("*", "*")]
    } else {
        accepted
    };

    // Ties on (q, specificity) favor the candidate registered earlier
    // (route-local over default, then registration order) — invert the
    // index so "earlier" sorts as "greater" under a plain tuple max.
    let mut best: Option<(f32, u8, usize, &str, &RendererFn)> = None;
    let candidates: Vec<_> = route_renderers.iter().chain(default_renderers.iter()).collect();
    let total = candidates.len();
    for (priority, (media_type, render)) in candidates.into_iter().enumerate() {
        let Some(candidate) = MediaType::parse_single(media_type) else {
            continue;
        };
        let rank = total - priority;
        for range in &accepted {
            if range.accepts(&candidate.type_, &candidate.subtype) {
                let key = (range.q, range.specificity(), rank);
                let better = match &best {
                    None => true,
                    Some((q, spec, r, ..)) => key > (*q, *spec, *r),
                };
                if better {
                    best = Some((range.q, range.specificity(), rank, media_type, render));
                }
            }
        }
    }

    best.map(|(_, _, _, media_type, render)| SelectedRenderer {
        media_type: media_type.to_string(),
        render: render.clone(),
    })
}

/// Find a parser for `content_type` among the route's locally registered
/// parsers; body-carrying requests with no match fail with 415.
pub fn select_parser(route: &Route, content_type: &str) -> Option<ParserFn> {
    let Some(candidate) = MediaType::parse_single(content_type) else {
        return None;
    };
    route
        .parsers
        .iter()
        .find(|(mt, _)| {
            MediaType::parse_single(mt)
                .map(|registered| registered.type_ == candidate.type_ && registered.subtype == candidate.subtype)
                .unwrap_or(false)
        })
        .map(|(_, parser)| parser.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn renderer() -> RendererFn {
        Arc::new(|_v, _r| Ok(b"{}".to_vec()))
    }

    #[test]
    fn selects_exact_match_over_wildcard() {
        let route_renderers = vec![("application/json".to_string(), renderer())];
        let selected = select_renderer(&route_renderers, &[], Some("text/html, application/json;q=0.5"))
            .unwrap();
        assert_eq!(selected.media_type, "application/json");
    }

    #[test]
    fn no_match_returns_none() {
        let route_renderers = vec![("application/json".to_string(), renderer())];
        assert!(select_renderer(&route_renderers, &[], Some("text/html")).is_none());
    }

    #[test]
    fn falls_back_to_default_renderer_when_route_has_none() {
        let defaults = vec![("application/json".to_string(), renderer())];
        let selected = select_renderer(&[], &defaults, Some("application/json")).unwrap();
        assert_eq!(selected.media_type, "application/json");
    }

    #[test]
    fn missing_accept_header_matches_any_provided_type() {
        let route_renderers = vec![("application/json".to_string(), renderer())];
        let selected = select_renderer(&route_renderers, &[], None).unwrap();
        assert_eq!(selected.media_type, "application/json");
    }
}
