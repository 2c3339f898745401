//! Parsed conditional-request headers (If-Match, If-None-Match,
//! If-Modified-Since, If-Unmodified-Since). Evaluation against a resource's
//! current ETag/Last-Modified happens in `wm-engine` (it needs the DI
//! container); this module only parses.

use chrono::{DateTime, Utc};

/// A single entity-tag, either strong (`"abc"`) or weak (`W/"abc"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTag {
    pub weak: bool,
    pub opaque: String,
}

impl EntityTag {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw == "*" {
            return Some(Self {
                weak: false,
                opaque: "*".to_string(),
            });
        }
        let (weak, rest) = if let Some(stripped) = raw.strip_prefix("W/") {
            (true, stripped)
        } else {
            (false, raw)
        };
        let rest = rest.trim();
        if rest.len() >= 2 && rest.starts_with('"') && rest.ends_with('"') {
            Some(Self {
                weak,
                opaque: rest[1..rest.len() - 1].to_string(),
            })
        } else {
            None
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.opaque == "*" && !self.weak
    }

    /// Strong comparison (RFC 7232 §2.3.2): both non-weak and opaque tags equal.
    pub fn strong_eq(&self, other: &EntityTag) -> bool {
        !self.weak && !other.weak && self.opaque == other.opaque
    }

    /// Weak comparison: opaque tags equal regardless of weak/strong markers.
    pub fn weak_eq(&self, other: &EntityTag) -> bool {
        self.opaque == other.opaque
    }

    pub fn parse_list(raw: &str) -> Vec<EntityTag> {
        split_top_level_commas(raw)
            .iter()
            .filter_map(|s| EntityTag::parse(s))
            .collect()
    }
}

fn split_top_level_commas(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for ch in raw.chars() {
        match ch {
            '"' => {
                depth = if depth == 0 { 1 } else { 0 };
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// The conditional headers present on a single request.
#[derive(Debug, Clone, Default)]
pub struct ConditionalHeaders {
    pub if_match: Option<Vec<EntityTag>>,
    pub if_none_match: Option<Vec<EntityTag>>,
    pub if_modified_since: Option<DateTime<Utc>>,
    pub if_unmodified_since: Option<DateTime<Utc>>,
}

impl ConditionalHeaders {
    pub fn is_present(&self) -> bool {
        self.if_match.is_some()
            || self.if_none_match.is_some()
            || self.if_modified_since.is_some()
            || self.if_unmodified_since.is_some()
    }

    pub fn parse(
        if_match: Option<&str>,
        if_none_match: Option<&str>,
        if_modified_since: Option<&str>,
        if_unmodified_since: Option<&str>,
    ) -> Self {
        Self {
            if_match: if_match.map(EntityTag::parse_list),
            if_none_match: if_none_match.map(EntityTag::parse_list),
            if_modified_since: if_modified_since.and_then(parse_http_date),
            if_unmodified_since: if_unmodified_since.and_then(parse_http_date),
        }
    }
}

/// Parse an RFC 7231 IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`), the only
/// form a conforming sender must generate; obsolete formats are not accepted.
pub fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
