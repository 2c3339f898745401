//! Media-type parsing shared by Accept and Content-Type headers.

/// A single parsed media-range entry: `type/subtype;param=value;q=0.8`.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    pub type_: String,
    pub subtype: String,
    pub params: Vec<(String, String)>,
    pub q: f32,
}

impl MediaType {
    pub fn exact(type_: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            subtype: subtype.into(),
            params: Vec::new(),
            q: 1.0,
        }
    }

    /// Parse a single bare media type string such as `application/json`.
    pub fn parse_single(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().splitn(2, ';');
        let type_subtype = parts.next()?.trim();
        let mut pieces = type_subtype.splitn(2, '/');
        let type_ = pieces.next()?.trim().to_ascii_lowercase();
        let subtype = pieces.next()?.trim().to_ascii_lowercase();
        if type_.is_empty() || subtype.is_empty() {
            return None;
        }
        let mut params = Vec::new();
        let mut q = 1.0f32;
        if let Some(rest) = parts.next() {
            for param in rest.split(';') {
                let param = param.trim();
                if param.is_empty() {
                    continue;
                }
                if let Some((k, v)) = param.split_once('=') {
                    let k = k.trim().to_ascii_lowercase();
                    let v = v.trim().trim_matches('"').to_string();
                    if k == "q" {
                        q = v.parse::<f32>().unwrap_or(1.0).clamp(0.0, 1.0);
                    } else {
                        params.push((k, v));
                    }
                }
            }
        }
        Some(Self {
            type_,
            subtype,
            params,
            q,
        })
    }

    /// Parse a full `Accept`-style header: a comma-separated list of media
    /// ranges, each with an optional `;q=` factor. Entries with `q=0` are
    /// kept (as explicit rejections) rather than dropped — callers filter
    /// them out during selection.
    pub fn parse_accept(raw: &str) -> Vec<MediaType> {
        raw.split(',')
            .filter_map(|entry| MediaType::parse_single(entry))
            .collect()
    }

    pub fn is_wildcard_type(&self) -> bool {
        self.type_ == "*"
    }

    pub fn is_wildcard_subtype(&self) -> bool {
        self.subtype == "*"
    }

    /// RFC 7231 specificity: `*/*` < `type/*` < `type/subtype` <
    /// `type/subtype;param=...`. Higher is more specific.
    pub fn specificity(&self) -> u8 {
        match (self.is_wildcard_type(), self.is_wildcard_subtype()) {
            (true, _) => 0,
            (false, true) => 1,
            (false, false) if self.params.is_empty() => 2,
            (false, false) => 3,
        }
    }

    /// Whether this media range (as parsed from an Accept header) accepts
    /// the given concrete media type, e.g. `*/*` accepts anything and
    /// `application/*` accepts `application/json`.
    pub fn accepts(&self, candidate_type: &str, candidate_subtype: &str) -> bool {
        if self.q <= 0.0 {
            return false;
        }
        (self.is_wildcard_type() || self.type_ == candidate_type)
            && (self.is_wildcard_subtype() || self.subtype == candidate_subtype)
    }

    pub fn to_string_exact(&self) -> String {
        format!("{}/{}", self.type_, self.subtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_media_type() {
        let mt = MediaType::parse_single("application/json").unwrap();
        assert_eq!(mt.type_, "application");
        assert_eq!(mt.subtype, "json");
        assert_eq!(mt.q, 1.0);
    }

    #[test]
    fn parses_quality_factor() {
        let mt = MediaType::parse_single("text/html;q=0.5").unwrap();
        assert_eq!(mt.q, 0.5);
    }

    #[test]
    fn clamps_out_of_range_quality() {
        let mt = MediaType::parse_single("text/html;q=2.0").unwrap();
        assert_eq!(mt.q, 1.0);
    }

    #[test]
    fn parses_multiple_entries() {
        let entries = MediaType::parse_accept("text/html, application/json;q=0.5");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].q, 0.5);
    }

    #[test]
    fn specificity_orders_wildcards_below_exact() {
        let any = MediaType::parse_single("*/*").unwrap();
        let type_wild = MediaType::parse_single("application/*").unwrap();
        let exact = MediaType::parse_single("application/json").unwrap();
        assert!(any.specificity() < type_wild.specificity());
        assert!(type_wild.specificity() < exact.specificity());
    }

    #[test]
    fn accepts_matches_wildcards() {
        let any = MediaType::parse_single("*/*").unwrap();
        assert!(any.accepts("application", "json"));
        let type_wild = MediaType::parse_single("application/*").unwrap();
        assert!(type_wild.accepts("application", "json"));
        assert!(!type_wild.accepts("text", "html"));
    }

    #[test]
    fn zero_quality_rejects() {
        let rejected = MediaType::parse_single("application/json;q=0").unwrap();
        assert!(!rejected.accepts("application", "json"));
    }
}
