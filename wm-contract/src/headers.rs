//! Case-insensitive, order-preserving, multi-valued header map (RFC 7230 §3.2).
//!
//! Storage is a flat vector of `(original_name, value)` pairs plus a
//! secondary index keyed by lowercased name — insertion order survives for
//! iteration and output, while lookup and membership normalize casing.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct CaseInsensitiveMultiMap {
    entries: Vec<(String, String)>,
    index: HashMap<String, Vec<usize>>,
}

impl CaseInsensitiveMultiMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `name`, preserving the casing given here.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        let idx = self.entries.len();
        self.entries.push((name, value.into()));
        self.index.entry(key).or_default().push(idx);
    }

    /// Replace all existing values for `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        self.remove(&key);
        self.append(name, value);
    }

    /// Remove every value stored under `name` (case-insensitive).
    pub fn remove(&mut self, name: &str) {
        let key = name.to_ascii_lowercase();
        if let Some(indices) = self.index.remove(&key) {
            let to_remove: std::collections::HashSet<usize> = indices.into_iter().collect();
            let kept: Vec<(String, String)> = self
                .entries
                .drain(..)
                .enumerate()
                .filter(|(i, _)| !to_remove.contains(i))
                .map(|(_, pair)| pair)
                .collect();
            self.entries = kept;
            self.reindex();
        }
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, (name, _)) in self.entries.iter().enumerate() {
            self.index
                .entry(name.to_ascii_lowercase())
                .or_default()
                .push(i);
        }
    }

    /// The first value stored under `name`, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).into_iter().next()
    }

    /// All values stored under `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        let key = name.to_ascii_lowercase();
        self.index
            .get(&key)
            .into_iter()
            .flatten()
            .map(|&i| self.entries[i].1.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate all pairs in insertion order, original casing preserved.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for CaseInsensitiveMultiMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.append(name, value);
        }
        map
    }
}

impl PartialEq for CaseInsensitiveMultiMap {
    fn eq(&self, other: &Self) -> bool {
        if self.index.len() != other.index.len() {
            return false;
        }
        for (key, indices) in &self.index {
            let Some(other_indices) = other.index.get(key) else {
                return false;
            };
            if indices.len() != other_indices.len() {
                return false;
            }
            let ours: Vec<&str> = indices.iter().map(|&i| self.entries[i].1.as_str()).collect();
            let theirs: Vec<&str> = other_indices
                .iter()
                .map(|&i| other.entries[i].1.as_str())
                .collect();
            if ours != theirs {
                return false;
            }
        }
        true
    }
}

impl Eq for CaseInsensitiveMultiMap {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut h = CaseInsensitiveMultiMap::new();
        h.append("Content-Type", "application/json");
        assert_eq!(h.get("content-type"), Some("application/json"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(h.get("Content-Type"), Some("application/json"));
    }

    #[test]
    fn original_casing_preserved_on_iteration() {
        let mut h = CaseInsensitiveMultiMap::new();
        h.append("X-Request-Id", "abc");
        let (name, _) = h.iter().next().unwrap();
        assert_eq!(name, "X-Request-Id");
    }

    #[test]
    fn multi_valued_preserves_insertion_order() {
        let mut h = CaseInsensitiveMultiMap::new();
        h.append("Accept", "text/html");
        h.append("accept", "application/json");
        assert_eq!(h.get_all("ACCEPT"), vec!["text/html", "application/json"]);
    }

    #[test]
    fn set_replaces_all_prior_values() {
        let mut h = CaseInsensitiveMultiMap::new();
        h.append("X-Foo", "1");
        h.append("x-foo", "2");
        h.set("X-FOO", "3");
        assert_eq!(h.get_all("x-foo"), vec!["3"]);
    }

    #[test]
    fn remove_is_case_insensitive() {
        let mut h = CaseInsensitiveMultiMap::new();
        h.append("Cookie", "a=b");
        h.remove("cookie");
        assert!(!h.contains("Cookie"));
    }

    #[test]
    fn equality_ignores_casing_and_compares_ordered_values() {
        let mut a = CaseInsensitiveMultiMap::new();
        a.append("Accept", "a");
        a.append("Accept", "b");
        let mut b = CaseInsensitiveMultiMap::new();
        b.append("accept", "a");
        b.append("ACCEPT", "b");
        assert_eq!(a, b);
    }
}
