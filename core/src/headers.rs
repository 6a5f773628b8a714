//! Case-insensitive header bag with case-preserving pass-through.
//!
//! HTTP header lookups in the router are case-insensitive for the reserved
//! set it inspects (`host`, `authorization`, `content-type`, ...), but
//! headers the router does not recognise must reach the downstream service
//! with their original casing intact. [`Headers`] models this as an ordered
//! list of `(name, value)` entries: lookups and removals compare names
//! ASCII-case-insensitively, while iteration yields the names exactly as they
//! were inserted.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A header value: most headers carry a single value, but `set-cookie` (and
/// any repeated header) carries several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    /// A single-valued header.
    Single(String),
    /// A repeated header, one entry per occurrence.
    Multi(Vec<String>),
}

impl HeaderValue {
    /// The first value. For `Multi`, this is the value of the first
    /// occurrence; an empty `Multi` yields `""`.
    #[must_use]
    pub fn first(&self) -> &str {
        match self {
            Self::Single(v) => v,
            Self::Multi(vs) => vs.first().map_or("", String::as_str),
        }
    }

    /// All values, in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<&str> {
        match self {
            Self::Single(v) => vec![v.as_str()],
            Self::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

/// An ordered header map with case-insensitive lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, HeaderValue)>,
}

impl Headers {
    /// Create an empty header bag.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Set a header, replacing any existing entry with the same
    /// (case-insensitive) name. The given casing is the one preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        self.remove(&name);
        self.entries.push((name, HeaderValue::Single(value)));
    }

    /// Add a value to a header, turning it into a repeated header if it
    /// already exists.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => {
                let entry = &mut self.entries[i].1;
                match entry {
                    HeaderValue::Single(existing) => {
                        *entry = HeaderValue::Multi(vec![std::mem::take(existing), value]);
                    }
                    HeaderValue::Multi(vs) => vs.push(value),
                }
            }
            None => self.entries.push((name, HeaderValue::Single(value))),
        }
    }

    /// Set a header to an already-shaped value, replacing any existing entry
    /// with the same (case-insensitive) name.
    pub fn insert_value(&mut self, name: impl Into<String>, value: HeaderValue) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value));
    }

    /// First value of the named header, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.first())
    }

    /// Full value of the named header, if present.
    #[must_use]
    pub fn get_value(&self, name: &str) -> Option<&HeaderValue> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    /// Remove the named header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<HeaderValue> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    /// Whether the named header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterate entries in insertion order, names in their original casing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Headers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = Headers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Headers, A::Error> {
                let mut headers = Headers::new();
                while let Some((name, value)) = access.next_entry::<String, HeaderValue>()? {
                    headers.entries.push((name, value));
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeadersVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json");

        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert!(headers.contains("Content-type"));
    }

    #[test]
    fn original_casing_is_preserved_on_iteration() {
        let mut headers = Headers::new();
        headers.insert("X-Custom-Header", "a");
        headers.insert("another-one", "b");

        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["X-Custom-Header", "another-one"]);
    }

    #[test]
    fn insert_replaces_existing_entry() {
        let mut headers = Headers::new();
        headers.insert("Accept", "text/plain");
        headers.insert("accept", "application/json");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Accept"), Some("application/json"));
    }

    #[test]
    fn append_builds_repeated_headers() {
        let mut headers = Headers::new();
        headers.append("set-cookie", "a=1");
        headers.append("Set-Cookie", "b=2");

        assert_eq!(headers.len(), 1);
        let value = headers.get_value("set-cookie").unwrap();
        assert_eq!(value.all(), vec!["a=1", "b=2"]);
        assert_eq!(value.first(), "a=1");
    }

    #[test]
    fn remove_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("Authorization", "Basic abc");

        assert!(headers.remove("authorization").is_some());
        assert!(headers.is_empty());
    }

    #[test]
    fn serializes_as_a_map() {
        let headers: Headers = [("Content-Type", "text/plain")].into_iter().collect();
        let json = serde_json::to_value(&headers).unwrap();
        assert_eq!(json, serde_json::json!({"Content-Type": "text/plain"}));

        let back: Headers = serde_json::from_value(json).unwrap();
        assert_eq!(back, headers);
    }

    #[test]
    fn deserializes_repeated_values() {
        let headers: Headers =
            serde_json::from_str(r#"{"set-cookie": ["a=1", "b=2"]}"#).unwrap();
        assert_eq!(headers.get_value("set-cookie").unwrap().all().len(), 2);
    }
}
