//! Case-preserving, case-insensitive multi-valued header storage.
//!
//! Entries keep the casing and the order in which they were first inserted. Lookups go
//! through a lowercase index that is kept in lockstep with the entries on every mutation.

use std::collections::HashMap;
use std::fmt;

use http::{HeaderName, HeaderValue};

use crate::error::ValidationError;
use crate::utils::ensure;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
    // lowercase name -> position in `entries`
    index: HashMap<String, usize>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_ascii_lowercase())
    }

    /// All values of `name`, empty when the header is absent.
    pub fn get(&self, name: &str) -> &[String] {
        self.index.get(&name.to_ascii_lowercase()).map(|&i| self.entries[i].1.as_slice()).unwrap_or_default()
    }

    /// The values of `name` joined by `", "`.
    pub fn line(&self, name: &str) -> String {
        self.get(name).join(", ")
    }

    /// Iterates over `(original-case name, values)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Replaces every value of `name`. The new entry takes the given casing and moves to the end.
    pub(crate) fn set(&mut self, name: &str, values: Vec<String>) {
        self.remove(name);
        self.index.insert(name.to_ascii_lowercase(), self.entries.len());
        self.entries.push((name.to_string(), values));
    }

    /// Replaces every value of `name` and moves the entry to the front.
    pub(crate) fn set_first(&mut self, name: &str, values: Vec<String>) {
        self.remove(name);
        self.entries.insert(0, (name.to_string(), values));
        self.reindex();
    }

    /// Appends to the values of `name`, keeping the casing it was first inserted with.
    pub(crate) fn append(&mut self, name: &str, values: Vec<String>) {
        match self.index.get(&name.to_ascii_lowercase()) {
            Some(&i) => self.entries[i].1.extend(values),
            None => {
                self.index.insert(name.to_ascii_lowercase(), self.entries.len());
                self.entries.push((name.to_string(), values));
            }
        }
    }

    pub(crate) fn remove(&mut self, name: &str) -> bool {
        match self.index.remove(&name.to_ascii_lowercase()) {
            Some(i) => {
                self.entries.remove(i);
                self.reindex();
                true
            }
            None => false,
        }
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, (name, _)) in self.entries.iter().enumerate() {
            self.index.insert(name.to_ascii_lowercase(), i);
        }
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a [String]);
    type IntoIter = Box<dyn Iterator<Item = Self::Item> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Checks `name` against the RFC 7230 token grammar.
pub(crate) fn validate_name(name: &str) -> Result<(), ValidationError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| ValidationError::invalid_header_name(name))?;
    Ok(())
}

/// Trims optional whitespace around every value and checks it against the field-value grammar.
pub(crate) fn normalize_values(name: &str, values: Vec<String>) -> Result<Vec<String>, ValidationError> {
    ensure!(!values.is_empty(), ValidationError::EmptyHeaderValues { name: name.to_string() });

    values
        .into_iter()
        .map(|value| {
            let trimmed = value.trim_matches([' ', '\t']);
            HeaderValue::from_bytes(trimmed.as_bytes()).map_err(|_| ValidationError::invalid_header_value(trimmed))?;
            Ok(trimmed.to_string())
        })
        .collect()
}

/// Values accepted by `with_header` and `with_added_header`: a single value or a list.
pub trait IntoHeaderValues {
    fn into_header_values(self) -> Vec<String>;
}

impl IntoHeaderValues for &str {
    fn into_header_values(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoHeaderValues for String {
    fn into_header_values(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoHeaderValues for &String {
    fn into_header_values(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl IntoHeaderValues for Vec<String> {
    fn into_header_values(self) -> Vec<String> {
        self
    }
}

impl IntoHeaderValues for Vec<&str> {
    fn into_header_values(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoHeaderValues for &[&str] {
    fn into_header_values(self) -> Vec<String> {
        self.iter().map(|value| (*value).to_string()).collect()
    }
}

impl<const N: usize> IntoHeaderValues for [&str; N] {
    fn into_header_values(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(values: &[&str]) -> Vec<String> {
        values.into_header_values()
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.set("X-Foo", values(&["1"]));

        assert!(headers.contains("x-foo"));
        assert_eq!(headers.line("X-FOO"), "1");
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["X-Foo"]);
        assert!(headers.get("missing").is_empty());
        assert_eq!(headers.line("missing"), "");
    }

    #[test]
    fn append_keeps_first_casing() {
        let mut headers = Headers::new();
        headers.append("Content-Type", values(&["application/json"]));
        headers.append("content-type", values(&["utf-8"]));

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.line("Content-Type"), "application/json, utf-8");
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["Content-Type"]);
    }

    #[test]
    fn set_replaces_and_recases() {
        let mut headers = Headers::new();
        headers.set("accept", values(&["a", "b"]));
        headers.set("X-One", values(&["1"]));
        headers.set("Accept", values(&["c"]));

        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["X-One", "Accept"]);
        assert_eq!(headers.get("ACCEPT"), ["c"]);
    }

    #[test]
    fn set_first_and_remove_keep_index_in_sync() {
        let mut headers = Headers::new();
        headers.set("A", values(&["1"]));
        headers.set("B", values(&["2"]));
        headers.set("host", values(&["old"]));
        headers.set_first("Host", values(&["new"]));

        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["Host", "A", "B"]);
        assert_eq!(headers.line("b"), "2");

        assert!(headers.remove("a"));
        assert!(!headers.remove("a"));
        assert_eq!(headers.line("B"), "2");
        assert_eq!(headers.line("HOST"), "new");
    }

    #[test]
    fn name_grammar() {
        assert!(validate_name("X-Custom_Header.1").is_ok());
        assert!(validate_name("!#$%&'*+-.^_`|~").is_ok());
        assert_eq!(validate_name("bad name"), Err(ValidationError::invalid_header_name("bad name")));
        assert!(validate_name("").is_err());
        assert!(validate_name("colon:").is_err());
    }

    #[test]
    fn value_grammar_and_trimming() {
        assert_eq!(normalize_values("X", values(&["  padded\t"])).unwrap(), vec!["padded"]);
        assert_eq!(normalize_values("X", values(&[""])).unwrap(), vec![""]);
        assert_eq!(normalize_values("X", values(&["a\tb"])).unwrap(), vec!["a\tb"]);

        assert_eq!(
            normalize_values("X", values(&["line\r\nbreak"])),
            Err(ValidationError::invalid_header_value("line\r\nbreak"))
        );
        assert_eq!(normalize_values("X", Vec::new()), Err(ValidationError::EmptyHeaderValues { name: "X".into() }));
    }
}
