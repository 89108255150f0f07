//! HTTP header map with case-insensitive name lookup.
//!
//! HTTP headers are order-preserving and case-insensitive per RFC 9110 §5.
//! Names and values are stored as [`Bytes`] slices of the connection's read
//! buffer rather than owned `String`s, so building the per-request header
//! map costs a handful of reference-counted slice clones, not an allocation
//! per header.

use std::fmt;

use bytes::Bytes;

/// A case-insensitive, multi-value, zero-copy HTTP header map.
///
/// # Examples
///
/// ```
/// use hearth_http::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "text/html; charset=utf-8");
/// headers.insert("X-Custom", "first");
/// headers.insert("X-Custom", "second");
///
/// assert_eq!(headers.get("content-type"), Some("text/html; charset=utf-8"));
/// let all: Vec<_> = headers.get_all("x-custom").collect();
/// assert_eq!(all, vec!["first", "second"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: Vec<(Bytes, Bytes)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry from zero-copy `Bytes` views — shares the
    /// underlying buffer rather than copying it. This is how the connection
    /// state machine populates headers straight from parser offsets.
    pub fn insert_bytes(&mut self, name: Bytes, value: Bytes) {
        self.inner.push((name, value));
    }

    /// Appends a header entry, copying owned strings into `Bytes`. Used when
    /// there's no pre-existing buffer to slice from (e.g. server-constructed
    /// responses).
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner
            .push((Bytes::from(name.into()), Bytes::from(value.into())));
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| eq_ignore_ascii_case(k, name.as_bytes()))
            .map(|(_, v)| str_from(v))
    }

    /// Returns an iterator over all values for the given header name (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |(k, _)| eq_ignore_ascii_case(k, name.as_bytes()))
            .map(|(_, v)| str_from(v))
    }

    /// Removes all entries with the given header name (case-insensitive).
    /// Returns `true` if any entries were removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.inner.len();
        self.inner
            .retain(|(k, _)| !eq_ignore_ascii_case(k, name.as_bytes()));
        self.inner.len() < before
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .iter()
            .any(|(k, _)| eq_ignore_ascii_case(k, name.as_bytes()))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (str_from(k), str_from(v)))
    }
}

fn str_from(bytes: &Bytes) -> &str {
    // Parser-admitted header bytes are always printable ASCII/OWS; see
    // http::parser::is_valid_header_value. Falling back to "" rather than
    // panicking keeps this infallible for callers.
    std::str::from_utf8(bytes).unwrap_or("")
}

fn eq_ignore_ascii_case(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{}: {}\r\n", str_from(name), str_from(value))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_get() {
        let mut h = Headers::new();
        h.insert("Content-Type", "text/plain");
        assert_eq!(h.get("content-type"), Some("text/plain"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(h.get("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn multi_value() {
        let mut h = Headers::new();
        h.insert("Set-Cookie", "a=1");
        h.insert("Set-Cookie", "b=2");
        let vals: Vec<_> = h.get_all("set-cookie").collect();
        assert_eq!(vals, vec!["a=1", "b=2"]);
    }

    #[test]
    fn remove() {
        let mut h = Headers::new();
        h.insert("X-Foo", "bar");
        h.insert("X-Foo", "baz");
        assert!(h.remove("x-foo"));
        assert!(h.is_empty());
        assert!(!h.remove("x-foo")); // already gone
    }

    #[test]
    fn contains() {
        let mut h = Headers::new();
        h.insert("Authorization", "Bearer token");
        assert!(h.contains("authorization"));
        assert!(!h.contains("x-missing"));
    }

    #[test]
    fn insert_bytes_shares_buffer() {
        let buf = Bytes::from_static(b"X-Id: 42");
        let mut h = Headers::new();
        h.insert_bytes(buf.slice(0..4), buf.slice(6..8));
        assert_eq!(h.get("x-id"), Some("42"));
    }
}
