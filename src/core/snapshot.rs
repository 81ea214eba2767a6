//! Per-request projection of the data the override resolver needs.

use std::collections::HashMap;

use http::{HeaderMap, Method, header::HeaderName, request::Parts};

/// The subset of an inbound request consulted during override resolution:
/// the original method, the header map, the parsed query parameters and,
/// when available, the decoded form fields.
///
/// A snapshot is built per request and discarded with it; it never outlives
/// the request parts it borrows from.
#[derive(Debug)]
pub struct RequestSnapshot<'a> {
    method: &'a Method,
    headers: &'a HeaderMap,
    query: HashMap<String, String>,
    form: HashMap<String, String>,
}

impl<'a> RequestSnapshot<'a> {
    /// Build a snapshot from request parts alone. Form fields are empty;
    /// use [`RequestSnapshot::with_form_body`] when a buffered body exists.
    pub fn from_parts(parts: &'a Parts) -> Self {
        Self {
            method: &parts.method,
            headers: &parts.headers,
            query: parse_urlencoded(parts.uri.query().unwrap_or("")),
            form: HashMap::new(),
        }
    }

    /// Build a snapshot including form fields decoded from a buffered
    /// `application/x-www-form-urlencoded` body.
    pub fn with_form_body(parts: &'a Parts, body: &[u8]) -> Self {
        let mut snapshot = Self::from_parts(parts);
        snapshot.form = parse_urlencoded(&String::from_utf8_lossy(body));
        snapshot
    }

    /// Build a snapshot with caller-supplied form fields. This is the escape
    /// hatch for hosts that decode other body encodings (e.g. multipart)
    /// themselves; the resolver only needs lookup-by-name.
    pub fn with_form_fields(parts: &'a Parts, form: HashMap<String, String>) -> Self {
        let mut snapshot = Self::from_parts(parts);
        snapshot.form = form;
        snapshot
    }

    /// The original request method.
    pub fn method(&self) -> &Method {
        self.method
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Value of a query parameter (first occurrence wins).
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Value of a decoded form field (first occurrence wins).
    pub fn form_field(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }
}

/// Parse an urlencoded pair list (`a=1&b=two`) into a map. The first
/// occurrence of a key wins; pairs that fail to percent-decode are kept
/// verbatim rather than dropped, matching lenient server behavior.
fn parse_urlencoded(input: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();

    for pair in input.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        let value = decode_component(value);
        map.entry(key).or_insert(value);
    }

    map
}

/// Decode one urlencoded component: `+` means space, then percent-decode.
fn decode_component(raw: &str) -> String {
    let plus_decoded = raw.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => plus_decoded,
    }
}
