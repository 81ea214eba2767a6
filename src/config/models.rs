//! Configuration data structures for Recast.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files. They are
//! intentionally serde‑friendly and include defaults so that minimal configs remain concise.
//! The defaults reproduce the conventional method-override contract: POST as the carrier
//! method, the `X-HTTP-Method-Override` header checked first, then a `_method` query
//! parameter, then a `_method` form field.
use serde::{Deserialize, Serialize};

/// Conventional override header name.
pub const DEFAULT_OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

/// Conventional override query/form parameter name.
pub const DEFAULT_OVERRIDE_PARAM: &str = "_method";

/// Default function for the enabled flag
fn default_enabled() -> bool {
    true
}

fn default_carrier_method() -> String {
    "POST".to_string()
}

/// Methods an override may resolve to when nothing else is configured.
fn default_allowed_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Methods that must not carry a request body; overriding to one of these
/// drops the buffered body so downstream handlers see a bodyless request.
fn default_bodyless_methods() -> Vec<String> {
    ["GET", "HEAD", "OPTIONS", "DELETE"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_sources() -> Vec<OverrideSource> {
    vec![
        OverrideSource::Header {
            name: DEFAULT_OVERRIDE_HEADER.to_string(),
        },
        OverrideSource::Query {
            name: DEFAULT_OVERRIDE_PARAM.to_string(),
        },
        OverrideSource::Form {
            name: DEFAULT_OVERRIDE_PARAM.to_string(),
        },
    ]
}

fn default_max_form_body_bytes() -> usize {
    64 * 1024
}

/// One place to look for an override signal. The declared order of sources in
/// [`OverrideConfig::sources`] defines precedence: the first source yielding a
/// present, non-empty value wins.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverrideSource {
    /// A request header, matched case-insensitively.
    Header { name: String },
    /// A query-string parameter.
    Query { name: String },
    /// A field in an `application/x-www-form-urlencoded` body.
    Form { name: String },
}

impl OverrideSource {
    /// The configured header/parameter/field name.
    pub fn name(&self) -> &str {
        match self {
            OverrideSource::Header { name }
            | OverrideSource::Query { name }
            | OverrideSource::Form { name } => name,
        }
    }

    /// Short kind label used in validation errors and trace events.
    pub fn kind(&self) -> &'static str {
        match self {
            OverrideSource::Header { .. } => "header",
            OverrideSource::Query { .. } => "query",
            OverrideSource::Form { .. } => "form",
        }
    }
}

/// Configuration for the method-override middleware.
///
/// Constructed once, validated at build time, and shared read-only across all
/// requests. Method names are accepted in any case here; the resolver normalizes
/// everything to uppercase when it compiles this config.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OverrideConfig {
    /// Master switch; when false the middleware is a pure pass-through.
    pub enabled: bool,
    /// The only original method eligible to carry an override signal.
    pub carrier_method: String,
    /// Allowlist of methods an override may resolve to.
    pub allowed_methods: Vec<String>,
    /// Where to look for the override signal, in precedence order.
    pub sources: Vec<OverrideSource>,
    /// Overriding to one of these strips the request body and its
    /// `Content-Type` / `Content-Length` headers.
    pub bodyless_methods: Vec<String>,
    /// When true, an override equal to the original method is still reported
    /// as applied (extension + trace event). When false it degrades to
    /// "no override". The effective method label is identical either way.
    pub report_same_method: bool,
    /// Largest body the middleware will buffer to look up a form field.
    /// Requests declaring a larger `Content-Length` skip the form source.
    pub max_form_body_bytes: usize,
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            carrier_method: default_carrier_method(),
            allowed_methods: default_allowed_methods(),
            sources: default_sources(),
            bodyless_methods: default_bodyless_methods(),
            report_same_method: false,
            max_form_body_bytes: default_max_form_body_bytes(),
        }
    }
}
