//! Override resolution: the decision of whether, and to what, the effective
//! request method is rewritten.

use std::collections::HashSet;

use http::{Method, header::HeaderName};
use tracing::{debug, warn};

use crate::{
    config::{OverrideConfig, OverrideConfigValidator, OverrideSource, ValidationError},
    core::snapshot::RequestSnapshot,
};

/// Per-request resolution outcome. Computed fresh for every request; carries
/// no state beyond the single decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Pass the original method through unchanged.
    NoOverride,
    /// Rewrite the effective method to the contained one. Guaranteed to be a
    /// member of the configured allowed-method set.
    Override(Method),
}

impl Resolution {
    /// True when the outcome rewrites the method.
    pub fn is_override(&self) -> bool {
        matches!(self, Resolution::Override(_))
    }
}

/// A source compiled into its request-time lookup form.
#[derive(Debug, Clone)]
enum CompiledSource {
    Header(HeaderName),
    Query(String),
    Form(String),
}

impl CompiledSource {
    fn kind(&self) -> &'static str {
        match self {
            CompiledSource::Header(_) => "header",
            CompiledSource::Query(_) => "query",
            CompiledSource::Form(_) => "form",
        }
    }
}

/// The override decision engine, compiled once from an [`OverrideConfig`] and
/// shared read-only across requests.
///
/// Resolution never fails at request time: invalid or disallowed candidates
/// degrade to [`Resolution::NoOverride`], so the conservative default is to
/// leave the method unchanged.
pub struct OverrideResolver {
    enabled: bool,
    carrier: Method,
    allowed: HashSet<Method>,
    bodyless: HashSet<Method>,
    sources: Vec<CompiledSource>,
    report_same_method: bool,
    max_form_body_bytes: usize,
}

impl OverrideResolver {
    /// Validate and compile a configuration into a resolver.
    ///
    /// All configuration problems surface here, at construction time.
    pub fn from_config(config: &OverrideConfig) -> Result<Self, ValidationError> {
        OverrideConfigValidator::validate(config)?;

        let carrier = parse_method(&config.carrier_method)?;
        let allowed = config
            .allowed_methods
            .iter()
            .map(|m| parse_method(m))
            .collect::<Result<HashSet<_>, _>>()?;
        let bodyless = config
            .bodyless_methods
            .iter()
            .map(|m| parse_method(m))
            .collect::<Result<HashSet<_>, _>>()?;

        let sources = config
            .sources
            .iter()
            .map(|source| match source {
                OverrideSource::Header { name } => HeaderName::from_bytes(name.as_bytes())
                    .map(CompiledSource::Header)
                    .map_err(|e| ValidationError::InvalidSource {
                        kind: "header".to_string(),
                        name: name.clone(),
                        message: e.to_string(),
                    }),
                OverrideSource::Query { name } => Ok(CompiledSource::Query(name.clone())),
                OverrideSource::Form { name } => Ok(CompiledSource::Form(name.clone())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            carrier = %carrier,
            allowed = ?allowed,
            sources = config.sources.len(),
            "Override resolver compiled"
        );

        Ok(Self {
            enabled: config.enabled,
            carrier,
            allowed,
            bodyless,
            sources,
            report_same_method: config.report_same_method,
            max_form_body_bytes: config.max_form_body_bytes,
        })
    }

    /// Resolve the override decision for one request snapshot.
    ///
    /// Pure except for trace events: the same snapshot always yields the
    /// same outcome.
    pub fn resolve(&self, snapshot: &RequestSnapshot<'_>) -> Resolution {
        if !self.enabled {
            return Resolution::NoOverride;
        }

        // Only the carrier method may be overridden; anything else passes
        // through untouched no matter what signals are present.
        if snapshot.method() != &self.carrier {
            return Resolution::NoOverride;
        }

        for source in &self.sources {
            let raw = match source {
                CompiledSource::Header(name) => snapshot.header(name),
                CompiledSource::Query(name) => snapshot.query_param(name),
                CompiledSource::Form(name) => snapshot.form_field(name),
            };

            let Some(raw) = raw else { continue };
            let candidate = raw.trim();
            if candidate.is_empty() {
                // A blank signal is no signal; keep walking.
                continue;
            }

            return self.validate_candidate(candidate, source, snapshot.method());
        }

        Resolution::NoOverride
    }

    /// Validate the first non-empty candidate found during the source walk.
    fn validate_candidate(
        &self,
        candidate: &str,
        source: &CompiledSource,
        original: &Method,
    ) -> Resolution {
        let normalized = candidate.to_ascii_uppercase();

        let method = match Method::from_bytes(normalized.as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                warn!(
                    candidate = %candidate,
                    source = source.kind(),
                    "Override candidate is not a valid HTTP method, ignoring"
                );
                return Resolution::NoOverride;
            }
        };

        if !self.allowed.contains(&method) {
            warn!(
                method = %method,
                source = source.kind(),
                "Method override not in allowed set, ignoring"
            );
            return Resolution::NoOverride;
        }

        if method == *original && !self.report_same_method {
            debug!(method = %method, "Override equals original method, ignoring");
            return Resolution::NoOverride;
        }

        debug!(
            from = %original,
            to = %method,
            source = source.kind(),
            "Method override resolved"
        );
        Resolution::Override(method)
    }

    /// Whether the resolver is enabled at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The configured carrier method (conventionally POST).
    pub fn carrier_method(&self) -> &Method {
        &self.carrier
    }

    /// True when at least one form source is configured, i.e. the dispatcher
    /// may need to buffer a request body.
    pub fn has_form_source(&self) -> bool {
        self.sources
            .iter()
            .any(|s| matches!(s, CompiledSource::Form(_)))
    }

    /// Whether a method belongs to the configured bodyless set.
    pub fn is_bodyless(&self, method: &Method) -> bool {
        self.bodyless.contains(method)
    }

    /// Body buffering cap for form-field lookup.
    pub fn max_form_body_bytes(&self) -> usize {
        self.max_form_body_bytes
    }
}

fn parse_method(name: &str) -> Result<Method, ValidationError> {
    Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes()).map_err(|e| {
        ValidationError::InvalidMethod {
            method: name.to_string(),
            reason: e.to_string(),
        }
    })
}
