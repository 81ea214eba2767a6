//! Recast - HTTP method override middleware for axum and tower.
//!
//! Recast lets HTTP clients that can only issue GET and POST (HTML forms, some
//! proxies and legacy agents) express an intended method through an out-of-band
//! signal on a POST request, and transparently rewrites the effective method
//! seen by the downstream application.
//!
//! # Features
//! - Override signals from a header, a query parameter, or a form field, with
//!   configurable precedence (first configured source with a value wins)
//! - Carrier-method guard: only POST (configurable) is ever rewritten
//! - Allowlist validation; disallowed or malformed candidates silently degrade
//!   to "no override" rather than failing the request
//! - Bodyless-method handling: overriding to GET/HEAD/OPTIONS/DELETE strips the
//!   now-meaningless body and its framing headers
//! - Body replay: a body buffered for form-field lookup reaches downstream
//!   handlers byte-for-byte
//! - Configuration via explicit values or file loading (TOML / YAML / JSON),
//!   validated at construction time
//! - Structured tracing via `tracing`
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{Router, middleware, routing::put};
//! use recast::{OverrideConfig, OverrideResolver, create_method_override_middleware};
//!
//! # fn main() -> eyre::Result<()> {
//! let resolver = Arc::new(OverrideResolver::from_config(&OverrideConfig::default())?);
//! let app: Router = Router::new()
//!     .route("/items/{id}", put(|| async { "updated" }))
//!     .layer(middleware::from_fn(create_method_override_middleware(
//!         resolver,
//!     )));
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates configuration (`config`), the pure decision logic
//! (`core`: [`OverrideResolver`] over a per-request [`RequestSnapshot`]), and
//! the hosting-framework adapters (`adapters`: axum middleware fn and a tower
//! `Layer`). End users should prefer the re-exports documented below instead of
//! reaching into internal modules directly.
//!
//! # Error Handling
//! Configuration problems are construction-time failures ([`ValidationError`]).
//! Request-time processing never fails for override-related reasons: every
//! ambiguity resolves toward leaving the method unchanged. Strict rejection of
//! invalid override candidates is deliberately not the default; callers wanting
//! it should add an explicit outer layer.
// Re-export public modules with explicit visibility controls
pub mod adapters;
pub mod config;
pub mod core;
pub mod tracing_setup;

// Re-export the types most integrations need
pub use crate::{
    adapters::middleware::{
        MethodOverride, MethodOverrideLayer, OriginalMethod, apply_override,
        create_method_override_middleware, method_override_middleware,
    },
    config::{
        OverrideConfig, OverrideConfigValidator, OverrideSource, ValidationError, load_config,
    },
    core::{OverrideResolver, RequestSnapshot, Resolution},
};
