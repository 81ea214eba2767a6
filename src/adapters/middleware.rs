//! Axum / tower middleware applying the method-override decision.
//!
//! The middleware is a transparent pass-through: it asks the
//! [`OverrideResolver`] for a decision, rewrites the request method on an
//! override, and forwards to the next handler exactly once. It never produces
//! a response of its own, and all body handling degrades toward "no override"
//! rather than failing the request.
use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use http::{HeaderMap, Method, header};
use http_body_util::{BodyExt, Limited};
use tracing::warn;

use crate::{
    config::{OverrideConfig, ValidationError},
    core::{OverrideResolver, RequestSnapshot, Resolution},
};

/// The method a request carried before an override rewrote it. Inserted as a
/// request extension so downstream handlers and logging can observe the
/// rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalMethod(pub Method);

/// Apply the override decision to a request, returning the (possibly
/// rewritten) request to forward downstream.
///
/// This is the dispatcher core shared by the axum middleware fn and the tower
/// [`MethodOverride`] service; custom adapters for other hosts can call it
/// directly. The body is only read when a form source must be consulted, and
/// a buffered body is replayed byte-for-byte.
pub async fn apply_override(req: Request, resolver: &OverrideResolver) -> Request {
    if !resolver.is_enabled() || req.method() != resolver.carrier_method() {
        return req;
    }

    let (mut parts, body) = req.into_parts();

    let needs_form_lookup = resolver.has_form_source()
        && is_form_content_type(&parts.headers)
        && declared_length_within(&parts.headers, resolver.max_form_body_bytes());

    let (resolution, body) = if needs_form_lookup {
        match buffer_body(body, resolver.max_form_body_bytes()).await {
            Ok(bytes) => {
                let snapshot = RequestSnapshot::with_form_body(&parts, &bytes);
                (resolver.resolve(&snapshot), Body::from(bytes))
            }
            Err(e) => {
                // The body is gone; treat the form source as absent and let
                // the remaining sources decide.
                warn!(
                    error = %e,
                    "Failed to buffer request body for form-field lookup"
                );
                let snapshot = RequestSnapshot::from_parts(&parts);
                (resolver.resolve(&snapshot), Body::empty())
            }
        }
    } else {
        let snapshot = RequestSnapshot::from_parts(&parts);
        (resolver.resolve(&snapshot), body)
    };

    let mut body = body;
    if let Resolution::Override(method) = resolution {
        parts
            .extensions
            .insert(OriginalMethod(parts.method.clone()));
        parts.method = method.clone();

        if resolver.is_bodyless(&method) {
            parts.headers.remove(header::CONTENT_TYPE);
            parts.headers.remove(header::CONTENT_LENGTH);
            body = Body::empty();
        }
    }

    Request::from_parts(parts, body)
}

/// Axum middleware fn form of the dispatcher, for use with
/// `axum::middleware::from_fn` style wiring.
pub async fn method_override_middleware(
    req: Request,
    next: Next,
    resolver: Arc<OverrideResolver>,
) -> Response {
    let req = apply_override(req, &resolver).await;
    next.run(req).await
}

/// Create a cloneable closure wrapping [`method_override_middleware`].
pub fn create_method_override_middleware(
    resolver: Arc<OverrideResolver>,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send>>
+ Clone {
    move |req, next| {
        let resolver = resolver.clone();
        Box::pin(async move { method_override_middleware(req, next, resolver).await })
    }
}

/// Tower layer form of the dispatcher for non-axum tower stacks.
#[derive(Clone)]
pub struct MethodOverrideLayer {
    resolver: Arc<OverrideResolver>,
}

impl MethodOverrideLayer {
    /// Wrap an already-compiled resolver.
    pub fn new(resolver: Arc<OverrideResolver>) -> Self {
        Self { resolver }
    }

    /// Validate and compile a configuration into a layer.
    pub fn from_config(config: &OverrideConfig) -> Result<Self, ValidationError> {
        Ok(Self::new(Arc::new(OverrideResolver::from_config(config)?)))
    }
}

impl Default for MethodOverrideLayer {
    /// Layer with the conventional defaults (POST carrier, standard sources).
    /// The default configuration always validates.
    fn default() -> Self {
        Self::from_config(&OverrideConfig::default())
            .unwrap_or_else(|e| unreachable!("default override config failed validation: {e}"))
    }
}

impl<S> tower::Layer<S> for MethodOverrideLayer {
    type Service = MethodOverride<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MethodOverride {
            inner,
            resolver: self.resolver.clone(),
        }
    }
}

/// Tower service produced by [`MethodOverrideLayer`].
#[derive(Clone)]
pub struct MethodOverride<S> {
    inner: S,
    resolver: Arc<OverrideResolver>,
}

impl<S> tower::Service<Request> for MethodOverride<S>
where
    S: tower::Service<Request> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<S::Response, S::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let resolver = self.resolver.clone();
        // Take the ready service and leave the clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let req = apply_override(req, &resolver).await;
            inner.call(req).await
        })
    }
}

/// Whether the `Content-Type` is `application/x-www-form-urlencoded`
/// (parameters after `;` ignored).
fn is_form_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or("")
                .trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
        .unwrap_or(false)
}

/// Whether a declared `Content-Length` fits the buffering cap. Absent or
/// unparseable lengths pass; the collect cap still bounds chunked bodies.
fn declared_length_within(headers: &HeaderMap, max: usize) -> bool {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .map(|len| len <= max)
        .unwrap_or(true)
}

/// Collect the body into memory, bounded by the configured cap.
async fn buffer_body(
    body: Body,
    max: usize,
) -> Result<Bytes, Box<dyn std::error::Error + Send + Sync>> {
    let collected = Limited::new(body, max).collect().await?;
    Ok(collected.to_bytes())
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::any,
    };
    use tower::{Layer, Service, ServiceExt}; // for oneshot

    use super::*;
    use crate::config::models::{DEFAULT_OVERRIDE_HEADER, OverrideSource};

    async fn echo_method(req: Request) -> String {
        let original = req
            .extensions()
            .get::<OriginalMethod>()
            .map(|m| m.0.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!("{} (was {})", req.method(), original)
    }

    fn app(config: &OverrideConfig) -> Router {
        let resolver = Arc::new(OverrideResolver::from_config(config).unwrap());
        Router::new()
            .route("/{*path}", any(echo_method))
            .layer(middleware::from_fn(create_method_override_middleware(
                resolver,
            )))
    }

    #[tokio::test]
    async fn test_header_override_rewrites_method() {
        let app = app(&OverrideConfig::default());

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/items/1")
                    .header(DEFAULT_OVERRIDE_HEADER, "DELETE")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"DELETE (was POST)");
    }

    #[tokio::test]
    async fn test_form_override_rewrites_method() {
        let app = app(&OverrideConfig::default());

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/items/1")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("_method=put&name=widget"))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"PUT (was POST)");
    }

    #[tokio::test]
    async fn test_get_request_passes_through_untouched() {
        let app = app(&OverrideConfig::default());

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("GET")
                    .uri("/items/1")
                    .header(DEFAULT_OVERRIDE_HEADER, "DELETE")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"GET (was -)");
    }

    #[tokio::test]
    async fn test_buffered_body_is_replayed_downstream() {
        let resolver =
            Arc::new(OverrideResolver::from_config(&OverrideConfig::default()).unwrap());
        let app = Router::new()
            .route(
                "/submit",
                any(|req: Request| async move {
                    let bytes = req.into_body().collect().await.unwrap().to_bytes();
                    String::from_utf8_lossy(&bytes).into_owned()
                }),
            )
            .layer(middleware::from_fn(create_method_override_middleware(
                resolver,
            )));

        // No override signal in the form, but the body still had to be
        // buffered to find that out; downstream must see it intact.
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/submit")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("name=widget&qty=2"))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"name=widget&qty=2");
    }

    #[tokio::test]
    async fn test_bodyless_override_strips_body_and_headers() {
        let resolver =
            Arc::new(OverrideResolver::from_config(&OverrideConfig::default()).unwrap());
        let app = Router::new()
            .route(
                "/items/{id}",
                any(|req: Request| async move {
                    let has_content_type = req.headers().contains_key(header::CONTENT_TYPE);
                    let method = req.method().clone();
                    let bytes = req.into_body().collect().await.unwrap().to_bytes();
                    format!("{} ct={} len={}", method, has_content_type, bytes.len())
                }),
            )
            .layer(middleware::from_fn(create_method_override_middleware(
                resolver,
            )));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/items/7")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("_method=delete"))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"DELETE ct=false len=0");
    }

    #[tokio::test]
    async fn test_oversized_declared_body_skips_form_lookup() {
        let config = OverrideConfig {
            max_form_body_bytes: 8,
            sources: vec![OverrideSource::Form {
                name: "_method".to_string(),
            }],
            ..OverrideConfig::default()
        };
        let app = app(&config);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/items/1")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .header(header::CONTENT_LENGTH, "14")
                    .body(Body::from("_method=delete"))
                    .unwrap(),
            )
            .await
            .unwrap();

        // Body over the cap: the form source is never consulted.
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"POST (was -)");
    }

    #[tokio::test]
    async fn test_non_form_content_type_leaves_body_alone() {
        let app = app(&OverrideConfig::default());

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/items/1")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"_method": "DELETE"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"POST (was -)");
    }

    #[tokio::test]
    async fn test_tower_layer_form() {
        let layer = MethodOverrideLayer::default();
        let svc = tower::service_fn(|req: Request| async move {
            Ok::<_, std::convert::Infallible>(Response::new(Body::from(
                req.method().to_string(),
            )))
        });
        let mut service = layer.layer(svc);

        let response = service
            .ready()
            .await
            .unwrap()
            .call(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/items/1?_method=patch")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"PATCH");
    }

    #[test]
    fn test_form_content_type_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_form_content_type(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded".parse().unwrap(),
        );
        assert!(is_form_content_type(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded; charset=utf-8"
                .parse()
                .unwrap(),
        );
        assert!(is_form_content_type(&headers));

        headers.insert(header::CONTENT_TYPE, "multipart/form-data".parse().unwrap());
        assert!(!is_form_content_type(&headers));
    }

    #[test]
    fn test_declared_length_check() {
        let mut headers = HeaderMap::new();
        assert!(declared_length_within(&headers, 16));

        headers.insert(header::CONTENT_LENGTH, "16".parse().unwrap());
        assert!(declared_length_within(&headers, 16));

        headers.insert(header::CONTENT_LENGTH, "17".parse().unwrap());
        assert!(!declared_length_within(&headers, 16));
    }
}
