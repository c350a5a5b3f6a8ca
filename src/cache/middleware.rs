//! L1 response cache middleware.
//!
//! Caches GET responses of data-independent routes. Datastar requests and
//! streamed responses always reach the handler.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument};

use super::{
    CacheConfig, L1Store,
    keys::{L1Key, hash_query},
    store::CachedResponse,
};

const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub l1: Arc<L1Store>,
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enable_l1_cache
        || request.method() != Method::GET
        || request.headers().contains_key("datastar-request")
    {
        return next.run(request).await;
    }

    let l1_key = L1Key::Response {
        path: request.uri().path().to_string(),
        query_hash: hash_query(request.uri().query().unwrap_or("")),
    };

    if let Some(cached) = cache.l1.get(&l1_key) {
        debug!(cache = "l1", outcome = "hit", "serving cached response");
        return build_response(cached);
    }

    debug!(cache = "l1", outcome = "miss", "cache miss, executing handler");

    let response = next.run(request).await;
    if response.status() != StatusCode::OK || is_event_stream(&response) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect(),
        body: bytes.clone(),
    };

    debug!(cache = "l1", "caching response");
    if let Some(evicted) = cache.l1.set(l1_key, cached) {
        debug!(cache = "l1", evicted = ?evicted, "response evicted");
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn is_event_stream(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream"))
}

fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Router, middleware, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn router(config: CacheConfig, calls: Arc<AtomicUsize>) -> (Router, Arc<L1Store>) {
        let l1 = Arc::new(L1Store::new(&config));
        let state = CacheState {
            config,
            l1: l1.clone(),
        };
        let router = Router::new()
            .route(
                "/",
                get(move || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        "home"
                    }
                }),
            )
            .route(
                "/stream",
                get(|| async { ([(header::CONTENT_TYPE, "text/event-stream")], "data: x\n\n") }),
            )
            .layer(middleware::from_fn_with_state(state, response_cache_layer));
        (router, l1)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (router, l1) = router(CacheConfig::default(), calls.clone());

        for _ in 0..2 {
            let response = router.clone().oneshot(get_request("/")).await.expect("response");
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(l1.len(), 1);
    }

    #[tokio::test]
    async fn datastar_requests_bypass_the_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (router, l1) = router(CacheConfig::default(), calls.clone());

        let request = Request::builder()
            .uri("/")
            .header("datastar-request", "true")
            .body(Body::empty())
            .expect("request");
        router.oneshot(request).await.expect("response");

        assert!(l1.is_empty());
    }

    #[tokio::test]
    async fn event_streams_are_not_cached() {
        let (router, l1) = router(CacheConfig::default(), Arc::new(AtomicUsize::new(0)));
        router.oneshot(get_request("/stream")).await.expect("response");
        assert!(l1.is_empty());
    }

    #[tokio::test]
    async fn disabled_cache_runs_the_handler_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = CacheConfig {
            enable_l1_cache: false,
            ..Default::default()
        };
        let (router, _) = router(config, calls.clone());

        for _ in 0..2 {
            router.clone().oneshot(get_request("/")).await.expect("response");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
