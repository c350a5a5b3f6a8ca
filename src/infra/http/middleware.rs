use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const DATASTAR_REQUEST_HEADER: &str = "datastar-request";
const MAX_REQUEST_ID_LEN: usize = 64;

/// Per-request data shared with handlers and the response logger.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Issued by the datastar client rather than a full page navigation.
    pub datastar: bool,
}

impl RequestContext {
    fn from_request(request: &Request<Body>) -> Self {
        let request_id = request
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            request_id,
            datastar: request.headers().contains_key(DATASTAR_REQUEST_HEADER),
        }
    }
}

/// Attach a `RequestContext` and echo its id on the response.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::from_request(&request);
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Log failed requests with their error report; successful ones at debug.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();
    let ctx = request.extensions().get::<RequestContext>().cloned();
    let (request_id, datastar) = match ctx {
        Some(ctx) => (ctx.request_id, ctx.datastar),
        None => (String::new(), false),
    };

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    if !is_failure(status) {
        debug!(
            target: "vitrine::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms,
            datastar,
            request_id = %request_id,
            "request served",
        );
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, messages) = match report {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    if status.is_server_error() {
        error!(
            target: "vitrine::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            elapsed_ms,
            datastar,
            source,
            detail = %detail,
            chain = ?messages,
            request_id = %request_id,
            "request failed",
        );
    } else {
        warn!(
            target: "vitrine::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            elapsed_ms,
            datastar,
            source,
            detail = %detail,
            chain = ?messages,
            request_id = %request_id,
            "client request error",
        );
    }

    response
}

fn is_failure(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use axum::{Extension, Router, middleware, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                get(|Extension(ctx): Extension<RequestContext>| async move {
                    if ctx.datastar { "datastar" } else { "page" }
                }),
            )
            .layer(middleware::from_fn(log_responses))
            .layer(middleware::from_fn(set_request_context))
    }

    #[tokio::test]
    async fn incoming_request_id_is_echoed() {
        let request = Request::builder()
            .uri("/")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .expect("request should build");

        let response = app().oneshot(request).await.expect("router should respond");

        assert_eq!(
            response.headers().get("x-request-id"),
            Some(&HeaderValue::from_static("abc-123"))
        );
        let ctx = response
            .extensions()
            .get::<RequestContext>()
            .expect("context attached");
        assert!(!ctx.datastar);
    }

    #[tokio::test]
    async fn missing_request_id_is_generated() {
        let request = Request::builder()
            .uri("/")
            .header("datastar-request", "true")
            .body(Body::empty())
            .expect("request should build");

        let response = app().oneshot(request).await.expect("router should respond");

        let id = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .expect("generated id");
        assert!(Uuid::parse_str(id).is_ok());
        let ctx = response
            .extensions()
            .get::<RequestContext>()
            .expect("context attached");
        assert!(ctx.datastar);
    }
}
