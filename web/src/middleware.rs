//! Per-request context: correlation id, tracing span, request counter.
//!
//! The correlation id is the client's `X-Correlation-ID` when that parses as
//! a UUID, otherwise a fresh v4. Handlers read it through
//! [`CorrelationId`](crate::extractors::CorrelationId); the response echoes
//! it back. Every response increments `http.requests{method, status}`.

use axum::{extract::Request, http::HeaderValue, response::Response};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Request and response header carrying the correlation id.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Wrap routes with [`RequestContext`].
#[must_use]
pub const fn request_context_layer() -> RequestContextLayer {
    RequestContextLayer
}

/// Tower layer built by [`request_context_layer`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestContextLayer;

impl<S> Layer<S> for RequestContextLayer {
    type Service = RequestContext<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContext { inner }
    }
}

/// Service produced by [`RequestContextLayer`].
#[derive(Clone, Debug)]
pub struct RequestContext<S> {
    inner: S,
}

fn incoming_correlation_id(req: &Request) -> Option<Uuid> {
    let raw = req.headers().get(CORRELATION_ID_HEADER)?.to_str().ok()?;
    Uuid::parse_str(raw).ok()
}

impl<S> Service<Request> for RequestContext<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let id = incoming_correlation_id(&req).unwrap_or_else(Uuid::new_v4);
        req.extensions_mut().insert(id);

        let method = req.method().clone();
        let span = tracing::info_span!(
            "http_request",
            correlation_id = %id,
            %method,
            uri = %req.uri(),
        );
        let response = self.inner.call(req).instrument(span);

        Box::pin(async move {
            let mut response = response.await?;
            let status = response.status().as_u16().to_string();
            metrics::counter!("http.requests", "method" => method.to_string(), "status" => status)
                .increment(1);
            if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
                response.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::extractors::CorrelationId;
    use axum::{Router, body::Body, routing::get};
    use tower::ServiceExt;

    async fn call(header: Option<&str>, path: &str) -> Response {
        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route(
                "/echo",
                get(|CorrelationId(id): CorrelationId| async move { id.to_string() }),
            )
            .layer(request_context_layer());

        let mut req = Request::builder().uri(path);
        if let Some(value) = header {
            req = req.header(CORRELATION_ID_HEADER, value);
        }
        app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
    }

    fn echoed(response: &Response) -> Uuid {
        let raw = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("correlation id echoed")
            .to_str()
            .unwrap();
        Uuid::parse_str(raw).unwrap()
    }

    #[tokio::test]
    async fn mints_an_id_when_the_client_sends_none() {
        let response = call(None, "/health").await;
        assert!(!echoed(&response).is_nil());
    }

    #[tokio::test]
    async fn keeps_a_valid_client_id() {
        let id = Uuid::new_v4();
        let response = call(Some(&id.to_string()), "/health").await;
        assert_eq!(echoed(&response), id);
    }

    #[tokio::test]
    async fn replaces_a_malformed_client_id() {
        let response = call(Some("not-a-uuid"), "/health").await;
        assert!(!echoed(&response).is_nil());
    }

    #[tokio::test]
    async fn handlers_see_the_echoed_id() {
        let response = call(None, "/echo").await;
        let id = echoed(&response);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, id.to_string().as_bytes());
    }
}
