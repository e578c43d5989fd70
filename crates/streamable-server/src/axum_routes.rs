//! Thin `axum` binding (§10.4) on top of the framework-agnostic
//! [`crate::http_adapter`], mirroring the teacher's own split between
//! `mcp_http` (generic) and `hyper_servers::routes::streamable_http_routes`
//! (axum-flavored) — one route handler per HTTP method, each converting
//! axum's extractors into a [`RequestContext`] and handing off to
//! [`respond`].

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::Router;
use http::{HeaderMap, Method};

use crate::adapter::RequestContext;
use crate::http_adapter::respond;
use crate::transport::{StreamableHttpTransport, TransportHandler};

/// Builds the three-method router (`GET`/`POST`/`DELETE`) for `path`,
/// dispatching every request into `transport`.
///
/// The returned [`Router`] is unparameterized over its own state — callers
/// merge it into their own app with [`Router::merge`] after attaching
/// whatever state their non-MCP routes need.
pub fn routes<H: TransportHandler>(
    path: &str,
    transport: Arc<StreamableHttpTransport<H>>,
) -> Router {
    Router::new()
        .route(path, get(handle_get::<H>))
        .route(path, post(handle_post::<H>))
        .route(path, delete(handle_delete::<H>))
        .with_state(transport)
}

async fn handle_get<H: TransportHandler>(
    headers: HeaderMap,
    State(transport): State<Arc<StreamableHttpTransport<H>>>,
) -> impl IntoResponse {
    dispatch(transport, Method::GET, headers, String::new()).await
}

async fn handle_post<H: TransportHandler>(
    headers: HeaderMap,
    State(transport): State<Arc<StreamableHttpTransport<H>>>,
    body: String,
) -> impl IntoResponse {
    dispatch(transport, Method::POST, headers, body).await
}

async fn handle_delete<H: TransportHandler>(
    headers: HeaderMap,
    State(transport): State<Arc<StreamableHttpTransport<H>>>,
) -> impl IntoResponse {
    dispatch(transport, Method::DELETE, headers, String::new()).await
}

async fn dispatch<H: TransportHandler>(
    transport: Arc<StreamableHttpTransport<H>>,
    method: Method,
    headers: HeaderMap,
    body: String,
) -> axum::response::Response {
    let ctx = RequestContext::new(method, headers, body);
    let response = respond(transport, ctx).await;
    let (parts, body) = response.into_parts();
    axum::response::Response::from_parts(parts, axum::body::Body::new(body))
}
