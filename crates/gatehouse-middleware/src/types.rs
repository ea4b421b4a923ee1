//! Request and response types used by the pipeline.

use std::net::SocketAddr;

use bytes::Bytes;
use gatehouse_core::GatehouseError;
use http::{header, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::Serialize;

/// The HTTP request type used in the pipeline.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the pipeline.
pub type Response = http::Response<Full<Bytes>>;

/// Remote address of the connection, stored in request extensions.
///
/// Hosts insert it when accepting a connection; the rate-limit stage falls
/// back to it when no forwarding header is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

/// Body of a `429 Too Many Requests` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitBody {
    /// Always 429.
    pub code: u16,
    /// Always `Too Many Requests`.
    pub message: &'static str,
    /// Whole seconds until a retry may succeed.
    pub retry_after: u64,
}

/// Builds a JSON response from any serializable value.
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response {
    let body = serde_json::to_vec(value).unwrap_or_default();
    let mut response = http::Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Renders an error as its JSON envelope with the matching status.
pub fn error_response(error: &GatehouseError, request_id: Option<&str>) -> Response {
    json_response(error.status_code(), &error.to_envelope(request_id))
}

/// `429` with a `Retry-After` header and a [`RateLimitBody`].
pub fn too_many_requests(retry_after_seconds: u64) -> Response {
    let body = RateLimitBody {
        code: StatusCode::TOO_MANY_REQUESTS.as_u16(),
        message: "Too Many Requests",
        retry_after: retry_after_seconds,
    };
    let mut response = json_response(StatusCode::TOO_MANY_REQUESTS, &body);
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_seconds));
    response
}
