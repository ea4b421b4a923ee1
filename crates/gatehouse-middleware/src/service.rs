//! A `hyper` service that runs the pipeline in front of a handler.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use gatehouse_core::GatehouseError;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use tracing::warn;

use crate::context::MiddlewareContext;
use crate::pipeline::Pipeline;
use crate::types::{error_response, PeerAddr, Request, Response};

/// Wraps a handler with the security pipeline.
///
/// Create one per connection with [`with_peer_addr`](Self::with_peer_addr)
/// so the rate-limit stage can fall back to the socket address:
///
/// ```ignore
/// let (stream, addr) = listener.accept().await?;
/// let service = service.clone().with_peer_addr(addr);
/// http1::Builder::new().serve_connection(TokioIo::new(stream), service).await?;
/// ```
pub struct SecurityService<H> {
    pipeline: Arc<Pipeline>,
    handler: H,
    peer_addr: Option<SocketAddr>,
}

impl<H: Clone> Clone for SecurityService<H> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            handler: self.handler.clone(),
            peer_addr: self.peer_addr,
        }
    }
}

impl<H> fmt::Debug for SecurityService<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityService")
            .field("pipeline", &self.pipeline)
            .field("peer_addr", &self.peer_addr)
            .finish_non_exhaustive()
    }
}

impl<H, Fut> SecurityService<H>
where
    H: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    /// Creates the service.
    pub fn new(pipeline: Arc<Pipeline>, handler: H) -> Self {
        Self {
            pipeline,
            handler,
            peer_addr: None,
        }
    }

    /// Sets the remote address of the connection.
    #[must_use]
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Runs an already-buffered request through the pipeline.
    pub async fn handle(&self, mut request: Request) -> Response {
        if let Some(addr) = self.peer_addr {
            request.extensions_mut().insert(PeerAddr(addr));
        }
        let ctx = MiddlewareContext::from_headers(request.headers());
        let handler = self.handler.clone();
        self.pipeline
            .process(ctx, request, move |_ctx, request| Box::pin(handler(request)))
            .await
    }
}

impl<H, Fut, B> hyper::service::Service<http::Request<B>> for SecurityService<H>
where
    H: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: fmt::Display,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn call(&self, request: http::Request<B>) -> Self::Future {
        let service = self.clone();
        async move {
            let (parts, body) = request.into_parts();
            let bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(error) => {
                    warn!(%error, "failed to read request body");
                    let error = GatehouseError::internal("failed to read request body");
                    return Ok(error_response(&error, None));
                }
            };
            let request = http::Request::from_parts(parts, Full::new(bytes));
            Ok(service.handle(request).await)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::{fn_authenticator, ClaimsPrincipal};
    use gatehouse_policy::{
        AuthenticationSchemes, AuthorizationPolicies, ResolverOptions, RouteSpec, SecurityPolicyBuilder,
        SecurityResolver,
    };
    use gatehouse_ratelimit::{FixedWindowOptions, LimiterRegistry};
    use http::{Method, StatusCode};
    use hyper::service::Service;
    use std::time::Duration;

    fn pipeline() -> Arc<Pipeline> {
        let mut schemes = AuthenticationSchemes::new();
        schemes
            .add(
                "token",
                fn_authenticator(|req| Ok(req.bearer_token().map(ClaimsPrincipal::new))),
            )
            .unwrap();

        let mut limiters = LimiterRegistry::new();
        limiters
            .add_fixed_window("per-ip", FixedWindowOptions::new(1, Duration::from_secs(60)))
            .unwrap();

        let mut builder = SecurityPolicyBuilder::new();
        builder
            .route(RouteSpec::new(Method::POST, "/echo").allow_anonymous().limiters(["per-ip"]))
            .unwrap()
            .route(RouteSpec::new(Method::GET, "/me").schemes(["token"]))
            .unwrap();

        let resolver = SecurityResolver::new(
            builder.build(),
            schemes,
            AuthorizationPolicies::new(),
            Arc::new(limiters),
            ResolverOptions::default(),
        );
        Arc::new(Pipeline::new(Arc::new(resolver)))
    }

    async fn echo(request: Request) -> Response {
        let subject = request
            .extensions()
            .get::<ClaimsPrincipal>()
            .map(|p| p.subject().to_string());
        match subject {
            Some(subject) => http::Response::new(Full::new(Bytes::from(subject))),
            None => http::Response::new(request.into_body()),
        }
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_body_reaches_handler() {
        let service = SecurityService::new(pipeline(), echo).with_peer_addr("10.0.0.1:4000".parse().unwrap());
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .body(Full::new(Bytes::from("hello")))
            .unwrap();

        let response = service.call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "hello");
    }

    #[tokio::test]
    async fn test_peer_addr_keys_rate_limit() {
        let service = SecurityService::new(pipeline(), echo);
        let first = service.clone().with_peer_addr("10.0.0.1:4000".parse().unwrap());
        let second = service.with_peer_addr("10.0.0.2:4000".parse().unwrap());

        let post = || {
            http::Request::builder()
                .method(Method::POST)
                .uri("/echo")
                .body(Full::new(Bytes::new()))
                .unwrap()
        };

        assert_eq!(first.call(post()).await.unwrap().status(), StatusCode::OK);
        assert_eq!(
            first.call(post()).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(second.call(post()).await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_principal_reaches_handler() {
        let service = SecurityService::new(pipeline(), echo);
        let request = http::Request::builder()
            .uri("/me")
            .header("authorization", "Bearer alice")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = service.call(request).await.unwrap();
        assert_eq!(body_string(response).await, "alice");

        let anonymous = http::Request::builder().uri("/me").body(Full::new(Bytes::new())).unwrap();
        let response = service.call(anonymous).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
