//! Rate limiting stage.
//!
//! The stage derives a client key from the request, asks the provider for
//! permits and holds the resulting lease until the downstream response is
//! produced. Denials become `429 Too Many Requests` with a `Retry-After`
//! header and a JSON body:
//!
//! ```json
//! {"code": 429, "message": "Too Many Requests", "retryAfter": 5}
//! ```

use std::fmt;
use std::sync::Arc;

use gatehouse_core::{retry_after_seconds, BoxFuture};
use gatehouse_policy::{RateLimitDecision, SecurityProvider};
use tracing::debug;

use crate::context::MiddlewareContext;
use crate::middleware::{Middleware, Next};
use crate::types::{too_many_requests, PeerAddr, Request, Response};

/// Key used when nothing identifies the client.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Key shared by every request under [`KeyExtractor::Global`].
pub const GLOBAL_KEY: &str = "global";

/// Client address for rate limiting.
///
/// Tries the first hop of `X-Forwarded-For`, then `X-Real-IP`, then the
/// [`PeerAddr`] extension, then [`UNKNOWN_CLIENT`].
pub fn client_address(request: &Request) -> String {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = header("x-real-ip").map(str::trim).filter(|ip| !ip.is_empty()) {
        return real_ip.to_string();
    }

    request
        .extensions()
        .get::<PeerAddr>()
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |peer| peer.0.ip().to_string())
}

/// How the rate-limit key is derived from a request.
///
/// Extractors that find nothing fall back to [`client_address`], so a
/// client cannot escape its limit by omitting a header.
#[derive(Clone, Default)]
pub enum KeyExtractor {
    /// Client address.
    #[default]
    ClientAddress,
    /// Value of a request header, such as an API key.
    Header(String),
    /// Subject of the authenticated principal.
    Subject,
    /// One key for every request.
    Global,
    /// Custom function.
    Custom(Arc<dyn Fn(&Request, &MiddlewareContext) -> Option<String> + Send + Sync>),
}

impl KeyExtractor {
    /// Derives the key for `request`.
    pub fn extract(&self, request: &Request, ctx: &MiddlewareContext) -> String {
        let key = match self {
            Self::ClientAddress => None,
            Self::Header(name) => request
                .headers()
                .get(name.as_str())
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(String::from),
            Self::Subject => ctx.principal().map(|principal| principal.subject().to_string()),
            Self::Global => Some(GLOBAL_KEY.to_string()),
            Self::Custom(f) => f(request, ctx),
        };
        key.unwrap_or_else(|| client_address(request))
    }
}

impl fmt::Debug for KeyExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientAddress => f.write_str("KeyExtractor::ClientAddress"),
            Self::Header(name) => f.debug_tuple("KeyExtractor::Header").field(name).finish(),
            Self::Subject => f.write_str("KeyExtractor::Subject"),
            Self::Global => f.write_str("KeyExtractor::Global"),
            Self::Custom(_) => f.write_str("KeyExtractor::Custom(<fn>)"),
        }
    }
}

type SkipPredicate = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Enforces the route's rate limiters.
pub struct RateLimitStage {
    provider: Arc<dyn SecurityProvider>,
    key_extractor: KeyExtractor,
    skip: Option<SkipPredicate>,
}

impl RateLimitStage {
    /// Creates the stage keyed by client address.
    pub fn new(provider: Arc<dyn SecurityProvider>) -> Self {
        Self {
            provider,
            key_extractor: KeyExtractor::default(),
            skip: None,
        }
    }

    /// Sets the key extractor.
    #[must_use]
    pub fn key_extractor(mut self, extractor: KeyExtractor) -> Self {
        self.key_extractor = extractor;
        self
    }

    /// Keys by the value of `header`.
    #[must_use]
    pub fn per_header(self, header: impl Into<String>) -> Self {
        self.key_extractor(KeyExtractor::Header(header.into()))
    }

    /// Keys by authenticated subject.
    #[must_use]
    pub fn per_subject(self) -> Self {
        self.key_extractor(KeyExtractor::Subject)
    }

    /// Uses one key for all requests.
    #[must_use]
    pub fn global(self) -> Self {
        self.key_extractor(KeyExtractor::Global)
    }

    /// Uses a custom key function.
    #[must_use]
    pub fn custom_key<F>(self, f: F) -> Self
    where
        F: Fn(&Request, &MiddlewareContext) -> Option<String> + Send + Sync + 'static,
    {
        self.key_extractor(KeyExtractor::Custom(Arc::new(f)))
    }

    /// Skips rate limiting for requests matching `predicate`.
    ///
    /// ```ignore
    /// stage.skip(|req| req.uri().path() == "/health")
    /// ```
    #[must_use]
    pub fn skip<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(predicate));
        self
    }

    /// The configured extractor.
    pub fn extractor(&self) -> &KeyExtractor {
        &self.key_extractor
    }
}

impl fmt::Debug for RateLimitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitStage")
            .field("key_extractor", &self.key_extractor)
            .field("skip", &self.skip.is_some())
            .finish_non_exhaustive()
    }
}

impl Middleware for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if self.skip.as_ref().is_some_and(|skip| skip(&request)) {
                return next.run(ctx, request).await;
            }

            let key = self.key_extractor.extract(&request, ctx);
            let decision = self.provider.rate_limit(request.method(), request.uri().path(), &key);
            ctx.set_client_key(key);

            match decision {
                RateLimitDecision::Allowed(lease) => {
                    let response = next.run(ctx, request).await;
                    drop(lease);
                    response
                }
                RateLimitDecision::Limited { retry_after, limiter, .. } => {
                    let seconds = retry_after_seconds(retry_after);
                    debug!(
                        method = %request.method(),
                        path = request.uri().path(),
                        client_key = ctx.client_key().unwrap_or(UNKNOWN_CLIENT),
                        limiter = %limiter,
                        retry_after_secs = seconds,
                        "request rate limited"
                    );
                    too_many_requests(seconds)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use gatehouse_core::ClaimsPrincipal;
    use http_body_util::Full;

    fn request_with(headers: &[(&str, &str)]) -> Request {
        let mut builder = http::Request::builder().uri("/api/test");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let request = request_with(&[("x-forwarded-for", "192.168.1.1, 10.0.0.1, 172.16.0.1")]);
        assert_eq!(client_address(&request), "192.168.1.1");
    }

    #[test]
    fn test_real_ip_then_peer() {
        let request = request_with(&[("x-real-ip", "10.1.1.1")]);
        assert_eq!(client_address(&request), "10.1.1.1");

        let mut request = request_with(&[]);
        request
            .extensions_mut()
            .insert(PeerAddr("127.0.0.1:5000".parse().unwrap()));
        assert_eq!(client_address(&request), "127.0.0.1");

        assert_eq!(client_address(&request_with(&[])), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_header_extractor_falls_back() {
        let extractor = KeyExtractor::Header("x-api-key".to_string());
        let ctx = MiddlewareContext::new();

        let request = request_with(&[("x-api-key", "key-1"), ("x-real-ip", "10.0.0.9")]);
        assert_eq!(extractor.extract(&request, &ctx), "key-1");

        let request = request_with(&[("x-real-ip", "10.0.0.9")]);
        assert_eq!(extractor.extract(&request, &ctx), "10.0.0.9");
    }

    #[test]
    fn test_subject_extractor() {
        let request = request_with(&[("x-real-ip", "10.0.0.9")]);
        let mut ctx = MiddlewareContext::new();
        assert_eq!(KeyExtractor::Subject.extract(&request, &ctx), "10.0.0.9");

        ctx.set_principal(ClaimsPrincipal::new("user-7"), "bearer");
        assert_eq!(KeyExtractor::Subject.extract(&request, &ctx), "user-7");
    }

    #[test]
    fn test_global_and_custom_extractors() {
        let request = request_with(&[]);
        let ctx = MiddlewareContext::new();
        assert_eq!(KeyExtractor::Global.extract(&request, &ctx), GLOBAL_KEY);

        let custom = KeyExtractor::Custom(Arc::new(|req: &Request, _: &MiddlewareContext| {
            Some(format!("path:{}", req.uri().path()))
        }));
        assert_eq!(custom.extract(&request, &ctx), "path:/api/test");
        assert_eq!(format!("{custom:?}"), "KeyExtractor::Custom(<fn>)");
    }

    #[test]
    fn test_default_extractor() {
        assert!(matches!(KeyExtractor::default(), KeyExtractor::ClientAddress));
    }
}
