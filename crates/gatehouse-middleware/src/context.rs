//! Per-request state carried through the pipeline.

use std::time::{Duration, Instant};

use gatehouse_core::ClaimsPrincipal;
use http::HeaderMap;
use uuid::Uuid;

/// Header a caller or upstream proxy may use to supply a request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// State that flows through the middleware chain.
///
/// The authentication stage stores the principal here; later stages and the
/// terminal handler read it back.
///
/// # Example
///
/// ```
/// use gatehouse_core::ClaimsPrincipal;
/// use gatehouse_middleware::MiddlewareContext;
///
/// let mut ctx = MiddlewareContext::new();
/// assert!(ctx.principal().is_none());
///
/// ctx.set_principal(ClaimsPrincipal::new("user-1"), "bearer");
/// assert_eq!(ctx.principal().unwrap().subject(), "user-1");
/// assert_eq!(ctx.scheme(), Some("bearer"));
/// ```
#[derive(Debug)]
pub struct MiddlewareContext {
    request_id: String,
    principal: Option<ClaimsPrincipal>,
    scheme: Option<String>,
    client_key: Option<String>,
    started_at: Instant,
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareContext {
    /// Creates a context with a fresh UUID v7 request ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(Uuid::now_v7().to_string())
    }

    /// Creates a context with a specific request ID.
    #[must_use]
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            principal: None,
            scheme: None,
            client_key: None,
            started_at: Instant::now(),
        }
    }

    /// Reuses a non-empty `x-request-id` header, or generates an ID.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map_or_else(Self::new, Self::with_request_id)
    }

    /// The request ID.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The authenticated principal, if any.
    #[must_use]
    pub fn principal(&self) -> Option<&ClaimsPrincipal> {
        self.principal.as_ref()
    }

    /// The scheme that produced the principal.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Records the authenticated principal.
    pub fn set_principal(&mut self, principal: ClaimsPrincipal, scheme: impl Into<String>) {
        self.principal = Some(principal);
        self.scheme = Some(scheme.into());
    }

    /// The rate-limit key the client was charged under.
    #[must_use]
    pub fn client_key(&self) -> Option<&str> {
        self.client_key.as_deref()
    }

    /// Records the rate-limit key.
    pub fn set_client_key(&mut self, client_key: impl Into<String>) {
        self.client_key = Some(client_key.into());
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
