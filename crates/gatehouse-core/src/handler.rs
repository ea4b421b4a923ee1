//! Collaborator traits.
//!
//! Credential verification and authorization predicates are supplied by the
//! host. The engine only decides which ones apply to a route and in what
//! order they run.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::GatehouseResult;
use crate::principal::ClaimsPrincipal;
use crate::request::RequestView;

/// A boxed future used for object-safe async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Verifies credentials for one authentication scheme.
///
/// Return values:
///
/// - `Ok(Some(principal))`: the scheme authenticated the request
/// - `Ok(None)`: the scheme found no usable credentials
/// - `Err(_)`: the credentials were present but invalid
///
/// The engine tries schemes in registration order and stops at the first
/// `Ok(Some(_))`. `Ok(None)` and `Err(_)` both move on to the next scheme.
///
/// # Example
///
/// ```rust
/// use gatehouse_core::{AuthenticationHandler, BoxFuture, ClaimsPrincipal, GatehouseResult, RequestView};
///
/// struct ApiKey;
///
/// impl AuthenticationHandler for ApiKey {
///     fn authenticate<'a>(
///         &'a self,
///         request: &'a RequestView<'a>,
///     ) -> BoxFuture<'a, GatehouseResult<Option<ClaimsPrincipal>>> {
///         Box::pin(async move {
///             Ok(request
///                 .header("x-api-key")
///                 .filter(|key| *key == "secret")
///                 .map(|_| ClaimsPrincipal::new("service-a")))
///         })
///     }
/// }
/// ```
pub trait AuthenticationHandler: Send + Sync + 'static {
    /// Attempts to authenticate the request.
    fn authenticate<'a>(
        &'a self,
        request: &'a RequestView<'a>,
    ) -> BoxFuture<'a, GatehouseResult<Option<ClaimsPrincipal>>>;
}

/// A named authorization predicate over an authenticated principal.
///
/// Any `Fn(&ClaimsPrincipal) -> bool` closure is a policy.
pub trait AuthorizationPolicy: Send + Sync + 'static {
    /// Returns true if `principal` satisfies the policy.
    fn evaluate(&self, principal: &ClaimsPrincipal) -> bool;
}

impl<F> AuthorizationPolicy for F
where
    F: Fn(&ClaimsPrincipal) -> bool + Send + Sync + 'static,
{
    fn evaluate(&self, principal: &ClaimsPrincipal) -> bool {
        self(principal)
    }
}

/// Adapts a synchronous closure into an [`AuthenticationHandler`].
pub struct FnAuthenticator<F> {
    func: F,
}

impl<F> FnAuthenticator<F>
where
    F: Fn(&RequestView<'_>) -> GatehouseResult<Option<ClaimsPrincipal>> + Send + Sync + 'static,
{
    /// Wraps `func`.
    #[must_use]
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for FnAuthenticator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAuthenticator").finish_non_exhaustive()
    }
}

impl<F> AuthenticationHandler for FnAuthenticator<F>
where
    F: Fn(&RequestView<'_>) -> GatehouseResult<Option<ClaimsPrincipal>> + Send + Sync + 'static,
{
    fn authenticate<'a>(
        &'a self,
        request: &'a RequestView<'a>,
    ) -> BoxFuture<'a, GatehouseResult<Option<ClaimsPrincipal>>> {
        let result = (self.func)(request);
        Box::pin(std::future::ready(result))
    }
}

/// Creates an authentication handler from a synchronous closure.
///
/// ```rust
/// use gatehouse_core::{fn_authenticator, ClaimsPrincipal};
///
/// let handler = fn_authenticator(|req| {
///     Ok(req.bearer_token().map(|token| ClaimsPrincipal::new(token)))
/// });
/// # let _ = handler;
/// ```
#[must_use]
pub const fn fn_authenticator<F>(func: F) -> FnAuthenticator<F>
where
    F: Fn(&RequestView<'_>) -> GatehouseResult<Option<ClaimsPrincipal>> + Send + Sync + 'static,
{
    FnAuthenticator::new(func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatehouseError;
    use http::{HeaderMap, Method, Uri};

    #[test]
    fn test_fn_authenticator() {
        let handler = fn_authenticator(|req| match req.header("x-user") {
            Some("bad") => Err(GatehouseError::authentication("rejected")),
            Some(user) => Ok(Some(ClaimsPrincipal::new(user))),
            None => Ok(None),
        });

        let method = Method::GET;
        let uri = Uri::from_static("/");
        let mut headers = HeaderMap::new();

        let view = RequestView::new(&method, &uri, &headers);
        let result = tokio_test::block_on(handler.authenticate(&view)).unwrap();
        assert!(result.is_none());

        headers.insert("x-user", "alice".parse().unwrap());
        let view = RequestView::new(&method, &uri, &headers);
        let result = tokio_test::block_on(handler.authenticate(&view)).unwrap();
        assert_eq!(result.unwrap().subject(), "alice");

        headers.insert("x-user", "bad".parse().unwrap());
        let view = RequestView::new(&method, &uri, &headers);
        assert!(tokio_test::block_on(handler.authenticate(&view)).is_err());
    }

    #[test]
    fn test_closure_is_policy() {
        let policy = |p: &ClaimsPrincipal| p.is_in_role("admin");
        assert!(policy.evaluate(&ClaimsPrincipal::new("a").with_role("admin")));
        assert!(!policy.evaluate(&ClaimsPrincipal::new("b")));
    }
}
