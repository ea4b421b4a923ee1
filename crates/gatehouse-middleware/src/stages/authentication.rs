//! Authentication stage.

use std::sync::Arc;

use gatehouse_core::{BoxFuture, ClaimsPrincipal, GatehouseError, RequestView};
use gatehouse_policy::{AuthenticationOutcome, SecurityProvider};
use tracing::debug;

use crate::context::MiddlewareContext;
use crate::middleware::{Middleware, Next};
use crate::stages::rate_limit::client_address;
use crate::types::{error_response, Request, Response};

/// Runs the route's authentication schemes.
///
/// On success the principal is stored in the [`MiddlewareContext`] and
/// inserted into the request extensions, so handlers can read it with
/// `request.extensions().get::<ClaimsPrincipal>()`. Allow-anonymous routes
/// continue without a principal. Anything else is answered with `401` and
/// the JSON error envelope.
pub struct AuthenticationStage {
    provider: Arc<dyn SecurityProvider>,
}

impl AuthenticationStage {
    /// Creates the stage.
    pub fn new(provider: Arc<dyn SecurityProvider>) -> Self {
        Self { provider }
    }
}

impl std::fmt::Debug for AuthenticationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationStage").finish_non_exhaustive()
    }
}

impl Middleware for AuthenticationStage {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let outcome = {
                let client = client_address(&request);
                let view = RequestView::from_request(&request).with_client_key(&client);
                self.provider.authenticate(&view).await
            };

            match outcome {
                AuthenticationOutcome::Authenticated { principal, scheme } => {
                    request.extensions_mut().insert::<ClaimsPrincipal>(principal.clone());
                    ctx.set_principal(principal, scheme);
                }
                AuthenticationOutcome::Anonymous => {}
                AuthenticationOutcome::Unauthorized => {
                    debug!(
                        method = %request.method(),
                        path = request.uri().path(),
                        request_id = ctx.request_id(),
                        "request not authenticated"
                    );
                    let error = GatehouseError::authentication("authentication required");
                    return error_response(&error, Some(ctx.request_id()));
                }
            }

            next.run(ctx, request).await
        })
    }
}
