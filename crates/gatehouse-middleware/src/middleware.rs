//! The middleware trait and the chain continuation.

use gatehouse_core::BoxFuture;

use crate::context::MiddlewareContext;
use crate::types::{Request, Response};

/// One stage of the pipeline.
///
/// A stage either calls `next.run(..)` exactly once or short-circuits with
/// its own response. Anything a stage must hold for the lifetime of the
/// request (such as a rate-limit lease) stays alive across the `next` call.
///
/// # Example
///
/// ```
/// use gatehouse_core::BoxFuture;
/// use gatehouse_middleware::{Middleware, MiddlewareContext, Next, Request, Response};
///
/// struct Timing;
///
/// impl Middleware for Timing {
///     fn name(&self) -> &'static str {
///         "timing"
///     }
///
///     fn process<'a>(
///         &'a self,
///         ctx: &'a mut MiddlewareContext,
///         request: Request,
///         next: Next<'a>,
///     ) -> BoxFuture<'a, Response> {
///         Box::pin(async move {
///             let response = next.run(ctx, request).await;
///             tracing::debug!(elapsed_ms = ctx.elapsed().as_millis() as u64, "request finished");
///             response
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    /// Stage name for logs.
    fn name(&self) -> &'static str;

    /// Processes the request, usually by delegating to `next`.
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

type Terminal<'a> = Box<dyn FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a>;

/// The rest of the chain after the current stage.
///
/// Consumed by [`Next::run`], so it can only be invoked once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(Terminal<'a>),
}

impl<'a> Next<'a> {
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    pub(crate) fn handler<F>(f: F) -> Self
    where
        F: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Handler(Box::new(f)),
        }
    }

    /// Runs the next stage, or the handler at the end of the chain.
    pub async fn run(self, ctx: &mut MiddlewareContext, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(ctx, request, *next).await,
            NextInner::Handler(handler) => handler(ctx, request).await,
        }
    }
}
