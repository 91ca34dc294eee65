//! Onion middleware pipeline.
//!
//! Each middleware wraps the rest of the chain: it receives the mutable
//! request context and a [`Next`] handle, may run `next` to proceed into
//! the inner handlers, inspect the context after they return, or
//! short-circuit by never running `next`. The innermost stage is a
//! synthesized terminal handler that invokes the matched service method.
//!
//! The pipeline itself never surfaces an error: any `Err` from a
//! middleware or the terminal handler that no enclosing stage caught is
//! recorded into the context as a `ServerError` at the outer boundary.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use osprey_protocol::StatusCode;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::InvokeError;
use crate::router::ServiceDescriptor;

/// One middleware stage.
///
/// Implementations return a boxed future so the trait stays object-safe;
/// the usual body is `Box::pin(async move { ... next.run(ctx).await ... })`.
pub trait Middleware: Send + Sync {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<(), InvokeError>>;

    /// Middleware name for debugging.
    fn name(&self) -> &str {
        "middleware"
    }
}

/// Handle to the remaining (inner) stages of the chain.
pub struct Next<'a> {
    stack: &'a [Arc<dyn Middleware>],
    descriptor: &'a ServiceDescriptor,
}

impl<'a> Next<'a> {
    /// Run the rest of the chain. Not calling this short-circuits: the
    /// terminal handler never runs and the context is returned as the
    /// middleware left it.
    pub fn run<'b>(self, ctx: &'b mut RequestContext) -> BoxFuture<'b, Result<(), InvokeError>>
    where
        'a: 'b,
    {
        Box::pin(async move {
            match self.stack.split_first() {
                Some((head, rest)) => {
                    head.handle(
                        ctx,
                        Next {
                            stack: rest,
                            descriptor: self.descriptor,
                        },
                    )
                    .await
                }
                None => terminal(ctx, self.descriptor).await,
            }
        })
    }
}

/// The innermost stage: invoke the matched method with the request's
/// argument sequence plus the call context appended, and store the result
/// in the context body. Status is set to `Ok` before the invocation; a
/// failure afterwards overwrites it at the pipeline boundary.
async fn terminal(
    ctx: &mut RequestContext,
    descriptor: &ServiceDescriptor,
) -> Result<(), InvokeError> {
    ctx.set_status(StatusCode::Ok);
    let call = ctx.call_context();
    let args = ctx.request().args.clone();
    let value = descriptor.invoke(&call.method, args, &call).await?;
    ctx.set_res(value);
    Ok(())
}

/// The composed chain: registered middleware in `use` order plus the
/// terminal handler.
pub struct MiddlewarePipeline {
    handlers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    pub fn new(handlers: Vec<Arc<dyn Middleware>>) -> Self {
        Self { handlers }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the chain for one request. Never returns an error and never
    /// panics across requests: an uncaught failure lands in the context
    /// as `ServerError` with the error message in the body.
    pub async fn run(&self, ctx: &mut RequestContext, descriptor: &ServiceDescriptor) {
        let next = Next {
            stack: &self.handlers,
            descriptor,
        };
        if let Err(e) = next.run(ctx).await {
            debug!(
                "pipeline failed for {}#{}: {e}",
                ctx.request().attachment.path,
                ctx.request().method
            );
            ctx.fail(StatusCode::ServerError, e.to_string());
        }
    }
}
