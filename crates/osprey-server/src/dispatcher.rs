//! Request dispatch: decode → route → pipeline → encode.

use std::sync::Arc;

use bytes::Bytes;
use osprey_protocol::{Codec, RpcResponse, StatusCode};
use osprey_transport::RequestHandler;
use tracing::debug;

use crate::context::RequestContext;
use crate::middleware::MiddlewarePipeline;
use crate::router::ServiceRouter;

/// Orchestrates the full life of one message and isolates its failures:
/// whatever happens, the output is a well-formed encoded response frame.
pub struct RequestDispatcher {
    router: Arc<ServiceRouter>,
    pipeline: MiddlewarePipeline,
    codec: Arc<dyn Codec>,
}

impl RequestDispatcher {
    pub fn new(
        router: Arc<ServiceRouter>,
        pipeline: MiddlewarePipeline,
        codec: Arc<dyn Codec>,
    ) -> Self {
        Self {
            router,
            pipeline,
            codec,
        }
    }

    pub fn router(&self) -> &ServiceRouter {
        &self.router
    }
}

impl RequestHandler for RequestDispatcher {
    async fn dispatch(&self, frame: Bytes) -> Bytes {
        let request = match self.codec.decode_request(frame) {
            Ok(request) => request,
            Err(e) => {
                debug!("undecodable request frame: {e}");
                return self
                    .codec
                    .encode_response(&RpcResponse::server_error(format!("malformed request: {e}")));
            }
        };

        let mut ctx = RequestContext::new(request);

        let matched = {
            let attachment = &ctx.request().attachment;
            self.router
                .match_service(
                    &attachment.path,
                    &ctx.request().method,
                    &attachment.group,
                    &attachment.version,
                )
                .cloned()
        };

        match matched {
            Some(descriptor) => {
                self.pipeline.run(&mut ctx, &descriptor).await;
            }
            None => {
                // A miss never reaches the pipeline, let alone a service.
                let attachment = &ctx.request().attachment;
                let message = format!(
                    "no service matched path={} method={} group={:?} version={:?}",
                    attachment.path,
                    ctx.request().method,
                    attachment.group,
                    attachment.version
                );
                debug!("{message}");
                ctx.fail(StatusCode::ServiceNotFound, message);
            }
        }

        self.codec.encode_response(&ctx.finalize())
    }
}
