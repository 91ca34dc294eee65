//! Per-request context threaded through the middleware pipeline.

use osprey_protocol::{RpcRequest, RpcResponse, StatusCode};
use serde_json::Value;

/// Read-only, call-scoped view handed to a service method as its implicit
/// final argument.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub path: String,
    pub group: String,
    pub version: String,
    pub method: String,
}

/// Mutable request-scoped record: the originating request, a status code,
/// and a body holding either a result value or an error.
///
/// Exactly one context exists per inbound request; it is created by the
/// dispatcher, passed `&mut` through the pipeline, then sealed into an
/// [`RpcResponse`] by [`finalize`](Self::finalize) and discarded. Contexts
/// are never shared across requests.
#[derive(Debug)]
pub struct RequestContext {
    request: RpcRequest,
    status: StatusCode,
    res: Option<Value>,
    err: Option<String>,
}

impl RequestContext {
    pub fn new(request: RpcRequest) -> Self {
        Self {
            request,
            status: StatusCode::Ok,
            res: None,
            err: None,
        }
    }

    pub fn request(&self) -> &RpcRequest {
        &self.request
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn res(&self) -> Option<&Value> {
        self.res.as_ref()
    }

    pub fn set_res(&mut self, value: Value) {
        self.res = Some(value);
    }

    pub fn err(&self) -> Option<&str> {
        self.err.as_deref()
    }

    pub fn set_err(&mut self, message: impl Into<String>) {
        self.err = Some(message.into());
    }

    /// Mark the request failed: status plus error message in one step.
    pub fn fail(&mut self, status: StatusCode, message: impl Into<String>) {
        self.status = status;
        self.err = Some(message.into());
    }

    /// Snapshot of the routing metadata for the invoked method.
    pub fn call_context(&self) -> CallContext {
        CallContext {
            path: self.request.attachment.path.clone(),
            group: self.request.attachment.group.clone(),
            version: self.request.attachment.version.clone(),
            method: self.request.method.clone(),
        }
    }

    /// Seal the context into the immutable response view.
    pub fn finalize(self) -> RpcResponse {
        RpcResponse {
            status: self.status.code(),
            res: self.res,
            err: self.err,
        }
    }
}
