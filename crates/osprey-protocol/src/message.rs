//! Request and response payload types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version token that matches any registered version.
pub const VERSION_WILDCARD: &str = "*";

/// Version a request carries when the caller did not specify one.
pub const DEFAULT_REQUEST_VERSION: &str = "0.0.0";

/// Out-of-band routing metadata carried alongside a request's method name
/// and arguments: the interface path plus the group/version pair that
/// disambiguates providers sharing one interface name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Interface name the caller is addressing (e.g. "demo.Echo").
    pub path: String,
    /// Provider group. Matched by exact string equality; empty means ungrouped.
    #[serde(default)]
    pub group: String,
    /// Requested version, or [`VERSION_WILDCARD`] to accept any.
    #[serde(default = "default_request_version")]
    pub version: String,
}

fn default_request_version() -> String {
    DEFAULT_REQUEST_VERSION.into()
}

impl Attachment {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            group: String::new(),
            version: DEFAULT_REQUEST_VERSION.into(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// A decoded request frame: method name, positional arguments, and the
/// routing attachment. Produced by the codec, consumed exactly once by
/// the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    pub attachment: Attachment,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, args: Vec<Value>, attachment: Attachment) -> Self {
        Self {
            method: method.into(),
            args,
            attachment,
        }
    }
}

/// Response status carried on every encoded response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// The matched method ran (its own failure is still `Ok` at this level
    /// only if the handler returned a value; handler errors use `ServerError`).
    Ok,
    /// No registered provider matched the request's path/method/group/version.
    ServiceNotFound,
    /// A handler or middleware failed, or the request could not be decoded.
    ServerError,
}

impl StatusCode {
    pub fn code(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::ServiceNotFound => 1,
            Self::ServerError => 2,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::ServiceNotFound,
            _ => Self::ServerError,
        }
    }
}

/// The finalized, immutable view of a handled request, and the only shape the
/// codec ever encodes. Exactly one of `res`/`err` is set, keyed by `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub status: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub res: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl RpcResponse {
    pub fn ok(res: Value) -> Self {
        Self {
            status: StatusCode::Ok.code(),
            res: Some(res),
            err: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::ServiceNotFound.code(),
            res: None,
            err: Some(message.into()),
        }
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::ServerError.code(),
            res: None,
            err: Some(message.into()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_code(self.status)
    }

    pub fn is_ok(&self) -> bool {
        self.status_code() == StatusCode::Ok
    }
}
