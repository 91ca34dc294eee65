//! Service provider trait.

use crate::context::CallContext;
use crate::error::InvokeResult;

/// Trait implemented by every service provider exposed over RPC.
///
/// A provider owns one interface name and a set of named methods. Methods
/// are dispatched dynamically by name: the router asks
/// [`has_method`](Self::has_method) while matching, and
/// [`invoke`](Self::invoke) runs the call with the request's positional
/// arguments plus the call context. `invoke` must answer
/// `InvokeError::MethodNotFound` for names it does not expose.
pub trait Service: Send + Sync {
    /// Interface name remote callers route on (e.g. "demo.Echo").
    fn interface(&self) -> &str;

    /// Whether this provider exposes `method`.
    fn has_method(&self, method: &str) -> bool;

    /// Invoke `method` with positional args and the call context.
    fn invoke(
        &self,
        method: &str,
        args: Vec<serde_json::Value>,
        call: &CallContext,
    ) -> impl std::future::Future<Output = InvokeResult> + Send;
}

/// Object-safe wrapper for the Service trait.
pub(crate) trait ServiceDyn: Send + Sync {
    fn interface_dyn(&self) -> &str;
    fn has_method_dyn(&self, method: &str) -> bool;
    fn invoke_dyn<'a>(
        &'a self,
        method: &'a str,
        args: Vec<serde_json::Value>,
        call: &'a CallContext,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = InvokeResult> + Send + 'a>>;
}

impl<T: Service> ServiceDyn for T {
    fn interface_dyn(&self) -> &str {
        self.interface()
    }

    fn has_method_dyn(&self, method: &str) -> bool {
        self.has_method(method)
    }

    fn invoke_dyn<'a>(
        &'a self,
        method: &'a str,
        args: Vec<serde_json::Value>,
        call: &'a CallContext,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = InvokeResult> + Send + 'a>> {
        Box::pin(self.invoke(method, args, call))
    }
}
