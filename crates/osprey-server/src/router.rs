//! Service routing by (interface, group, version).

use std::collections::HashMap;
use std::sync::Arc;

use osprey_protocol::VERSION_WILDCARD;

use crate::context::CallContext;
use crate::error::InvokeResult;
use crate::service::{Service, ServiceDyn};

/// Version a provider is registered under when none is configured.
pub const DEFAULT_SERVICE_VERSION: &str = "1.0.0";

/// One registered provider: interface identity, its group/version pair,
/// and the invocable service. Group and version are attached once at
/// registration and immutable afterward.
#[derive(Clone)]
pub struct ServiceDescriptor {
    interface: String,
    group: String,
    version: String,
    service: Arc<dyn ServiceDyn>,
}

impl ServiceDescriptor {
    pub fn new<S: Service + 'static>(
        service: S,
        group: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let interface = service.interface().to_string();
        Self {
            interface,
            group: group.into(),
            version: version.into(),
            service: Arc::new(service),
        }
    }

    pub(crate) fn from_parts(
        interface: String,
        group: String,
        version: String,
        service: Arc<dyn ServiceDyn>,
    ) -> Self {
        Self {
            interface,
            group,
            version,
            service,
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.service.has_method_dyn(method)
    }

    pub async fn invoke(
        &self,
        method: &str,
        args: Vec<serde_json::Value>,
        call: &CallContext,
    ) -> InvokeResult {
        self.service.invoke_dyn(method, args, call).await
    }
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("interface", &self.interface)
            .field("group", &self.group)
            .field("version", &self.version)
            .finish()
    }
}

/// Maps interface name → registered providers, disambiguated by
/// group/version at lookup time.
///
/// Built once during startup, read-only while serving: lookups take `&self`
/// and the table is shared behind an `Arc`, so concurrent reads are safe
/// with no locking.
#[derive(Default)]
pub struct ServiceRouter {
    table: HashMap<String, Vec<ServiceDescriptor>>,
}

impl ServiceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider. Several providers may share one interface name;
    /// candidates keep registration order, which is the observable
    /// tie-break for [`match_service`](Self::match_service).
    pub fn register(&mut self, descriptor: ServiceDescriptor) {
        self.table
            .entry(descriptor.interface.clone())
            .or_default()
            .push(descriptor);
    }

    /// Resolve a request to a provider.
    ///
    /// Returns the first candidate, in registration order, that exposes
    /// `method`, whose group equals the request's group exactly, and whose
    /// version equals the request's version, or any version when the
    /// request carries the `"*"` wildcard. A miss is `None`, never an
    /// error; the dispatcher turns it into a `ServiceNotFound` response.
    pub fn match_service(
        &self,
        path: &str,
        method: &str,
        group: &str,
        version: &str,
    ) -> Option<&ServiceDescriptor> {
        self.table.get(path)?.iter().find(|d| {
            d.has_method(method)
                && d.group == group
                && (version == VERSION_WILDCARD || d.version == version)
        })
    }

    /// Interface names of every registered provider, deduplicated and
    /// sorted. This is what gets published to the registry.
    pub fn interfaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.table.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
