//! Public server surface — configuration, lifecycle, middleware hookup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use osprey_protocol::{BinaryJsonCodec, Codec};
use osprey_registry::{OsPortAllocator, PortAllocator, Registration, Registry, RetryBudget};
use osprey_transport::{TcpTransport, TransportConfig};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::dispatcher::RequestDispatcher;
use crate::error::{ConfigError, StartupError};
use crate::middleware::{Middleware, MiddlewarePipeline};
use crate::router::{ServiceDescriptor, ServiceRouter, DEFAULT_SERVICE_VERSION};
use crate::service::{Service, ServiceDyn};
use crate::supervisor::{ReadySignal, StartupSupervisor};

/// One entry of the configured service map.
///
/// The registration name doubles as the naming-convention carrier:
/// `"Interface"`, `"Interface:version"`, or `"Interface:version:group"`.
/// Explicit [`group`](Self::group)/[`version`](Self::version) settings win
/// over the name suffix; defaults are the empty group and version
/// `"1.0.0"`.
pub struct ServiceConfig {
    name: String,
    service: Arc<dyn ServiceDyn>,
    group: Option<String>,
    version: Option<String>,
}

impl ServiceConfig {
    pub fn new<S: Service + 'static>(name: impl Into<String>, service: S) -> Self {
        Self {
            name: name.into(),
            service: Arc::new(service),
            group: None,
            version: None,
        }
    }

    /// Register under the service's own interface name.
    pub fn of<S: Service + 'static>(service: S) -> Self {
        let name = service.interface().to_string();
        Self::new(name, service)
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Attach resolved group/version and produce the immutable descriptor.
    fn resolve(self) -> ServiceDescriptor {
        let mut parts = self.name.splitn(3, ':');
        let interface = match parts.next() {
            Some(head) if !head.is_empty() => head.to_string(),
            _ => self.service.interface_dyn().to_string(),
        };
        let name_version = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        let name_group = parts.next().map(str::to_string);

        let version = self
            .version
            .or(name_version)
            .unwrap_or_else(|| DEFAULT_SERVICE_VERSION.to_string());
        let group = self.group.or(name_group).unwrap_or_default();

        ServiceDescriptor::from_parts(interface, group, version, self.service)
    }
}

/// Server configuration. A registry instance and a non-empty service map
/// are required; everything else has defaults.
pub struct ServerConfig {
    pub application: String,
    pub host: String,
    /// Protocol identity published to the registry.
    pub protocol: String,
    pub registry: Option<Arc<dyn Registry>>,
    pub services: Vec<ServiceConfig>,
    pub port_allocator: Arc<dyn PortAllocator>,
    pub codec: Arc<dyn Codec>,
    /// Bind retries after the first failed attempt.
    pub bind_retries: u32,
    pub bind_retry_delay_ms: u64,
    pub transport: TransportConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            application: "osprey".into(),
            host: "127.0.0.1".into(),
            protocol: "osprey".into(),
            registry: None,
            services: Vec::new(),
            port_allocator: Arc::new(OsPortAllocator),
            codec: Arc::new(BinaryJsonCodec::default()),
            bind_retries: 3,
            bind_retry_delay_ms: 200,
            transport: TransportConfig::default(),
        }
    }
}

/// The RPC server: construct with a validated config, add middleware,
/// `start()`, await `ready()`, serve, `close()`.
pub struct RpcServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    application: String,
    host: String,
    protocol: String,
    registry: Arc<dyn Registry>,
    descriptors: Vec<ServiceDescriptor>,
    port_allocator: Arc<dyn PortAllocator>,
    codec: Arc<dyn Codec>,
    bind_retries: u32,
    bind_retry_delay: Duration,
    transport_config: TransportConfig,
    middleware: Mutex<Vec<Arc<dyn Middleware>>>,
    sealed: AtomicBool,
    started: AtomicBool,
    closed: AtomicBool,
    port: OnceLock<u16>,
    ready: ReadySignal,
    transport: tokio::sync::Mutex<Option<TcpTransport>>,
}

impl RpcServer {
    /// Validate the configuration and build the server. Fails before any
    /// networking if the registry is missing or the service map is empty.
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        let registry = config.registry.ok_or(ConfigError::MissingRegistry)?;
        if config.services.is_empty() {
            return Err(ConfigError::NoServices);
        }

        let descriptors: Vec<ServiceDescriptor> = config
            .services
            .into_iter()
            .map(ServiceConfig::resolve)
            .collect();
        for d in &descriptors {
            info!(
                "registering service {} (group {:?}, version {})",
                d.interface(),
                d.group(),
                d.version()
            );
        }

        Ok(Self {
            inner: Arc::new(ServerInner {
                application: config.application,
                host: config.host,
                protocol: config.protocol,
                registry,
                descriptors,
                port_allocator: config.port_allocator,
                codec: config.codec,
                bind_retries: config.bind_retries,
                bind_retry_delay: Duration::from_millis(config.bind_retry_delay_ms),
                transport_config: config.transport,
                middleware: Mutex::new(Vec::new()),
                sealed: AtomicBool::new(false),
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                port: OnceLock::new(),
                ready: ReadySignal::new(),
                transport: tokio::sync::Mutex::new(None),
            }),
        })
    }

    /// Append a middleware stage. Rejected once the server has started so
    /// in-flight requests always see a stable chain.
    pub fn use_middleware<M: Middleware + 'static>(&self, middleware: M) -> Result<(), ConfigError> {
        if self.inner.sealed.load(Ordering::Acquire) {
            return Err(ConfigError::Sealed);
        }
        self.inner.middleware.lock().push(Arc::new(middleware));
        Ok(())
    }

    /// Kick off startup: bind (with retry), serve, register, resolve
    /// readiness. Returns immediately; `ready()` is the await point.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            warn!("start() called twice; ignoring");
            return;
        }
        self.inner.sealed.store(true, Ordering::Release);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.run_startup().await;
        });
    }

    /// Resolves once the server is listening and registration has been
    /// attempted; yields the bound port. Multi-await safe.
    pub async fn ready(&self) -> Result<u16, StartupError> {
        self.inner.ready.wait().await
    }

    /// The bound port, once assigned. Immutable after the first
    /// successful bind.
    pub fn port(&self) -> Option<u16> {
        self.inner.port.get().copied()
    }

    /// Release the listener and the registry handle. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.ready.reject(StartupError::Aborted);
        if let Some(mut transport) = self.inner.transport.lock().await.take() {
            transport.stop().await;
        }
        self.inner.registry.close().await;
        info!("rpc server {} closed", self.inner.application);
    }
}

impl ServerInner {
    async fn run_startup(self: Arc<Self>) {
        let mut supervisor = StartupSupervisor::new(
            self.host.clone(),
            self.port_allocator.clone(),
            RetryBudget::new(self.bind_retries, self.bind_retry_delay),
        );

        let listener = match supervisor.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                self.ready.reject(e);
                return;
            }
        };
        let port = match listener.local_addr() {
            Ok(addr) => addr.port(),
            Err(e) => {
                self.ready.reject(StartupError::Listen(e.to_string()));
                return;
            }
        };
        let _ = self.port.set(port);

        let mut router = ServiceRouter::new();
        for descriptor in &self.descriptors {
            router.register(descriptor.clone());
        }
        let router = Arc::new(router);
        let interfaces = router.interfaces();

        let pipeline = MiddlewarePipeline::new(self.middleware.lock().clone());
        let dispatcher = Arc::new(RequestDispatcher::new(router, pipeline, self.codec.clone()));

        let transport = match TcpTransport::serve(
            listener,
            dispatcher,
            self.codec.clone(),
            self.transport_config.clone(),
        )
        .await
        {
            Ok(transport) => transport,
            Err(e) => {
                self.ready.reject(StartupError::Listen(e.to_string()));
                return;
            }
        };
        *self.transport.lock().await = Some(transport);

        if self.closed.load(Ordering::SeqCst) {
            if let Some(mut transport) = self.transport.lock().await.take() {
                transport.stop().await;
            }
            self.ready.reject(StartupError::Aborted);
            return;
        }

        StartupSupervisor::register(
            &self.registry,
            Registration {
                application: self.application.clone(),
                port,
                protocol: self.protocol.clone(),
                interfaces,
            },
        )
        .await;

        self.ready.resolve(port);
        info!(
            "rpc server {} ready on {}:{}",
            self.application, self.host, port
        );
    }
}
