//! Osprey RPC — demo server binary.
//!
//! Exposes a couple of sample services over the Osprey RPC wire protocol
//! and registers them with an in-process registry.
//!
//! Usage:
//!   osprey-rpc                         # OS-assigned port
//!   osprey-rpc --port 4040             # fixed port
//!   osprey-rpc --application my-app    # registry identity

use std::sync::Arc;

use clap::Parser;
use futures_util::future::BoxFuture;
use osprey_registry::{FixedPortAllocator, MemoryRegistry, OsPortAllocator, PortAllocator};
use osprey_server::{
    CallContext, InvokeError, InvokeResult, Middleware, Next, RequestContext, RpcServer,
    ServerConfig, Service, ServiceConfig,
};
use serde_json::{json, Value};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "osprey-rpc", about = "Osprey RPC demo server")]
struct Cli {
    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "0")]
    port: u16,

    /// Application identity published to the registry
    #[arg(long, default_value = "osprey-demo")]
    application: String,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

/// Echo service: returns its arguments back to the caller.
struct EchoService;

impl Service for EchoService {
    fn interface(&self) -> &str {
        "demo.Echo"
    }

    fn has_method(&self, method: &str) -> bool {
        matches!(method, "echo" | "reverse")
    }

    async fn invoke(&self, method: &str, args: Vec<Value>, _call: &CallContext) -> InvokeResult {
        match method {
            "echo" => Ok(json!(args)),
            "reverse" => {
                let text = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| InvokeError::failed("reverse expects a string argument"))?;
                Ok(json!(text.chars().rev().collect::<String>()))
            }
            other => Err(InvokeError::MethodNotFound(other.into())),
        }
    }
}

/// Arithmetic service.
struct CalcService;

impl Service for CalcService {
    fn interface(&self) -> &str {
        "demo.Calc"
    }

    fn has_method(&self, method: &str) -> bool {
        matches!(method, "add" | "sum")
    }

    async fn invoke(&self, method: &str, args: Vec<Value>, _call: &CallContext) -> InvokeResult {
        let numbers: Vec<f64> = args.iter().filter_map(Value::as_f64).collect();
        match method {
            "add" if numbers.len() == 2 => Ok(json!(numbers[0] + numbers[1])),
            "add" => Err(InvokeError::failed("add expects two numeric arguments")),
            "sum" => Ok(json!(numbers.iter().sum::<f64>())),
            other => Err(InvokeError::MethodNotFound(other.into())),
        }
    }
}

/// Access-log middleware: wraps every call, logging method and outcome.
struct AccessLog;

impl Middleware for AccessLog {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<(), InvokeError>> {
        Box::pin(async move {
            let started = std::time::Instant::now();
            let path = ctx.request().attachment.path.clone();
            let method = ctx.request().method.clone();
            let result = next.run(ctx).await;
            info!(
                "{}#{} -> {:?} in {:?}",
                path,
                method,
                ctx.status(),
                started.elapsed()
            );
            result
        })
    }

    fn name(&self) -> &str {
        "access-log"
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let registry = Arc::new(MemoryRegistry::new());
    let port_allocator: Arc<dyn PortAllocator> = if cli.port == 0 {
        Arc::new(OsPortAllocator)
    } else {
        Arc::new(FixedPortAllocator::new(cli.port))
    };

    let config = ServerConfig {
        application: cli.application,
        host: cli.host.clone(),
        registry: Some(registry),
        services: vec![
            ServiceConfig::of(EchoService),
            ServiceConfig::of(CalcService),
        ],
        port_allocator,
        ..ServerConfig::default()
    };

    let server = match RpcServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.use_middleware(AccessLog) {
        error!("failed to install middleware: {e}");
        std::process::exit(1);
    }

    server.start();
    match server.ready().await {
        Ok(port) => info!("serving on {}:{port} (ctrl-c to stop)", cli.host),
        Err(e) => {
            error!("startup failed: {e}");
            std::process::exit(1);
        }
    }

    let _ = tokio::signal::ctrl_c().await;
    server.close().await;
}
