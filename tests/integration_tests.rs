//! End-to-end integration tests — TCP connection, framed request/response
//! cycle, heartbeat echo, and connection lifecycle against a running server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use osprey_protocol::{
    Attachment, BinaryJsonCodec, Codec, FrameAssembler, RpcRequest, RpcResponse, StatusCode,
    FRAME_HEADER_LEN,
};
use osprey_registry::MemoryRegistry;
use osprey_server::{
    CallContext, InvokeError, InvokeResult, Middleware, Next, RequestContext, RpcServer,
    ServerConfig, Service, ServiceConfig,
};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

// ─────────────────────────────────────────────────────────────────────────────
// Test server and client helpers
// ─────────────────────────────────────────────────────────────────────────────

/// The service under test: fast/slow/failing methods on one interface.
struct FooService;

impl Service for FooService {
    fn interface(&self) -> &str {
        "Foo"
    }

    fn has_method(&self, method: &str) -> bool {
        matches!(method, "bar" | "boom" | "slow" | "fast")
    }

    async fn invoke(&self, method: &str, args: Vec<Value>, _call: &CallContext) -> InvokeResult {
        match method {
            "bar" => Ok(json!({"echo": args})),
            "fast" => Ok(json!("fast")),
            "slow" => {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(json!("slow"))
            }
            "boom" => Err(InvokeError::failed("boom")),
            other => Err(InvokeError::MethodNotFound(other.into())),
        }
    }
}

/// Counts how many requests enter the middleware pipeline.
struct PipelineCounter {
    runs: Arc<AtomicUsize>,
}

impl Middleware for PipelineCounter {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<(), InvokeError>> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        next.run(ctx)
    }

    fn name(&self) -> &str {
        "pipeline-counter"
    }
}

/// Start a server with `FooService` at group ""/version "1.0.0" on an
/// OS-assigned port. Returns the server, its registry, the bound port, and
/// the pipeline-run counter.
async fn start_test_server() -> (RpcServer, Arc<MemoryRegistry>, u16, Arc<AtomicUsize>) {
    let registry = Arc::new(MemoryRegistry::new());
    let config = ServerConfig {
        application: "integration-test".into(),
        registry: Some(registry.clone()),
        services: vec![ServiceConfig::of(FooService).version("1.0.0")],
        ..ServerConfig::default()
    };

    let server = RpcServer::new(config).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    server
        .use_middleware(PipelineCounter { runs: runs.clone() })
        .unwrap();
    server.start();
    let port = server.ready().await.unwrap();

    (server, registry, port, runs)
}

/// Minimal framed TCP client.
struct TestClient {
    stream: TcpStream,
    assembler: FrameAssembler,
    codec: BinaryJsonCodec,
}

impl TestClient {
    async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        Self {
            stream,
            assembler: FrameAssembler::new(4 * 1024 * 1024),
            codec: BinaryJsonCodec::default(),
        }
    }

    async fn send(&mut self, path: &str, method: &str, group: &str, version: &str, args: Vec<Value>) {
        let request = RpcRequest::new(
            method,
            args,
            Attachment::new(path).with_group(group).with_version(version),
        );
        let frame = self.codec.encode_request(&request).unwrap();
        self.stream.write_all(&frame).await.unwrap();
    }

    async fn send_heartbeat(&mut self) {
        let beat = self.codec.encode_heartbeat();
        self.stream.write_all(&beat).await.unwrap();
    }

    /// Read the next complete frame, whatever kind it is.
    async fn next_frame(&mut self) -> bytes::Bytes {
        let mut chunk = vec![0u8; 16 * 1024];
        loop {
            if let Some(frame) = self.assembler.next_frame().unwrap() {
                return frame;
            }
            let n = timeout(Duration::from_secs(5), self.stream.read(&mut chunk))
                .await
                .expect("timed out waiting for a frame")
                .unwrap();
            assert_ne!(n, 0, "connection closed while waiting for a frame");
            self.assembler.extend(&chunk[..n]);
        }
    }

    async fn next_response(&mut self) -> RpcResponse {
        let frame = self.next_frame().await;
        assert!(!self.codec.is_heartbeat(&frame), "expected a response frame");
        serde_json::from_slice(&frame[FRAME_HEADER_LEN..]).unwrap()
    }

    async fn call(
        &mut self,
        path: &str,
        method: &str,
        group: &str,
        version: &str,
        args: Vec<Value>,
    ) -> RpcResponse {
        self.send(path, method, group, version, args).await;
        self.next_response().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request/response cycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn matched_request_returns_ok_with_result() {
    let (server, _registry, port, _) = start_test_server().await;
    let mut client = TestClient::connect(port).await;

    let response = client
        .call("Foo", "bar", "", "1.0.0", vec![json!(42)])
        .await;
    assert_eq!(response.status_code(), StatusCode::Ok);
    assert_eq!(response.res, Some(json!({"echo": [42]})));
    assert!(response.err.is_none());

    server.close().await;
}

#[tokio::test]
async fn version_mismatch_returns_service_not_found() {
    let (server, _registry, port, _) = start_test_server().await;
    let mut client = TestClient::connect(port).await;

    let response = client.call("Foo", "bar", "", "2.0.0", vec![]).await;
    assert_eq!(response.status_code(), StatusCode::ServiceNotFound);

    server.close().await;
}

#[tokio::test]
async fn wildcard_version_routes_to_registered_provider() {
    let (server, _registry, port, _) = start_test_server().await;
    let mut client = TestClient::connect(port).await;

    let response = client.call("Foo", "fast", "", "*", vec![]).await;
    assert_eq!(response.status_code(), StatusCode::Ok);
    assert_eq!(response.res, Some(json!("fast")));

    server.close().await;
}

#[tokio::test]
async fn handler_failure_returns_server_error_with_message() {
    let (server, _registry, port, _) = start_test_server().await;
    let mut client = TestClient::connect(port).await;

    let response = client.call("Foo", "boom", "", "1.0.0", vec![]).await;
    assert_eq!(response.status_code(), StatusCode::ServerError);
    assert_eq!(response.err.as_deref(), Some("boom"));

    server.close().await;
}

#[tokio::test]
async fn unregistered_interface_returns_service_not_found() {
    let (server, _registry, port, _) = start_test_server().await;
    let mut client = TestClient::connect(port).await;

    let response = client.call("Nope", "bar", "", "1.0.0", vec![]).await;
    assert_eq!(response.status_code(), StatusCode::ServiceNotFound);

    server.close().await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Heartbeat sub-protocol
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn heartbeat_is_echoed_without_entering_the_pipeline() {
    let (server, _registry, port, runs) = start_test_server().await;
    let mut client = TestClient::connect(port).await;

    client.send_heartbeat().await;
    let echo = client.next_frame().await;
    assert!(client.codec.is_heartbeat(&echo));
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    // A real request on the same connection still dispatches normally.
    let response = client.call("Foo", "fast", "", "1.0.0", vec![]).await;
    assert_eq!(response.status_code(), StatusCode::Ok);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    server.close().await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrency on one connection
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn responses_may_complete_out_of_arrival_order() {
    let (server, _registry, port, _) = start_test_server().await;
    let mut client = TestClient::connect(port).await;

    client.send("Foo", "slow", "", "1.0.0", vec![]).await;
    client.send("Foo", "fast", "", "1.0.0", vec![]).await;

    let first = client.next_response().await;
    let second = client.next_response().await;
    assert_eq!(first.res, Some(json!("fast")));
    assert_eq!(second.res, Some(json!("slow")));

    server.close().await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn registry_receives_bound_endpoint_and_interfaces() {
    let (server, registry, port, _) = start_test_server().await;

    let published = registry.lookup("integration-test").unwrap();
    assert_eq!(published.port, port);
    assert_eq!(published.protocol, "osprey");
    assert_eq!(published.interfaces, vec!["Foo".to_string()]);

    server.close().await;
}

#[tokio::test]
async fn close_releases_listener_and_registry() {
    let (server, registry, port, _) = start_test_server().await;

    // Serving before close.
    let mut client = TestClient::connect(port).await;
    let response = client.call("Foo", "fast", "", "1.0.0", vec![]).await;
    assert!(response.is_ok());

    server.close().await;
    assert!(registry.is_empty());

    // The listener is gone: new connections are refused, or accepted by
    // nothing and immediately closed.
    match TcpStream::connect(("127.0.0.1", port)).await {
        Err(_) => {}
        Ok(mut stream) => {
            let mut buf = [0u8; 1];
            let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
                .await
                .expect("timed out waiting for the closed listener")
                .unwrap_or(0);
            assert_eq!(n, 0);
        }
    }

    // close() is idempotent.
    server.close().await;
}
