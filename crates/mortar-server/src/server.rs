//! Development server implementation.

use std::convert::Infallible;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::get,
    Router,
};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tower_http::{cors::CorsLayer, services::ServeDir};

use mortar_static::StaticBuilder;

use crate::events::LiveHub;
use crate::live::{client_script, ClientConfig};
use crate::watcher::{StateFile, Watcher, STATE_FILE};

/// Path of the event stream.
pub const EVENTS_PATH: &str = "/__live";

/// Path of the client script.
pub const SCRIPT_PATH: &str = "/__live.js";

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory served to the browser (the build output)
    pub output_dir: PathBuf,

    /// Directories polled for changes
    pub watch_dirs: Vec<PathBuf>,

    /// Delay between polls
    pub interval: Duration,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("public"),
            watch_dirs: vec![PathBuf::from("src")],
            interval: Duration::from_secs(1),
            port: 8008,
            host: "127.0.0.1".to_string(),
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Shared server state.
struct ServerState {
    hub: LiveHub,
    script: String,
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Build once, then serve the output while the watcher rebuilds on
    /// change. Returns after Ctrl-C.
    pub async fn start(self, builder: StaticBuilder) -> Result<(), ServerError> {
        let addr_text = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = addr_text
            .parse()
            .map_err(|_| ServerError::InvalidAddress(addr_text.clone()))?;

        // A taken port must fail before any build or watcher starts.
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        let hub = LiveHub::new();

        let mut watcher = Watcher::new(
            builder,
            self.config.watch_dirs.clone(),
            StateFile::new(self.config.output_dir.join(STATE_FILE)),
            self.config.interval,
        );

        let watcher = tokio::task::spawn_blocking(move || {
            match watcher.prime() {
                Ok(report) => tracing::info!(
                    "Built {} pages in {}ms",
                    report.pages,
                    report.duration_ms
                ),
                Err(e) => tracing::error!("Initial build failed: {}", e),
            }
            watcher
        })
        .await
        .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let stop = Arc::new(AtomicBool::new(false));
        let handle = watcher
            .spawn(hub.clone(), Arc::clone(&stop))
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let state = Arc::new(ServerState {
            hub,
            script: client_script(&ClientConfig::default()),
        });

        let app = router(state, &self.config.output_dir);

        tracing::info!("Starting dev server at http://{}", addr);
        tracing::info!(
            "Add <script src=\"{}\"></script> to your template for live reload",
            SCRIPT_PATH
        );

        if self.config.open {
            let url = format!("http://{}", addr);
            let _ = open::that(&url);
        }

        // Event streams never finish on their own, so shutdown does not wait
        // for open connections.
        let served = tokio::select! {
            result = axum::serve(listener, app).into_future() => {
                result.map_err(|e| ServerError::BindError(addr, e.to_string()))
            }
            _ = shutdown_signal() => Ok(()),
        };

        stop.store(true, Ordering::Relaxed);
        if handle.join().is_err() {
            tracing::warn!("Watcher thread panicked");
        }

        served
    }
}

fn router(state: Arc<ServerState>, output_dir: &Path) -> Router {
    Router::new()
        .route(EVENTS_PATH, get(events_handler))
        .route(SCRIPT_PATH, get(script_handler))
        .fallback_service(ServeDir::new(output_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the event stream. Each connection gets its own subscription
/// and ends when the client goes away.
async fn events_handler(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(
        "Live client connected ({} total)",
        state.hub.subscriber_count() + 1
    );

    let stream = BroadcastStream::new(state.hub.subscribe())
        .filter_map(|event| event.ok())
        .map(|event| Ok::<_, Infallible>(event.to_sse()));

    Sse::new(stream)
}

/// Handler for the client script.
async fn script_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    (
        [
            ("content-type", "application/javascript"),
            ("cache-control", "no-store"),
        ],
        state.script.clone(),
    )
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("Couldn't listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LiveEvent;
    use tempfile::tempdir;

    fn test_state() -> Arc<ServerState> {
        Arc::new(ServerState {
            hub: LiveHub::new(),
            script: client_script(&ClientConfig::default()),
        })
    }

    #[test]
    fn creates_server_with_default_config() {
        let server = DevServer::new(DevServerConfig::default());

        assert_eq!(server.config.port, 8008);
        assert_eq!(server.config.interval, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn taken_port_fails_before_building() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("src/pages")).unwrap();
        std::fs::write(temp.path().join("src/pages/index.html"), "hi").unwrap();
        let output = temp.path().join("public");

        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let builder = StaticBuilder::new(mortar_static::BuildConfig {
            pages_dir: temp.path().join("src/pages"),
            output_dir: output.clone(),
            ..Default::default()
        });
        let server = DevServer::new(DevServerConfig {
            output_dir: output.clone(),
            watch_dirs: vec![temp.path().join("src")],
            port,
            open: false,
            ..Default::default()
        });

        let err = server.start(builder).await.unwrap_err();

        assert!(matches!(err, ServerError::BindError(..)));
        assert!(!output.join("index.html").exists());
        assert!(!output.join(STATE_FILE).exists());
    }

    #[tokio::test]
    async fn serves_output_and_events() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("index.html"), "<p>hi</p>").unwrap();
        let state = test_state();
        let hub = state.hub.clone();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state, temp.path());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let page = raw_get(addr, "/index.html").await;
        assert!(page.contains("<p>hi</p>"));

        let script = raw_get(addr, SCRIPT_PATH).await;
        assert!(script.contains("application/javascript"));
        assert!(script.contains("EventSource"));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        send_request(&mut stream, EVENTS_PATH).await;

        // Wait for the handler to subscribe before broadcasting.
        for _ in 0..100 {
            if hub.subscriber_count() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        hub.send(LiveEvent::BuildComplete { timestamp: 100 });

        let body = read_until(&mut stream, "timestamp").await;
        assert!(body.contains("text/event-stream"));
        assert!(body.contains("event: buildComplete"));
        assert!(body.contains(r#"data: {"timestamp":100}"#));
    }

    async fn send_request(stream: &mut tokio::net::TcpStream, path: &str) {
        use tokio::io::AsyncWriteExt;

        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
    }

    async fn read_until(stream: &mut tokio::net::TcpStream, needle: &str) -> String {
        use tokio::io::AsyncReadExt;

        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, stream.read(&mut buf)).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(n)) => received.extend_from_slice(&buf[..n]),
                Ok(Err(e)) => panic!("read failed: {e}"),
            }
            if String::from_utf8_lossy(&received).contains(needle) {
                break;
            }
        }
        String::from_utf8_lossy(&received).into_owned()
    }

    async fn raw_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        send_request(&mut stream, path).await;
        read_until(&mut stream, "\u{0}").await
    }
}
