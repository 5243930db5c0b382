use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::guard::Guard;
use crate::proxy::forwarding::{create_client, error_response, forward};

/// Guard to decrement active connections counter when dropped
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Serve HTTP/1.1 and HTTP/2 on `config.listen`, screen every request with
/// `guard`, and forward allowed ones to `config.backend`.
///
/// Returns once `shutdown` fires and in-flight connections have drained or
/// `timeout.shutdown_secs` has elapsed.
pub async fn run(
    config: Arc<Config>,
    guard: Arc<Guard>,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(config.listen).await?;
    serve(listener, config, guard, shutdown).await
}

/// Like [`run`] on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    config: Arc<Config>,
    guard: Arc<Guard>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    let builder = ConnBuilder::new(TokioExecutor::new());
    let client = create_client(Duration::from_millis(config.timeout.connect_ms));
    let backend: Arc<str> = Arc::from(config.backend.as_str());
    let preserve_host = config.preserve_host;

    // Track active connections for graceful shutdown
    let active_connections = Arc::new(AtomicUsize::new(0));

    info!(?addr, backend = %backend, "starting guarded proxy (h1/h2)");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };

                active_connections.fetch_add(1, Ordering::Relaxed);

                let builder = builder.clone();
                let client = client.clone();
                let backend = Arc::clone(&backend);
                let guard = Arc::clone(&guard);
                let active_connections = active_connections.clone();

                tokio::spawn(async move {
                    // Ensure counter is decremented when connection finishes
                    let _conn = ConnectionGuard(active_connections);

                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let client = client.clone();
                        let backend = Arc::clone(&backend);
                        let guard = Arc::clone(&guard);

                        async move {
                            let resp = guard
                                .handle(req, Some(peer), |req| async move {
                                    match forward(req, &backend, &client, preserve_host).await {
                                        Ok(resp) => resp,
                                        Err(e) => error_response(&e),
                                    }
                                })
                                .await;
                            Ok::<_, hyper::Error>(resp)
                        }
                    });

                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "serve_connection error");
                    }
                });
            }
        }
    }

    info!(
        "Waiting for active connections to finish (timeout: {}s)",
        config.timeout.shutdown_secs
    );
    let shutdown_timeout = Duration::from_secs(config.timeout.shutdown_secs);
    let start = std::time::Instant::now();

    loop {
        let active = active_connections.load(Ordering::Relaxed);
        if active == 0 {
            info!("All connections closed, shutdown complete");
            break;
        }

        if start.elapsed() >= shutdown_timeout {
            warn!(
                active_connections = active,
                "Shutdown timeout reached, {} connections still active", active
            );
            break;
        }

        info!(active_connections = active, "Waiting for connections to close");
        sleep(Duration::from_millis(100)).await;
    }

    info!("Proxy server stopped");
    Ok(())
}
