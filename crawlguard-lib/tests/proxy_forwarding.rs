mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::{MockAuthority, TestResult};
use crawlguard_lib::config::{LoggingConfig, TelemetryConfig, TimeoutConfig};
use crawlguard_lib::{proxy, Config, GuardBuilder};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/131.0";

/// Backend that answers `path|host` for every request.
async fn start_backend() -> Result<SocketAddr, Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let svc = hyper::service::service_fn(|req: Request<Incoming>| async move {
                    let host = req
                        .headers()
                        .get(http::header::HOST)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    let body = format!("{}|{}", req.uri().path(), host);
                    Ok::<_, hyper::Error>(Response::new(Full::new(Bytes::from(body))))
                });
                let _ = ConnBuilder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), svc)
                    .await;
            });
        }
    });
    Ok(addr)
}

fn config(backend: String, preserve_host: bool) -> Config {
    Config {
        listen: SocketAddr::from(([127, 0, 0, 1], 0)),
        backend,
        preserve_host,
        guard: Default::default(),
        logging: LoggingConfig::default(),
        timeout: TimeoutConfig { connect_ms: 1000, shutdown_secs: 2 },
        telemetry: TelemetryConfig::default(),
    }
}

struct Running {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<crawlguard_lib::Result<()>>,
}

async fn start_proxy(
    mock: &MockAuthority,
    cfg: Config,
) -> Result<Running, Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let guard = Arc::new(GuardBuilder::new(mock.guard_config()).start()?);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(proxy::serve(listener, Arc::new(cfg), guard, shutdown.clone()));
    Ok(Running { addr, shutdown, task })
}

fn browser_get(client: &reqwest::Client, url: String) -> reqwest::RequestBuilder {
    client
        .get(url)
        .header("user-agent", BROWSER_UA)
        .header("accept", "text/html")
        .header("accept-language", "en")
        .header("accept-encoding", "identity")
}

#[tokio::test]
async fn forwards_allowed_and_blocks_bots() -> TestResult {
    let mock = MockAuthority::start().await?;
    let backend = start_backend().await?;
    let running = start_proxy(&mock, config(backend.to_string(), true)).await?;
    let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;

    let resp = browser_get(&client, format!("http://{}/docs/intro", running.addr)).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.text().await?, format!("/docs/intro|{}", running.addr));

    let resp = client
        .get(format!("http://{}/docs/intro", running.addr))
        .header("user-agent", "Mozilla/5.0 (compatible; ClaudeBot/1.0)")
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
    assert!(resp.text().await?.is_empty());

    running.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), running.task).await???;
    Ok(())
}

#[tokio::test]
async fn rewrites_host_unless_preserved() -> TestResult {
    let mock = MockAuthority::start().await?;
    let backend = start_backend().await?;
    let running = start_proxy(&mock, config(backend.to_string(), false)).await?;
    let client = reqwest::Client::new();

    let resp = browser_get(&client, format!("http://{}/x", running.addr)).send().await?;
    assert_eq!(resp.text().await?, format!("/x|{backend}"));

    running.shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_answers_502() -> TestResult {
    let mock = MockAuthority::start().await?;
    // Reserve a port, then free it so nothing listens there.
    let dead = TcpListener::bind("127.0.0.1:0").await?.local_addr()?;
    let running = start_proxy(&mock, config(dead.to_string(), false)).await?;
    let client = reqwest::Client::new();

    let resp = browser_get(&client, format!("http://{}/", running.addr)).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);

    running.shutdown.cancel();
    Ok(())
}
