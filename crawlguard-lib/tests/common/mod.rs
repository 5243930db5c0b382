//! Shared helpers: a local stand-in for the rule and ingest service.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crawlguard_lib::GuardConfig;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// What the mock has seen and what it answers with.
#[derive(Default)]
pub struct MockState {
    rules_status: AtomicU16,
    rules_body: Mutex<String>,
    rules_delay_ms: AtomicU64,
    ingest_status: AtomicU16,
    pub rule_hits: AtomicUsize,
    pub batches: Mutex<Vec<serde_json::Value>>,
    pub auth_headers: Mutex<Vec<String>>,
    pub content_types: Mutex<Vec<String>>,
}

impl MockState {
    pub fn serve_rules(&self, status: u16, body: impl Into<String>) {
        self.rules_status.store(status, Ordering::SeqCst);
        *self.rules_body.lock().unwrap_or_else(|e| e.into_inner()) = body.into();
    }

    /// Hold every rules response for `delay` after counting the hit.
    pub fn set_rules_delay(&self, delay: Duration) {
        self.rules_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_ingest_status(&self, status: u16) {
        self.ingest_status.store(status, Ordering::SeqCst);
    }

    pub fn rule_hits(&self) -> usize {
        self.rule_hits.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<serde_json::Value> {
        self.batches.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn auth_headers(&self) -> Vec<String> {
        self.auth_headers.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

pub struct MockAuthority {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    shutdown: CancellationToken,
}

impl MockAuthority {
    /// Start the mock on an ephemeral port. Rules answer 404 until
    /// [`MockState::serve_rules`] is called; ingest answers 200.
    pub async fn start() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(MockState::default());
        state.serve_rules(404, "");
        state.set_ingest_status(200);
        let shutdown = CancellationToken::new();

        let accept_state = Arc::clone(&state);
        let accept_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                let stream = tokio::select! {
                    _ = accept_shutdown.cancelled() => break,
                    result = listener.accept() => match result {
                        Ok((stream, _)) => stream,
                        Err(_) => continue,
                    },
                };
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let state = Arc::clone(&state);
                        async move { Ok::<_, hyper::Error>(respond(&state, req).await) }
                    });
                    let _ = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });

        Ok(Self { addr, state, shutdown })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Guard config pointed at this mock with short timeouts.
    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            api_url: self.url(),
            api_key: "test-key".to_string(),
            request_timeout_secs: 2,
            ..GuardConfig::default()
        }
    }

    /// Poll until `cond` holds or `timeout` elapses.
    pub async fn wait_until<F: Fn(&MockState) -> bool>(&self, timeout: Duration, cond: F) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if cond(&self.state) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        cond(&self.state)
    }
}

impl Drop for MockAuthority {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn text(status: u16, body: String) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(body)));
    *resp.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    resp
}

async fn respond(state: &MockState, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let auth = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.auth_headers.lock().unwrap_or_else(|e| e.into_inner()).push(auth);

    match (req.method(), req.uri().path()) {
        (&Method::GET, "/v1/rules") => {
            state.rule_hits.fetch_add(1, Ordering::SeqCst);
            let delay = state.rules_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            let body = state.rules_body.lock().unwrap_or_else(|e| e.into_inner()).clone();
            text(state.rules_status.load(Ordering::SeqCst), body)
        }
        (&Method::POST, "/v1/fingerprints") => {
            let content_type = req
                .headers()
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            state.content_types.lock().unwrap_or_else(|e| e.into_inner()).push(content_type);

            let bytes = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(_) => return text(400, String::new()),
            };
            if let Ok(json) = serde_json::from_slice::<serde_json::Value>(&bytes) {
                state.batches.lock().unwrap_or_else(|e| e.into_inner()).push(json);
            }
            text(state.ingest_status.load(Ordering::SeqCst), String::new())
        }
        _ => text(404, String::new()),
    }
}

/// Rule set JSON in the wire shape served by `/v1/rules`.
pub fn rules_json(version: u64, blocked_uas: &[&str]) -> String {
    serde_json::json!({
        "version": version,
        "updatedAt": "2026-03-01",
        "blockedUAs": blocked_uas,
        "blockedIPs": ["198.51.100.0/24"],
        "headerPatterns": [{"name": "accept-language", "pattern": "^$", "weight": 0.5}],
        "anomalyThreshold": 0.7
    })
    .to_string()
}
