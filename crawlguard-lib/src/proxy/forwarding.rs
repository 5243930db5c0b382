use http::{Request, Response};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::warn;

use crate::guard::RespBody;
use crate::proxy::http_result::{HttpError, HttpResult};
use crate::proxy::synthetic_response::synthetic_error_response;

pub type HttpClient = Client<HttpConnector, Incoming>;

/// Pooled HTTP/1.1 client shared by every connection task.
pub fn create_client(connect_timeout: Duration) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new()).build(connector)
}

/// Rewrite `req` to target `backend` (host:port) and send it.
pub async fn forward(
    req: Request<Incoming>,
    backend: &str,
    client: &HttpClient,
    preserve_host: bool,
) -> HttpResult<Response<RespBody>> {
    let pq = req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    let uri = format!("http://{backend}{pq}")
        .parse::<http::Uri>()
        .map_err(|e| HttpError::InvalidUri(e.to_string()))?;

    let (mut parts, body) = req.into_parts();

    let original_host = preserve_host
        .then(|| parts.headers.get(http::header::HOST).cloned())
        .flatten();
    parts.uri = uri;
    // Backends always speak HTTP/1.1 through the pooled client.
    parts.version = http::Version::HTTP_11;
    parts.headers.remove(http::header::HOST);
    if let Some(host) = original_host {
        parts.headers.insert(http::header::HOST, host);
    }

    let out_req = Request::from_parts(parts, body);

    match client.request(out_req).await {
        Ok(resp) => Ok(resp.map(|b| b.boxed())),
        Err(e) => Err(HttpError::FailedToGetResponseFromBackend(e.to_string())),
    }
}

/// Answer a forwarding failure without exposing its cause to the client.
pub fn error_response(error: &HttpError) -> Response<RespBody> {
    warn!(error = %error, error_type = error.error_type(), "Forwarding failed");
    synthetic_error_response(error.into())
}
