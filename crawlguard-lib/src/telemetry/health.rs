use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::Response;
use hyper::StatusCode;
use serde_json::json;

use crate::error::{GuardError, Result};

type RespBody = BoxBody<Bytes, hyper::Error>;

/// Health check response - always 200 while the process runs, with the
/// active rule version for diagnostics
pub fn health_check_response(rules_version: u64) -> Result<Response<RespBody>> {
    let body = json!({"status": "healthy", "rulesVersion": rules_version});
    let body_bytes = serde_json::to_vec(&body)
        .map_err(|e| GuardError::Http(format!("Failed to serialize health response: {e}")))?;

    let body = Full::new(Bytes::from(body_bytes))
        .map_err(|never| match never {})
        .boxed();

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(body)
        .map_err(|e| GuardError::Http(format!("Failed to build health response: {e}")))
}
