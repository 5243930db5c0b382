use http::request::Parts;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use std::future::Future;
use std::net::SocketAddr;

use crate::detection::Decision;
use crate::fingerprinting::{Fingerprint, RequestView};
use crate::guard::{Guard, RespBody};

/// Default response for a blocked request: `403 Forbidden`, empty body.
pub fn forbidden() -> Response<RespBody> {
    let body = Empty::<Bytes>::new().map_err(|never| match never {}).boxed();
    let mut resp = Response::new(body);
    *resp.status_mut() = StatusCode::FORBIDDEN;
    resp
}

impl Guard {
    /// Analyze a request and record its fingerprint, without answering it.
    ///
    /// For callers that apply the decision themselves.
    pub fn inspect(&self, parts: &Parts, peer: Option<SocketAddr>) -> Decision {
        let view = RequestView::from_parts(parts, peer);
        let decision = self.analyze(&view);
        self.telemetry().push(Fingerprint::from_view(&view));
        decision
    }

    /// Per-request entry point.
    ///
    /// Runs the pipeline, records the fingerprint, then either hands the
    /// request to `next` or answers it with the block response.
    pub async fn handle<B, F, Fut>(
        &self,
        req: Request<B>,
        peer: Option<SocketAddr>,
        next: F,
    ) -> Response<RespBody>
    where
        F: FnOnce(Request<B>) -> Fut,
        Fut: Future<Output = Response<RespBody>>,
    {
        let (parts, body) = req.into_parts();
        let decision = self.inspect(&parts, peer);

        if decision.is_block() {
            return self.block_response(&parts, &decision);
        }
        next(Request::from_parts(parts, body)).await
    }

    pub fn block_response(&self, parts: &Parts, decision: &Decision) -> Response<RespBody> {
        match &self.block_handler {
            Some(handler) => handler(parts, decision),
            None => forbidden(),
        }
    }
}
