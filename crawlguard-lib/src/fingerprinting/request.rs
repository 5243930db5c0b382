use http::request::Parts;
use http::{HeaderMap, Method, Request};
use std::net::SocketAddr;

use crate::fingerprinting::headers::{names, NormalizedHeaders};
use crate::fingerprinting::ip::client_ip;

/// Normalized view of one incoming request, the input to the detection
/// pipeline and to fingerprint construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestView {
    pub ip: String,
    pub user_agent: String,
    pub headers: NormalizedHeaders,
    pub path: String,
    pub method: String,
}

impl RequestView {
    pub fn from_request<B>(req: &Request<B>, peer: Option<SocketAddr>) -> Self {
        Self::from_components(req.method(), req.uri().path(), req.headers(), peer)
    }

    pub fn from_parts(parts: &Parts, peer: Option<SocketAddr>) -> Self {
        Self::from_components(&parts.method, parts.uri.path(), &parts.headers, peer)
    }

    fn from_components(
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
    ) -> Self {
        // First value only, the way a single-valued lookup reads it.
        let user_agent = headers
            .get(names::USER_AGENT)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();

        Self {
            ip: client_ip(headers, peer),
            user_agent,
            headers: NormalizedHeaders::from_header_map(headers),
            path: path.to_string(),
            method: method.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_from_request() {
        let req = Request::builder()
            .method("POST")
            .uri("http://example.com/api/items?page=2")
            .header("User-Agent", "Mozilla/5.0")
            .header("X-Forwarded-For", "203.0.113.5, 10.0.0.2")
            .header("Accept-Language", "en")
            .body(())
            .unwrap_or_else(|e| panic!("request: {e}"));

        let view = RequestView::from_request(&req, "127.0.0.1:9999".parse().ok());
        assert_eq!(view.ip, "203.0.113.5");
        assert_eq!(view.user_agent, "Mozilla/5.0");
        assert_eq!(view.path, "/api/items");
        assert_eq!(view.method, "POST");
        assert_eq!(view.headers.get("accept-language"), Some("en"));
    }

    #[test]
    fn test_view_without_user_agent() {
        let req = Request::builder()
            .uri("/")
            .body(())
            .unwrap_or_else(|e| panic!("request: {e}"));

        let view = RequestView::from_request(&req, "192.0.2.4:1000".parse().ok());
        assert_eq!(view.user_agent, "");
        assert_eq!(view.ip, "192.0.2.4");
        assert!(view.headers.is_empty());
    }
}
