use http::HeaderMap;
use ipnet::Ipv4Net;
use std::borrow::Cow;
use std::net::{Ipv4Addr, SocketAddr};

use crate::fingerprinting::headers::forwarded;

/// Resolve the client IP for a request.
///
/// Precedence: first entry of `X-Forwarded-For`, then `X-Real-IP`, then the
/// transport peer. A trailing `:port` (or `[v6]:port`) is always stripped.
/// An IPv4-mapped peer (`::ffff:a.b.c.d`) is reported as plain IPv4.
/// Returns an empty string when nothing is available.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(xff) = non_empty_header(headers, forwarded::FOR) {
        let first = xff.split(',').next().unwrap_or_default().trim();
        return strip_port(first).to_string();
    }
    if let Some(real_ip) = non_empty_header(headers, forwarded::REAL_IP) {
        return strip_port(real_ip.trim()).to_string();
    }
    peer.map(|p| p.ip().to_canonical().to_string()).unwrap_or_default()
}

// Opaque bytes are kept (lossily) so a present header is never skipped.
fn non_empty_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<Cow<'a, str>> {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()))
        .filter(|v| !v.is_empty())
}

/// Strip a port suffix from an address.
///
/// `[::1]:8080` becomes `::1`; `1.2.3.4:80` becomes `1.2.3.4`. A bare IPv6
/// address (more than one colon, no brackets) is returned unchanged.
pub fn strip_port(addr: &str) -> &str {
    if let Some(rest) = addr.strip_prefix('[') {
        if let Some(idx) = rest.rfind("]:") {
            return &rest[..idx];
        }
        if let Some(inner) = rest.strip_suffix(']') {
            return inner;
        }
        return addr;
    }
    if addr.matches(':').count() == 1 {
        if let Some((host, _)) = addr.split_once(':') {
            return host;
        }
    }
    addr
}

/// One pre-parsed entry of the blocked IP list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpRule {
    /// Entry without a slash: exact string match against the client IP.
    Exact(String),
    /// IPv4 `a.b.c.d/n` with `n` in `0..=32`.
    Cidr(Ipv4Net),
    /// Entry with a slash that failed to parse. Never matches.
    Invalid(String),
}

impl IpRule {
    pub fn parse(entry: &str) -> Self {
        if !entry.contains('/') {
            return IpRule::Exact(entry.to_string());
        }
        match entry.parse::<Ipv4Net>() {
            Ok(net) => IpRule::Cidr(net),
            Err(_) => IpRule::Invalid(entry.to_string()),
        }
    }

    /// `parsed` is the client IP as IPv4, if it is one. Callers parse it once
    /// per request instead of once per rule.
    pub fn matches(&self, ip: &str, parsed: Option<Ipv4Addr>) -> bool {
        match self {
            IpRule::Exact(exact) => exact == ip,
            IpRule::Cidr(net) => parsed.is_some_and(|addr| net.contains(&addr)),
            IpRule::Invalid(_) => false,
        }
    }
}

/// Whether `ip` falls inside `cidr`.
///
/// Entries without a slash are compared as exact strings. CIDR entries only
/// support IPv4; an unparsable address or a prefix outside `0..=32` never
/// matches.
pub fn cidr_contains(cidr: &str, ip: &str) -> bool {
    IpRule::parse(cidr).matches(ip, ip.parse::<Ipv4Addr>().ok())
}
