use http::HeaderMap;
use std::collections::HashMap;

/// HTTP header names the guard reads from incoming requests
pub mod names {
    /// Header name for the client user agent
    ///
    /// Matched case-insensitively against the blocked user-agent list.
    pub const USER_AGENT: &str = "user-agent";
}

/// HTTP header names for proxy forwarding information
///
/// Consulted (in this order) to resolve the client IP when the guard runs
/// behind a load balancer or another proxy.
pub mod forwarded {
    /// Header name for X-Forwarded-For
    ///
    /// Comma-separated list; the first entry is the original client.
    pub const FOR: &str = "x-forwarded-for";

    /// Header name for X-Real-IP
    ///
    /// Single client address set by nginx-style proxies.
    pub const REAL_IP: &str = "x-real-ip";
}

/// Lower-cased request headers with repeated values joined by `", "`.
///
/// Keeps the order in which header names first appeared so that the
/// ordering itself can be reported as part of a fingerprint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedHeaders {
    order: Vec<String>,
    values: HashMap<String, String>,
}

impl NormalizedHeaders {
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let mut normalized = Self {
            order: Vec::with_capacity(headers.keys_len()),
            values: HashMap::with_capacity(headers.keys_len()),
        };

        for name in headers.keys() {
            let joined = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            // http::HeaderName is already lower-case.
            normalized.order.push(name.as_str().to_string());
            normalized.values.insert(name.as_str().to_string(), joined);
        }

        normalized
    }

    /// Value of `name`, which must be lower-case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Value of `name`, or the empty string when the header is absent.
    pub fn value_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    /// Header names in arrival order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .filter_map(|name| self.values.get(name).map(|v| (name.as_str(), v.as_str())))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for NormalizedHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut normalized = Self::default();
        for (name, value) in iter {
            let name = name.as_ref().to_ascii_lowercase();
            match normalized.values.get_mut(&name) {
                Some(existing) => {
                    existing.push_str(", ");
                    existing.push_str(value.as_ref());
                }
                None => {
                    normalized.order.push(name.clone());
                    normalized.values.insert(name, value.as_ref().to_string());
                }
            }
        }
        normalized
    }
}
