//! The HTTP/1.1 request line and header set carried by a WebSocket upgrade request.
//!
//! Parsing itself lives in `http.rs`, which builds one of these line by line off an
//! [`crate::buffer::InputChannel`]; this module is just the data model plus the header-name
//! lookup table every handshake needs to consult.

use std::collections::HashMap;

/// An upgrade request's start line and headers. Header names are stored lowercased so lookups
/// are case-insensitive without re-hashing on every `get_header`, matching RFC 7230's "field
/// names are case-insensitive" rule.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub version: String,
    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    pub fn new(method: String, path: String, version: String, headers: HashMap<String, String>) -> Self {
        HttpRequest {
            method,
            path,
            version,
            headers,
        }
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// True if `name`'s value contains `token` as one of a comma-separated, whitespace-trimmed
    /// list, case-insensitively — the shape `Connection` and `Sec-WebSocket-Extensions` use.
    pub fn header_contains_token(&self, name: &str, token: &str) -> bool {
        self.get_header(name)
            .map(|value| {
                value
                    .split(',')
                    .any(|part| part.trim().eq_ignore_ascii_case(token))
            })
            .unwrap_or(false)
    }
}

/// Canonical names for the headers this crate reads or writes, for consistent lookups.
pub mod headers {
    pub const HOST: &str = "host";
    pub const UPGRADE: &str = "upgrade";
    pub const CONNECTION: &str = "connection";
    pub const SEC_WEBSOCKET_KEY: &str = "sec-websocket-key";
    pub const SEC_WEBSOCKET_VERSION: &str = "sec-websocket-version";
    pub const SEC_WEBSOCKET_ACCEPT: &str = "sec-websocket-accept";
    pub const SEC_WEBSOCKET_PROTOCOL: &str = "sec-websocket-protocol";
    pub const SEC_WEBSOCKET_EXTENSIONS: &str = "sec-websocket-extensions";
    pub const ORIGIN: &str = "origin";
    pub const USER_AGENT: &str = "user-agent";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HttpRequest {
        let mut headers = HashMap::new();
        headers.insert("connection".to_string(), "keep-alive, Upgrade".to_string());
        headers.insert("upgrade".to_string(), "websocket".to_string());
        headers.insert("host".to_string(), "example.com".to_string());
        HttpRequest::new("GET".to_string(), "/chat".to_string(), "HTTP/1.1".to_string(), headers)
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = sample();
        assert_eq!(req.get_header("Host"), Some("example.com"));
        assert_eq!(req.get_header("HOST"), Some("example.com"));
    }

    #[test]
    fn token_lookup_handles_comma_separated_lists() {
        let req = sample();
        assert!(req.header_contains_token("connection", "upgrade"));
        assert!(req.header_contains_token("connection", "keep-alive"));
        assert!(!req.header_contains_token("connection", "close"));
    }
}
