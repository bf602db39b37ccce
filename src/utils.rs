use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use uuid::Uuid;

const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes `Sec-WebSocket-Accept` from the client's `Sec-WebSocket-Key`, per RFC 6455 §1.3:
/// SHA-1 of the key concatenated with the protocol's fixed GUID, base64-encoded.
pub fn compute_accept_key(client_key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(client_key.as_bytes());
    sha1.update(WEBSOCKET_GUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

/// Generates a connection identifier. UUIDv8 lets the bytes be arbitrary (here, random),
/// which is all a connection ID needs to be — unique and unguessable, not time-ordered.
pub fn generate_connection_id() -> Uuid {
    Uuid::new_v8(rand::random())
}

/// Picks the first of `server_protocols` (in server preference order) that also appears in
/// the client's comma-separated `Sec-WebSocket-Protocol` value.
pub fn negotiate_subprotocol(client_value: Option<&str>, server_protocols: &[String]) -> Option<String> {
    let offered: Vec<&str> = client_value?.split(',').map(str::trim).collect();
    server_protocols
        .iter()
        .find(|candidate| offered.iter().any(|o| o.eq_ignore_ascii_case(candidate)))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_the_rfc_example_accept_key() {
        // The exact example from RFC 6455 §1.3.
        assert_eq!(
            compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn negotiates_the_first_server_preference_present_on_the_client() {
        let server = vec!["chat.v2".to_string(), "chat.v1".to_string()];
        assert_eq!(
            negotiate_subprotocol(Some("chat.v1, chat.v2"), &server),
            Some("chat.v2".to_string())
        );
    }

    #[test]
    fn no_overlap_yields_none() {
        let server = vec!["chat.v2".to_string()];
        assert_eq!(negotiate_subprotocol(Some("chat.v1"), &server), None);
        assert_eq!(negotiate_subprotocol(None, &server), None);
    }
}
