/// Configuration accepted by [`crate::hub::ServerHub::new`].
///
/// `buffer_fragments` and `allow_clients_missing_connection_headers` are the two flags named
/// directly by the spec; the size guards are this crate's answer to "no persistent session
/// store" still needing to survive a hostile peer that never sends a final frame.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// If `false` (default), each frame of a fragmented message is delivered to the user hook
    /// as its own `Message` with `is_final` mirroring the frame. If `true`, fragments are
    /// reassembled and delivered once, on the final frame.
    pub buffer_fragments: bool,
    /// Accept a handshake that is missing `Connection: Upgrade` / `Upgrade: websocket` as long
    /// as it still carries a valid `Sec-WebSocket-Key` and version 13. Exists for interoperating
    /// with proxies and noncompliant clients that drop those headers; defaults to `false`.
    pub allow_clients_missing_connection_headers: bool,
    /// Upper bound on a single frame's payload length, checked as soon as the length is known
    /// (before the payload itself is read off the socket).
    pub max_frame_payload: usize,
    /// Upper bound on a reassembled message's total payload length when `buffer_fragments` is
    /// `true`. Ignored when `buffer_fragments` is `false`, since each frame is delivered on its
    /// own and is already bounded by `max_frame_payload`.
    pub max_message_size: usize,
    /// Subprotocol names this server is willing to speak, in preference order. The first one
    /// also present in the client's `Sec-WebSocket-Protocol` header is echoed back; `None` if
    /// there is no overlap or the client didn't ask.
    pub subprotocols: Vec<String>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            buffer_fragments: false,
            allow_clients_missing_connection_headers: false,
            max_frame_payload: 16 << 20,
            max_message_size: 64 << 20,
            subprotocols: Vec::new(),
        }
    }
}
