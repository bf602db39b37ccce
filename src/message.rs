//! The assembled unit handed to [`crate::hooks::ServerHooks`] — either a single frame's
//! payload or, when [`crate::config::WebSocketConfig::buffer_fragments`] is set, a whole
//! fragmented message's payload reassembled in frame-received order.

use crate::error::Error;
use crate::frame::OpCode;
use bytes::Bytes;
use std::sync::OnceLock;

/// Holds a message's bytes either as the single `Bytes` slice a non-fragmented frame handed
/// over, or as the list of fragment slices a buffered multi-frame message was assembled from.
/// Keeping fragments separate avoids a copy on arrival; `to_vec` is the one place that pays
/// for a contiguous copy, and only when a caller actually asks for one.
#[derive(Debug, Clone)]
pub enum Payload {
    Single(Bytes),
    Fragmented(Vec<Bytes>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Single(b) => b.len(),
            Payload::Fragmented(parts) => parts.iter().map(Bytes::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        match self {
            Payload::Single(b) => b.to_vec(),
            Payload::Fragmented(parts) => {
                let mut out = Vec::with_capacity(self.len());
                for part in parts {
                    out.extend_from_slice(part);
                }
                out
            }
        }
    }
}

/// A complete text or binary message delivered to a hook. `as_text` decodes UTF-8 lazily and
/// caches the result, so calling it more than once on the same message costs one decode, not
/// one per call — `OnceLock` rather than a `Mutex` since the cached value never changes once
/// written and reads vastly outnumber the single write.
pub struct Message {
    opcode: OpCode,
    payload: Payload,
    is_final: bool,
    text_cache: OnceLock<Result<String, std::str::Utf8Error>>,
}

impl Message {
    pub fn new(opcode: OpCode, payload: Payload, is_final: bool) -> Self {
        Message {
            opcode,
            payload,
            is_final,
            text_cache: OnceLock::new(),
        }
    }

    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn as_binary(&self) -> Vec<u8> {
        self.payload.to_vec()
    }

    /// Decodes the payload as UTF-8, caching the result on first call. A `Binary` message can
    /// be asked for text too (the hook layer doesn't enforce opcode here); only `Text`
    /// messages are validated eagerly by the connection state machine before this is ever
    /// reachable by a hook.
    pub fn as_text(&self) -> Result<&str, Error> {
        self.text_cache
            .get_or_init(|| {
                let bytes = self.payload.to_vec();
                match std::str::from_utf8(&bytes) {
                    Ok(s) => Ok(s.to_string()),
                    Err(e) => Err(e),
                }
            })
            .as_deref()
            .map_err(|e| Error::FromUtf8Error { source: *e })
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("opcode", &self.opcode)
            .field("len", &self.len())
            .field("is_final", &self.is_final)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_text_decodes_and_caches() {
        let msg = Message::new(OpCode::Text, Payload::Single(Bytes::from_static(b"hello")), true);
        assert_eq!(msg.as_text().unwrap(), "hello");
        // second call must hit the cache and return the same value
        assert_eq!(msg.as_text().unwrap(), "hello");
    }

    #[test]
    fn as_text_reports_invalid_utf8() {
        let msg = Message::new(OpCode::Text, Payload::Single(Bytes::from_static(&[0xff, 0xfe])), true);
        assert!(msg.as_text().is_err());
    }

    #[test]
    fn fragmented_payload_reassembles_in_order() {
        let payload = Payload::Fragmented(vec![
            Bytes::from_static(b"hel"),
            Bytes::from_static(b"lo "),
            Bytes::from_static(b"world"),
        ]);
        let msg = Message::new(OpCode::Text, payload, true);
        assert_eq!(msg.as_text().unwrap(), "hello world");
        assert_eq!(msg.len(), 11);
    }
}
