use thiserror::Error;

/// Every fallible operation in this crate returns one of these. The `is_protocol_violation`
/// helper tells the ingress loop (`connection.rs`) which variants should be answered with a
/// Close 1002 frame before the connection is torn down, per the error table in the design doc.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{source}")]
    IOError {
        #[from]
        source: std::io::Error,
    },

    // Handshake errors
    #[error("handshake request was malformed or incomplete")]
    HandshakeMalformed,

    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("authenticate hook rejected the handshake")]
    HandshakeRejected,

    #[error("unsupported Sec-WebSocket-Version: {0}")]
    UnsupportedVersion(String),

    // Framing errors
    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    #[error("reserved bits set without a negotiated extension")]
    ReservedBitsSet,

    #[error("control frame payload of {0} bytes exceeds 125")]
    ControlFramePayloadSize(usize),

    #[error("control frame must not be fragmented")]
    ControlFramesFragmented,

    #[error("unmasked frame received from a client")]
    UnmaskedClientFrame,

    #[error("max frame size reached ({0} > {1})")]
    MaxFrameSize(u64, usize),

    #[error("max message size reached ({0} > {1})")]
    MaxMessageSize(usize, usize),

    // Fragmentation errors
    #[error("data frame received while a fragmented message is already in progress")]
    FragmentedInProgress,

    #[error("continuation frame received with no fragmented message in progress")]
    InvalidContinuationFrame,

    // Text validation
    #[error("{source}")]
    FromUtf8Error {
        #[from]
        source: std::str::Utf8Error,
    },

    // Generic wire-level protocol violation, for cases the table above doesn't name individually
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("the connection is closed")]
    ConnectionClosed,
}

impl Error {
    /// True for every variant the ingress loop answers with a Close 1002 frame.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::InvalidOpcode(_)
                | Error::ReservedBitsSet
                | Error::ControlFramePayloadSize(_)
                | Error::ControlFramesFragmented
                | Error::UnmaskedClientFrame
                | Error::MaxFrameSize(_, _)
                | Error::MaxMessageSize(_, _)
                | Error::FragmentedInProgress
                | Error::InvalidContinuationFrame
                | Error::FromUtf8Error { .. }
                | Error::ProtocolViolation(_)
        )
    }
}
