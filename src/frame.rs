use crate::error::Error;

pub const FIN: u8 = 0x80;
pub const RSV1: u8 = 0x40;
pub const RSV2: u8 = 0x20;
pub const RSV3: u8 = 0x10;
const OPCODE_MASK: u8 = 0x0f;
const MASK_BIT: u8 = 0x80;
const LENGTH_MASK: u8 = 0x7f;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    pub fn from_u8(byte: u8) -> Result<Self, Error> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(Error::InvalidOpcode(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    pub fn is_control(self) -> bool {
        self.as_u8() & 0x08 != 0
    }
}

/// A parsed RFC 6455 status code out of a Close frame's first two payload bytes. Kept as a
/// raw newtype rather than an exhaustive enum since registered and private-use ranges both
/// need to round-trip even when this crate doesn't special-case them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseCode(pub u16);

impl CloseCode {
    pub const NORMAL: CloseCode = CloseCode(1000);
    pub const GOING_AWAY: CloseCode = CloseCode(1001);
    pub const PROTOCOL_ERROR: CloseCode = CloseCode(1002);
    pub const UNSUPPORTED_DATA: CloseCode = CloseCode(1003);
    pub const INVALID_PAYLOAD: CloseCode = CloseCode(1007);
    pub const POLICY_VIOLATION: CloseCode = CloseCode(1008);
    pub const MESSAGE_TOO_BIG: CloseCode = CloseCode(1009);

    pub fn parse(payload: &[u8]) -> Option<(CloseCode, &[u8])> {
        if payload.len() < 2 {
            return None;
        }
        let code = u16::from_be_bytes([payload[0], payload[1]]);
        Some((CloseCode(code), &payload[2..]))
    }

    pub fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

/// The two-to-fourteen-byte header that precedes every frame's payload. `header_len` is the
/// number of bytes (inclusive of the two leading bytes) the header occupied on the wire, so
/// callers can advance their read cursor past it.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub is_final: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    pub is_masked: bool,
    pub mask: u32,
    pub payload_len: u64,
    pub header_len: usize,
}

pub enum HeaderParseOutcome {
    /// Not enough bytes buffered yet; the caller should read more before trying again.
    Incomplete,
    Complete(FrameHeader),
}

/// Decodes as much of a frame header as `bytes` allows. Pure and synchronous: no I/O, no
/// role awareness beyond the masking check every server-bound frame is subject to.
pub fn decode_header(bytes: &[u8]) -> Result<HeaderParseOutcome, Error> {
    if bytes.len() < 2 {
        return Ok(HeaderParseOutcome::Incomplete);
    }

    let is_final = bytes[0] & FIN != 0;
    let rsv1 = bytes[0] & RSV1 != 0;
    let rsv2 = bytes[0] & RSV2 != 0;
    let rsv3 = bytes[0] & RSV3 != 0;
    let opcode = OpCode::from_u8(bytes[0] & OPCODE_MASK)?;

    // No extensions are negotiated by this server, so any reserved bit is a protocol error.
    if rsv1 || rsv2 || rsv3 {
        return Err(Error::ReservedBitsSet);
    }

    let is_masked = bytes[1] & MASK_BIT != 0;
    let short_len = bytes[1] & LENGTH_MASK;

    if !is_final && opcode.is_control() {
        return Err(Error::ControlFramesFragmented);
    }

    let len_field_size = match short_len {
        126 => 2usize,
        127 => 8usize,
        _ => 0usize,
    };

    let mut header_len = 2 + len_field_size;
    if bytes.len() < header_len {
        return Ok(HeaderParseOutcome::Incomplete);
    }

    let payload_len = match len_field_size {
        0 => short_len as u64,
        2 => u16::from_be_bytes([bytes[2], bytes[3]]) as u64,
        8 => u64::from_be_bytes(bytes[2..10].try_into().unwrap()),
        _ => unreachable!(),
    };

    if opcode.is_control() && payload_len > 125 {
        return Err(Error::ControlFramePayloadSize(payload_len as usize));
    }

    let mask_len = if is_masked { 4 } else { 0 };
    header_len += mask_len;
    if bytes.len() < header_len {
        return Ok(HeaderParseOutcome::Incomplete);
    }

    let mask = if is_masked {
        let start = header_len - 4;
        u32::from_be_bytes(bytes[start..start + 4].try_into().unwrap())
    } else {
        0
    };

    Ok(HeaderParseOutcome::Complete(FrameHeader {
        is_final,
        rsv1,
        rsv2,
        rsv3,
        opcode,
        is_masked,
        mask,
        payload_len,
        header_len,
    }))
}

/// Server-side decode: on top of `decode_header`, enforces that every client-to-server frame
/// carries a mask, per RFC 6455 §5.1.
pub fn decode_server_header(bytes: &[u8]) -> Result<HeaderParseOutcome, Error> {
    match decode_header(bytes)? {
        HeaderParseOutcome::Complete(header) if !header.is_masked => {
            Err(Error::UnmaskedClientFrame)
        }
        outcome => Ok(outcome),
    }
}

/// Encodes a server-originated frame header. Server frames are never masked, per RFC 6455
/// §5.1 — callers must not pass a mask here.
pub fn encode_header(opcode: OpCode, is_final: bool, payload_len: usize) -> Vec<u8> {
    let mut header = Vec::with_capacity(10);
    let first_byte = (if is_final { FIN } else { 0 }) | opcode.as_u8();
    header.push(first_byte);

    if payload_len <= 125 {
        header.push(payload_len as u8);
    } else if payload_len <= u16::MAX as usize {
        header.push(126);
        header.extend_from_slice(&(payload_len as u16).to_be_bytes());
    } else {
        header.push(127);
        header.extend_from_slice(&(payload_len as u64).to_be_bytes());
    }

    header
}

/// Encodes a complete server-originated frame (header + payload) in one allocation. Used by
/// the write path and by the round-trip tests below.
pub fn encode_frame(opcode: OpCode, is_final: bool, payload: &[u8]) -> Vec<u8> {
    let mut out = encode_header(opcode, is_final, payload.len());
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trips() {
        for byte in [0x0, 0x1, 0x2, 0x8, 0x9, 0xA] {
            let op = OpCode::from_u8(byte).unwrap();
            assert_eq!(op.as_u8(), byte);
        }
        assert!(matches!(OpCode::from_u8(0x3), Err(Error::InvalidOpcode(0x3))));
    }

    #[test]
    fn is_control_matches_high_bit() {
        assert!(OpCode::Close.is_control());
        assert!(OpCode::Ping.is_control());
        assert!(OpCode::Pong.is_control());
        assert!(!OpCode::Text.is_control());
        assert!(!OpCode::Binary.is_control());
        assert!(!OpCode::Continuation.is_control());
    }

    #[test]
    fn length_classes_pick_the_right_encoding() {
        assert_eq!(encode_header(OpCode::Binary, true, 125).len(), 2);
        assert_eq!(encode_header(OpCode::Binary, true, 126).len(), 4);
        assert_eq!(encode_header(OpCode::Binary, true, 65535).len(), 4);
        assert_eq!(encode_header(OpCode::Binary, true, 65536).len(), 10);
    }

    #[test]
    fn decodes_the_rfc_example_masked_hello_frame() {
        let wire = [0x82, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58];
        let header = match decode_server_header(&wire).unwrap() {
            HeaderParseOutcome::Complete(h) => h,
            HeaderParseOutcome::Incomplete => panic!("expected a complete header"),
        };
        assert!(header.is_final);
        assert_eq!(header.opcode, OpCode::Binary);
        assert!(header.is_masked);
        assert_eq!(header.payload_len, 5);
        assert_eq!(header.header_len, 6);
        let mut payload = wire[header.header_len..].to_vec();
        crate::mask::apply_mask_inplace(&mut payload, header.mask);
        assert_eq!(payload, b"Hello");
    }

    #[test]
    fn rejects_unmasked_server_bound_frames() {
        let wire = [0x82, 0x05, b'H', b'e', b'l', b'l', b'o'];
        assert!(matches!(
            decode_server_header(&wire),
            Err(Error::UnmaskedClientFrame)
        ));
    }

    #[test]
    fn rejects_oversized_control_frame() {
        let mut wire = vec![0x89, 126, 0, 126];
        wire.extend(std::iter::repeat(0u8).take(126));
        assert!(matches!(
            decode_header(&wire),
            Err(Error::ControlFramePayloadSize(126))
        ));
    }

    #[test]
    fn rejects_fragmented_control_frame() {
        let wire = [0x09, 0x00];
        assert!(matches!(
            decode_header(&wire),
            Err(Error::ControlFramesFragmented)
        ));
    }

    #[test]
    fn incomplete_header_requests_more_data_without_erroring() {
        assert!(matches!(
            decode_header(&[0x82]).unwrap(),
            HeaderParseOutcome::Incomplete
        ));
        // short-length says "126", but the two extended-length bytes haven't arrived yet.
        assert!(matches!(
            decode_header(&[0x82, 0x7e, 0x01]).unwrap(),
            HeaderParseOutcome::Incomplete
        ));
    }

    #[test]
    fn close_code_parses_and_round_trips() {
        let (code, reason) = CloseCode::parse(&[0x03, 0xea, b'b', b'y', b'e']).unwrap();
        assert_eq!(code, CloseCode::PROTOCOL_ERROR);
        assert_eq!(reason, b"bye");
        assert_eq!(CloseCode::PROTOCOL_ERROR.to_be_bytes(), [0x03, 0xea]);
    }

    #[test]
    fn encode_then_decode_header_agrees_on_every_field() {
        for (opcode, len) in [
            (OpCode::Text, 0usize),
            (OpCode::Binary, 125),
            (OpCode::Binary, 126),
            (OpCode::Binary, 70000),
        ] {
            let header_bytes = encode_header(opcode, true, len);
            let decoded = match decode_header(&header_bytes).unwrap() {
                HeaderParseOutcome::Complete(h) => h,
                HeaderParseOutcome::Incomplete => panic!("server-encoded header must be complete"),
            };
            assert_eq!(decoded.opcode, opcode);
            assert_eq!(decoded.payload_len, len as u64);
            assert!(decoded.is_final);
            assert!(!decoded.is_masked);
            assert_eq!(decoded.header_len, header_bytes.len());
        }
    }
}
