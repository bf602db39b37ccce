//! Per-connection state: the handshake, and the ingress/egress loop that follows it.
//!
//! `ConnectionHandle` is concretized directly on `tokio::net::TcpStream`'s owned halves
//! rather than generic over `AsyncRead + AsyncWrite` — TLS termination is out of scope, so
//! there's only ever one concrete transport, and a generic parameter here would just be
//! threaded through `ServerHub` and `ServerHooks` for no benefit.

use crate::buffer::{InputChannel, OutputChannel};
use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::{self, CloseCode, FrameHeader, HeaderParseOutcome, OpCode};
use crate::hooks::ServerHooks;
use crate::http;
use crate::message::{Message, Payload};
use crate::request::{headers, HttpRequest};
use crate::utils;
use bytes::Bytes;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub type ConnectionId = Uuid;
pub type Connection = Arc<ConnectionHandle>;
pub type Registry = Arc<RwLock<HashMap<ConnectionId, Connection>>>;

/// A live, handshaken WebSocket connection. Shared as an `Arc` between the registry, the
/// ingress loop, and any hook callback that wants to write back to the peer — there is no
/// back-reference from here to the hub, so a plain strong `Arc` in the registry cannot form a
/// reference cycle.
pub struct ConnectionHandle {
    id: ConnectionId,
    host: String,
    path: String,
    origin: Option<String>,
    protocol: Option<String>,
    egress: Mutex<OutputChannel<OwnedWriteHalf>>,
    closed: AtomicBool,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub async fn send_text(&self, text: &str) -> Result<(), Error> {
        self.send_message(OpCode::Text, text.as_bytes()).await
    }

    pub async fn send_binary(&self, data: &[u8]) -> Result<(), Error> {
        self.send_message(OpCode::Binary, data).await
    }

    pub async fn send_ping(&self, payload: &[u8]) -> Result<(), Error> {
        self.write_control(OpCode::Ping, payload).await
    }

    pub async fn send_pong(&self, payload: &[u8]) -> Result<(), Error> {
        self.write_control(OpCode::Pong, payload).await
    }

    pub async fn close(&self, code: CloseCode, reason: &str) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut payload = code.to_be_bytes().to_vec();
        payload.extend_from_slice(reason.as_bytes());
        let frame = frame::encode_frame(OpCode::Close, true, &payload);
        let mut egress = self.egress.lock().await;
        let _ = egress.write_raw(&frame).await;
        let _ = egress.shutdown().await;
        Ok(())
    }

    async fn send_message(&self, opcode: OpCode, payload: &[u8]) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let frame = frame::encode_frame(opcode, true, payload);
        self.egress.lock().await.write_raw(&frame).await
    }

    async fn write_control(&self, opcode: OpCode, payload: &[u8]) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let frame = frame::encode_frame(opcode, true, payload);
        self.egress.lock().await.write_raw(&frame).await
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Reads the upgrade request, validates it, runs the `authenticate` hook, and writes the 101
/// (or 400/403) response. On success returns the new handle plus the still-open read half for
/// the caller to hand to [`ingress_loop`].
pub async fn perform_handshake<H: ServerHooks>(
    stream: TcpStream,
    config: &WebSocketConfig,
    hooks: &Arc<H>,
) -> Result<(Connection, InputChannel<OwnedReadHalf>), Error> {
    let (read_half, write_half) = stream.into_split();
    let mut input = InputChannel::new(read_half);
    let mut egress = OutputChannel::new(write_half);

    let request = http::parse_upgrade_request(&mut input).await?;
    if let Err(err) = validate_upgrade_request(&request, config) {
        if let Error::UnsupportedVersion(_) = &err {
            let _ = egress
                .write_raw(b"HTTP/1.1 400 Bad Request\r\nSec-WebSocket-Version: 13\r\n\r\n")
                .await;
        }
        let _ = egress.shutdown().await;
        return Err(err);
    }

    let client_key = request
        .get_header(headers::SEC_WEBSOCKET_KEY)
        .ok_or(Error::MissingHeader("Sec-WebSocket-Key"))?
        .to_string();

    let host = request
        .get_header(headers::HOST)
        .unwrap_or_default()
        .to_string();
    let origin = request.get_header(headers::ORIGIN).map(str::to_string);
    let protocol = utils::negotiate_subprotocol(
        request.get_header(headers::SEC_WEBSOCKET_PROTOCOL),
        &config.subprotocols,
    );

    let handle = Arc::new(ConnectionHandle {
        id: utils::generate_connection_id(),
        host,
        path: request.path.clone(),
        origin,
        protocol: protocol.clone(),
        egress: Mutex::new(egress),
        closed: AtomicBool::new(false),
    });

    if !hooks.authenticate(&handle, &request).await {
        let mut egress = handle.egress.lock().await;
        let _ = egress
            .write_raw(b"HTTP/1.1 403 Forbidden\r\nConnection: close\r\n\r\n")
            .await;
        let _ = egress.shutdown().await;
        return Err(Error::HandshakeRejected);
    }

    let accept_key = utils::compute_accept_key(&client_key);
    let response = build_switching_protocols_response(&accept_key, protocol.as_deref());
    handle
        .egress
        .lock()
        .await
        .write_raw(response.as_bytes())
        .await?;

    Ok((handle, input))
}

fn validate_upgrade_request(request: &HttpRequest, config: &WebSocketConfig) -> Result<(), Error> {
    if request
        .get_header(headers::HOST)
        .map(str::is_empty)
        .unwrap_or(true)
    {
        return Err(Error::MissingHeader("Host"));
    }

    if !config.allow_clients_missing_connection_headers {
        if !request.header_contains_token(headers::CONNECTION, "upgrade") {
            return Err(Error::MissingHeader("Connection: Upgrade"));
        }
        if !request
            .get_header(headers::UPGRADE)
            .map(|v| v.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false)
        {
            return Err(Error::MissingHeader("Upgrade: websocket"));
        }
    }

    if request.get_header(headers::SEC_WEBSOCKET_KEY).is_none() {
        return Err(Error::MissingHeader("Sec-WebSocket-Key"));
    }

    match request.get_header(headers::SEC_WEBSOCKET_VERSION) {
        Some("4" | "5" | "6" | "7" | "8" | "13") => {}
        Some(other) => return Err(Error::UnsupportedVersion(other.to_string())),
        None => return Err(Error::MissingHeader("Sec-WebSocket-Version")),
    }

    Ok(())
}

fn build_switching_protocols_response(accept_key: &str, protocol: Option<&str>) -> String {
    let mut response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept_key}\r\n"
    );
    if let Some(protocol) = protocol {
        response.push_str(&format!("Sec-WebSocket-Protocol: {protocol}\r\n"));
    }
    response.push_str("\r\n");
    response
}

/// Tracks an in-progress fragmented message (a data frame with `FIN=0` followed by zero or
/// more continuation frames). Only meaningful when `buffer_fragments` is enabled; otherwise
/// each frame is delivered to the hooks as soon as it's decoded.
struct FragmentAccumulator {
    opcode: OpCode,
    parts: Vec<Bytes>,
}

/// Reads frames off `input` until the connection closes, dispatching each complete message to
/// the appropriate hook. Returns normally on a clean close (either side); propagates any I/O
/// error that isn't itself a deliberate close.
pub async fn ingress_loop<H: ServerHooks>(
    connection: Connection,
    mut input: InputChannel<OwnedReadHalf>,
    config: WebSocketConfig,
    hooks: Arc<H>,
) {
    hooks.on_handshake_complete(&connection).await;

    let mut accumulator: Option<FragmentAccumulator> = None;

    loop {
        let header = match read_frame_header(&mut input).await {
            Ok(Some(header)) => header,
            Ok(None) => break,
            Err(err) => {
                log_ingress_error(&connection, &err);
                hooks.on_error(&connection, &err).await;
                let code = if err.is_protocol_violation() {
                    CloseCode::PROTOCOL_ERROR
                } else {
                    CloseCode::NORMAL
                };
                let _ = connection.close(code, "").await;
                hooks.on_close(&connection, code, "").await;
                break;
            }
        };

        if header.payload_len as usize > config.max_frame_payload {
            let err = Error::MaxFrameSize(header.payload_len, config.max_frame_payload);
            log_ingress_error(&connection, &err);
            hooks.on_error(&connection, &err).await;
            let _ = connection.close(CloseCode::MESSAGE_TOO_BIG, "").await;
            hooks
                .on_close(&connection, CloseCode::MESSAGE_TOO_BIG, "")
                .await;
            break;
        }

        let mut payload = match input.take_exact(header.payload_len as usize).await {
            Ok(p) => p,
            Err(_) => break,
        };
        if header.is_masked {
            let mut owned = payload.to_vec();
            crate::mask::apply_mask_inplace(&mut owned, header.mask);
            payload = Bytes::from(owned);
        }

        match dispatch_frame(
            &connection,
            &config,
            &hooks,
            &mut accumulator,
            header,
            payload,
        )
        .await
        {
            Ok(true) => continue,
            Ok(false) => break,
            Err(err) => {
                log_ingress_error(&connection, &err);
                hooks.on_error(&connection, &err).await;
                let code = if err.is_protocol_violation() {
                    CloseCode::PROTOCOL_ERROR
                } else {
                    CloseCode::NORMAL
                };
                let _ = connection.close(code, "").await;
                hooks.on_close(&connection, code, "").await;
                break;
            }
        }
    }

    connection.mark_closed();
}

/// Protocol violations are worth an operator's attention (a peer broke the wire contract);
/// everything else that tears a connection down is routine and gets a quieter line.
fn log_ingress_error(connection: &Connection, err: &Error) {
    if err.is_protocol_violation() {
        warn!("connection {} violated protocol: {err}", connection.id());
    } else {
        debug!("connection {} ingress error: {err}", connection.id());
    }
}

async fn read_frame_header(
    input: &mut InputChannel<OwnedReadHalf>,
) -> Result<Option<FrameHeader>, Error> {
    loop {
        match frame::decode_server_header(input.as_slice())? {
            HeaderParseOutcome::Complete(header) => {
                input.advance(header.header_len);
                return Ok(Some(header));
            }
            HeaderParseOutcome::Incomplete => {
                if input.read_async().await? {
                    if input.is_empty() {
                        return Ok(None);
                    }
                    return Err(Error::HandshakeMalformed);
                }
            }
        }
    }
}

/// Returns `Ok(true)` to keep looping, `Ok(false)` on a clean stop (peer Close handled).
async fn dispatch_frame<H: ServerHooks>(
    connection: &Connection,
    config: &WebSocketConfig,
    hooks: &Arc<H>,
    accumulator: &mut Option<FragmentAccumulator>,
    header: FrameHeader,
    payload: Bytes,
) -> Result<bool, Error> {
    match header.opcode {
        OpCode::Ping => {
            connection.send_pong(&payload).await?;
            Ok(true)
        }
        OpCode::Pong => {
            hooks.on_pong(connection, &payload).await;
            Ok(true)
        }
        OpCode::Close => {
            let (code, reason) = match CloseCode::parse(&payload) {
                Some((code, reason)) => (code, String::from_utf8_lossy(reason).into_owned()),
                None => (CloseCode::NORMAL, String::new()),
            };
            connection.close(code, &reason).await?;
            hooks.on_close(connection, code, &reason).await;
            Ok(false)
        }
        OpCode::Text | OpCode::Binary => {
            if accumulator.is_some() {
                return Err(Error::FragmentedInProgress);
            }
            if header.is_final {
                deliver_message(connection, hooks, header.opcode, Payload::Single(payload), true)
                    .await?;
            } else if config.buffer_fragments {
                *accumulator = Some(FragmentAccumulator {
                    opcode: header.opcode,
                    parts: vec![payload],
                });
            } else {
                deliver_message(
                    connection,
                    hooks,
                    header.opcode,
                    Payload::Single(payload),
                    false,
                )
                .await?;
                *accumulator = Some(FragmentAccumulator {
                    opcode: header.opcode,
                    parts: Vec::new(),
                });
            }
            Ok(true)
        }
        OpCode::Continuation => match accumulator.take() {
            None => Err(Error::InvalidContinuationFrame),
            Some(mut acc) => {
                if config.buffer_fragments {
                    acc.parts.push(payload);
                    let total: usize = acc.parts.iter().map(Bytes::len).sum();
                    if total > config.max_message_size {
                        return Err(Error::MaxMessageSize(total, config.max_message_size));
                    }
                    if header.is_final {
                        deliver_message(
                            connection,
                            hooks,
                            acc.opcode,
                            Payload::Fragmented(acc.parts),
                            true,
                        )
                        .await?;
                    } else {
                        *accumulator = Some(acc);
                    }
                } else {
                    deliver_message(
                        connection,
                        hooks,
                        acc.opcode,
                        Payload::Single(payload),
                        header.is_final,
                    )
                    .await?;
                    if !header.is_final {
                        *accumulator = Some(acc);
                    }
                }
                Ok(true)
            }
        },
    }
}

/// Delivers an assembled payload to the matching hook. A `Text` message is validated as UTF-8
/// up front — invalid UTF-8 is a protocol violation the ingress loop answers with Close 1002,
/// not something deferred to the hook layer.
async fn deliver_message<H: ServerHooks>(
    connection: &Connection,
    hooks: &Arc<H>,
    opcode: OpCode,
    payload: Payload,
    is_final: bool,
) -> Result<(), Error> {
    let message = Message::new(opcode, payload, is_final);
    if opcode == OpCode::Text {
        message.as_text()?;
        hooks.on_text(connection, &message).await;
    } else {
        hooks.on_binary(connection, &message).await;
    }
    Ok(())
}
