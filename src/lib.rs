//! A server-side RFC 6455 WebSocket hub.
//!
//! Binds a `tokio::net::TcpListener`, performs the HTTP/1.1 upgrade handshake over a
//! zero-copy streaming parser, decodes and encodes frames, reassembles fragmented messages,
//! and fans text/binary messages out to a [`ServerHooks`] implementation. See [`ServerHub`]
//! for the entry point.

pub mod buffer;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod hooks;
pub mod http;
pub mod hub;
mod mask;
pub mod message;
pub mod request;
pub mod utils;

pub use config::WebSocketConfig;
pub use connection::{Connection, ConnectionHandle, ConnectionId};
pub use error::Error;
pub use frame::{CloseCode, OpCode};
pub use hooks::{NoopHooks, ServerHooks};
pub use hub::ServerHub;
pub use message::{Message, Payload};
pub use request::HttpRequest;
