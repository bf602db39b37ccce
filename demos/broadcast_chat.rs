//! A minimal chat room: every text message a client sends is broadcast to every other
//! connected client.
//!
//! Run with `cargo run --example broadcast_chat`, then connect several WebSocket clients to
//! `ws://127.0.0.1:9002`.

use std::sync::Arc;
use wshub::{Connection, Message, ServerHooks, ServerHub, WebSocketConfig};

struct ChatHooks {
    hub: tokio::sync::OnceCell<Arc<ServerHub<ChatHooks>>>,
}

impl ServerHooks for ChatHooks {
    async fn on_text(&self, connection: &Connection, message: &Message) {
        let Ok(text) = message.as_text() else { return };
        let Some(hub) = self.hub.get() else { return };
        let sender = connection.id();
        let line = format!("{sender}: {text}");
        let predicate = move |c: &Connection| c.id() != sender;
        hub.broadcast_text(&line, Some(&predicate)).await;
    }

    async fn on_close(&self, connection: &Connection, _code: wshub::CloseCode, _reason: &str) {
        log::info!("connection {} left the chat", connection.id());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let hooks = ChatHooks {
        hub: tokio::sync::OnceCell::new(),
    };
    let hub = ServerHub::new(hooks, WebSocketConfig::default());
    // ChatHooks needs a handle to the hub it runs under, so it's wired in after construction
    // rather than threaded through `new`.
    let _ = hub.hooks().hub.set(hub.clone());

    let addr = hub.start("127.0.0.1:9002").await?;
    log::info!("chat server listening on ws://{addr}");

    tokio::signal::ctrl_c().await?;
    hub.stop().await;
    Ok(())
}
