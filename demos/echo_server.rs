//! Echoes every text and binary message back to its sender.
//!
//! Run with `cargo run --example echo_server`, then connect with any WebSocket client to
//! `ws://127.0.0.1:9001`.

use wshub::{Connection, Message, ServerHooks, ServerHub, WebSocketConfig};

struct EchoHooks;

impl ServerHooks for EchoHooks {
    async fn on_text(&self, connection: &Connection, message: &Message) {
        if let Ok(text) = message.as_text() {
            let _ = connection.send_text(text).await;
        }
    }

    async fn on_binary(&self, connection: &Connection, message: &Message) {
        let _ = connection.send_binary(&message.as_binary()).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let hub = ServerHub::new(EchoHooks, WebSocketConfig::default());
    let addr = hub.start("127.0.0.1:9001").await?;
    log::info!("echo server listening on ws://{addr}");

    tokio::signal::ctrl_c().await?;
    hub.stop().await;
    Ok(())
}
