//! The listener loop and connection registry.
//!
//! `ServerHub<H>` owns a `TcpListener`-backed accept loop (one spawned task) and a registry of
//! live connections (a `RwLock<HashMap>`, read-heavy under broadcast, write-heavy only on
//! connect/disconnect). It's generic over `H: ServerHooks` rather than boxing a `dyn
//! ServerHooks`, so the whole ingress path monomorphizes per hook type.

use crate::config::WebSocketConfig;
use crate::connection::{self, Connection, ConnectionId, Registry};
use crate::error::Error;
use crate::frame::CloseCode;
use crate::hooks::ServerHooks;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub struct ServerHub<H: ServerHooks> {
    registry: Registry,
    hooks: Arc<H>,
    config: WebSocketConfig,
    listener_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    stopped: Arc<AtomicBool>,
}

impl<H: ServerHooks> ServerHub<H> {
    pub fn new(hooks: H, config: WebSocketConfig) -> Arc<Self> {
        Arc::new(ServerHub {
            registry: Arc::new(RwLock::new(HashMap::new())),
            hooks: Arc::new(hooks),
            config,
            listener_task: tokio::sync::Mutex::new(None),
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Binds `addr` and spawns the accept loop, returning the address actually bound (useful
    /// when `addr` asks for an ephemeral port). Each accepted connection gets its own task
    /// running the handshake followed by [`connection::ingress_loop`].
    pub async fn start(self: &Arc<Self>, addr: &str) -> Result<std::net::SocketAddr, Error> {
        let listener = TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?;
        info!("listening on {bound}");

        let registry = self.registry.clone();
        let hooks = self.hooks.clone();
        let config = self.config.clone();
        let stopped = self.stopped.clone();

        let task = tokio::spawn(async move {
            loop {
                if stopped.load(Ordering::Acquire) {
                    break;
                }
                let (stream, peer) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!("accept failed: {err}");
                        continue;
                    }
                };

                let registry = registry.clone();
                let hooks = hooks.clone();
                let config = config.clone();

                tokio::spawn(async move {
                    match connection::perform_handshake(stream, &config, &hooks).await {
                        Ok((conn, input)) => {
                            debug!("handshake complete for {peer} ({})", conn.id());
                            registry.write().await.insert(conn.id(), conn.clone());
                            let id = conn.id();
                            connection::ingress_loop(conn, input, config, hooks).await;
                            registry.write().await.remove(&id);
                            debug!("connection {id} removed from registry");
                        }
                        Err(err) => {
                            debug!("handshake with {peer} failed: {err}");
                        }
                    }
                });
            }
        });

        *self.listener_task.lock().await = Some(task);
        Ok(bound)
    }

    /// Stops accepting new connections. Idempotent: a second call is a no-op. Already-open
    /// connections finish their own ingress loops independently; this doesn't close them.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.listener_task.lock().await.take() {
            task.abort();
        }
        info!("hub stopped accepting new connections");
    }

    /// Access to the hooks implementation this hub was built with — useful when a hook needs
    /// a handle back to the hub itself (e.g. to broadcast), which can't be threaded through
    /// `new` since the hub doesn't exist yet while the hooks value is being constructed.
    pub fn hooks(&self) -> &Arc<H> {
        &self.hooks
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn connection(&self, id: ConnectionId) -> Option<Connection> {
        self.registry.read().await.get(&id).cloned()
    }

    /// Sends `text` to every registered connection for which `predicate` returns `true` (or to
    /// all of them, if `predicate` is `None`). Per-connection send failures are logged and
    /// skipped rather than aborting the broadcast. Returns the number of successful sends.
    pub async fn broadcast_text(
        &self,
        text: &str,
        predicate: Option<&(dyn Fn(&Connection) -> bool + Send + Sync)>,
    ) -> usize {
        self.broadcast(predicate, |conn| {
            let text = text.to_string();
            async move { conn.send_text(&text).await }
        })
        .await
    }

    pub async fn broadcast_binary(
        &self,
        data: &[u8],
        predicate: Option<&(dyn Fn(&Connection) -> bool + Send + Sync)>,
    ) -> usize {
        let data = data.to_vec();
        self.broadcast(predicate, |conn| {
            let data = data.clone();
            async move { conn.send_binary(&data).await }
        })
        .await
    }

    pub async fn ping_all(
        &self,
        predicate: Option<&(dyn Fn(&Connection) -> bool + Send + Sync)>,
    ) -> usize {
        self.broadcast(predicate, |conn| async move { conn.send_ping(&[]).await })
            .await
    }

    pub async fn close_all(&self, code: CloseCode, reason: &str) -> usize {
        let reason = reason.to_string();
        self.broadcast(None, |conn| {
            let reason = reason.clone();
            async move { conn.close(code, &reason).await }
        })
        .await
    }

    async fn broadcast<F, Fut>(
        &self,
        predicate: Option<&(dyn Fn(&Connection) -> bool + Send + Sync)>,
        action: F,
    ) -> usize
    where
        F: Fn(Connection) -> Fut,
        Fut: std::future::Future<Output = Result<(), Error>>,
    {
        let snapshot: Vec<Connection> = self.registry.read().await.values().cloned().collect();
        let mut sent = 0usize;
        let mut failed = 0usize;
        for conn in snapshot {
            if let Some(predicate) = predicate {
                if !predicate(&conn) {
                    continue;
                }
            }
            match action(conn).await {
                Ok(()) => sent += 1,
                Err(_) => failed += 1,
            }
        }
        if failed > 0 {
            debug!("broadcast: {sent} sent, {failed} failed");
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopHooks;

    #[tokio::test]
    async fn new_hub_has_no_connections() {
        let hub = ServerHub::new(NoopHooks, WebSocketConfig::default());
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn stop_without_start_is_a_harmless_no_op() {
        let hub = ServerHub::new(NoopHooks, WebSocketConfig::default());
        hub.stop().await;
        hub.stop().await;
    }
}
