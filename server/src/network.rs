//! Server network layer handling WebSocket connections and the session reaper

use crate::client_manager::{ClientManager, ConnectionHandle, ConnectionId, Outbound};
use crate::config::ServerConfig;
use crate::dispatcher::{self, Inbound};
use crate::error::ServerError;
use crate::registry::SessionRegistry;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode, encode, ClientMessage, ErrorKind, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

/// Frames buffered between a connection's reader and its dispatcher
const INBOUND_BUFFER: usize = 32;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// Accepts WebSocket connections and hands each one to a dispatcher task
pub struct Server {
    listener: TcpListener,
    clients: Arc<RwLock<ClientManager>>,
    registry: Arc<SessionRegistry>,
    config: ServerConfig,
}

impl Server {
    /// Validates the configuration and binds the listening socket
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_connections))),
            registry: Arc::new(SessionRegistry::new(config.policy)),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Spawns task that periodically abandons and retires stale sessions
    fn spawn_reaper(&self) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let period = self.config.reap_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                let retired = registry.reap(Instant::now()).await;
                if !retired.is_empty() {
                    debug!("Retired {} session(s): {:?}", retired.len(), retired);
                }
            }
        })
    }

    /// Main accept loop. Runs until the task is dropped.
    pub async fn run(self) -> Result<(), ServerError> {
        let _reaper = self.spawn_reaper();
        info!("Server started successfully");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let clients = Arc::clone(&self.clients);
                    let registry = Arc::clone(&self.registry);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, clients, registry).await {
                            warn!("Connection from {} failed: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Runs one connection from handshake to cleanup
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    clients: Arc<RwLock<ClientManager>>,
    registry: Arc<SessionRegistry>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream).await?;
    let (mut sink, source) = ws_stream.split();

    let id = {
        let mut clients = clients.write().await;
        clients.add_connection(addr)
    };
    let Some(id) = id else {
        warn!("Rejecting connection from {}: server full", addr);
        let frame = encode(&ServerMessage::Error {
            kind: ErrorKind::ServerFull,
            message: "server is full".to_string(),
        })?;
        sink.send(Message::Binary(frame)).await?;
        sink.close().await?;
        return Ok(());
    };

    let (handle, outbound) = ConnectionHandle::new(id);
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
    let closer = handle.clone();

    let writer = tokio::spawn(write_outbound(sink, outbound, id));
    let reader = tokio::spawn(read_inbound(source, inbound_tx, id));

    dispatcher::run(registry, handle, inbound_rx).await;

    // Flush whatever the sessions queued, then close our side
    closer.close();
    drop(closer);
    if let Err(e) = writer.await {
        error!("Writer task for connection {} panicked: {}", id, e);
    }
    reader.abort();

    let mut clients = clients.write().await;
    clients.remove_connection(&id);
    Ok(())
}

/// Decodes frames into the dispatcher's inbound channel
async fn read_inbound(mut source: WsSource, inbound: mpsc::Sender<Inbound>, id: ConnectionId) {
    while let Some(frame) = source.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Read error on connection {}: {}", id, e);
                break;
            }
        };

        let item = match frame {
            Message::Binary(bytes) => match decode::<ClientMessage>(&bytes) {
                Ok(message) => Inbound::Message(message),
                Err(e) => Inbound::Malformed(e.to_string()),
            },
            Message::Text(_) => Inbound::Malformed("text frames are not supported".to_string()),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };

        if inbound.send(item).await.is_err() {
            break;
        }
    }
    debug!("Reader for connection {} finished", id);
}

/// Drains the outbound queue onto the socket in order
async fn write_outbound(
    mut sink: WsSink,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    id: ConnectionId,
) {
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Message(message) => {
                let frame = match encode(&message) {
                    Ok(frame) => frame,
                    Err(e) => {
                        error!("Failed to encode message for connection {}: {}", id, e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Binary(frame)).await {
                    debug!("Write error on connection {}: {}", id, e);
                    break;
                }
            }
            Outbound::Close => {
                if let Err(e) = sink.close().await {
                    debug!("Error closing connection {}: {}", id, e);
                }
                break;
            }
        }
    }
}
