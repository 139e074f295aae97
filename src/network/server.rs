//! WebSocket Game Server
//!
//! Accepts WebSocket connections, gives each one a player id, and routes
//! its messages into the lobby. Rooms tick on their own tasks; this module
//! only moves frames in and out.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::config::AppConfig;
use crate::game::room::RoomId;
use crate::game::state::PlayerId;
use crate::network::lobby::{Lobby, LobbyError};
use crate::network::protocol::{ClientFrame, ClientMessage, ErrorCode, ServerMessage};

/// Outbound queue depth per connection.
const OUTBOUND_QUEUE: usize = 64;

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection limit reached.
    #[error("Connection limit reached ({0})")]
    ConnectionLimitReached(usize),
}

/// Connected client state.
struct ConnectedClient {
    /// Player identifier, assigned on connect.
    player_id: PlayerId,
    /// Room the player is seated in.
    room_id: Option<RoomId>,
    /// Forwarder for monitor subscriptions.
    monitor_task: Option<JoinHandle<()>>,
    /// Connection time.
    connected_at: DateTime<Utc>,
}

type ClientTable = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// State shared by every connection task.
#[derive(Clone)]
struct ServerContext {
    lobby: Arc<Lobby>,
    clients: ClientTable,
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: AppConfig,
    /// Room table.
    lobby: Arc<Lobby>,
    /// Connected clients.
    clients: ClientTable,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: AppConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let lobby = Arc::new(Lobby::new(config.game.clone()));

        Self {
            config,
            lobby,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self), fields(addr = %self.config.server.bind_addr))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(self.config.server.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if let Err(e) = self.admit().await {
                                warn!("{}, rejecting {}", e, addr);
                                tokio::spawn(reject_connection(stream, addr));
                                continue;
                            }
                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Check the connection limit.
    async fn admit(&self) -> Result<(), GameServerError> {
        let limit = self.config.server.max_connections;
        if self.clients.read().await.len() >= limit {
            return Err(GameServerError::ConnectionLimitReached(limit));
        }
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let ctx = ServerContext {
            lobby: self.lobby.clone(),
            clients: self.clients.clone(),
        };
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            if let Err(e) = Self::serve_connection(stream, addr, &ctx, shutdown_rx).await {
                error!("Connection {} failed: {}", addr, e);
            }
            Self::cleanup(addr, &ctx).await;
        });
    }

    async fn serve_connection(
        stream: TcpStream,
        addr: SocketAddr,
        ctx: &ServerContext,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), GameServerError> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE);

        let player_id = PlayerId::generate();
        ctx.clients.write().await.insert(addr, ConnectedClient {
            player_id: player_id.clone(),
            room_id: None,
            monitor_task: None,
            connected_at: Utc::now(),
        });
        debug!("Client {} assigned player id {}", addr, player_id);

        // Spawn message sender task
        let sender_task = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                let text = match msg.to_json() {
                    Ok(t) => t,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        });

        let result = loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match ClientFrame::decode(&text) {
                                ClientFrame::Message(client_msg) => {
                                    Self::handle_client_message(addr, &player_id, client_msg, ctx, &msg_tx).await;
                                }
                                ClientFrame::DroppedAction(e) => {
                                    debug!("Dropping invalid action from {}: {}", addr, e);
                                }
                                ClientFrame::Malformed(e) => {
                                    debug!("Invalid message from {}: {}", addr, e);
                                    let _ = msg_tx.try_send(ServerMessage::error(
                                        ErrorCode::InvalidMessage,
                                        "Invalid message format",
                                    ));
                                }
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            debug!("Ignoring binary frame from {}", addr);
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Client {} disconnected", addr);
                            break Ok(());
                        }
                        Some(Err(e)) => break Err(e.into()),
                        _ => {}
                    }
                }
                _ = shutdown_rx.recv() => {
                    let _ = msg_tx.try_send(ServerMessage::Shutdown {
                        reason: "Server shutting down".to_string(),
                    });
                    break Ok(());
                }
            }
        };

        sender_task.abort();
        result
    }

    /// Handle a client message.
    async fn handle_client_message(
        addr: SocketAddr,
        player_id: &PlayerId,
        msg: ClientMessage,
        ctx: &ServerContext,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::JoinGame { player_name } => {
                Self::handle_join(addr, player_id, player_name, ctx, sender).await;
            }
            ClientMessage::PlayerAction { action } => {
                let timestamp = Utc::now().timestamp_millis().max(0) as u64;
                ctx.lobby.route_action(player_id, action, timestamp).await;
            }
            ClientMessage::MonitorMode { is_monitor } => {
                Self::handle_monitor(addr, is_monitor, ctx, sender).await;
            }
            ClientMessage::Leave => {
                Self::handle_leave(addr, player_id, ctx, sender).await;
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.try_send(ServerMessage::Pong {
                    timestamp,
                    server_time: Utc::now().timestamp_millis().max(0) as u64,
                });
            }
        }
    }

    /// Seat the player in a room.
    async fn handle_join(
        addr: SocketAddr,
        player_id: &PlayerId,
        player_name: Option<String>,
        ctx: &ServerContext,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let name = player_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_player_name(player_id));

        match ctx.lobby.join(player_id.clone(), name, sender.clone()).await {
            Ok(outcome) => {
                info!(
                    "Player {} ({}) joined {} from {}",
                    outcome.player.name, player_id, outcome.session.id, addr
                );
                if let Some(client) = ctx.clients.write().await.get_mut(&addr) {
                    client.room_id = Some(outcome.session.id.clone());
                }
            }
            Err(LobbyError::AlreadyInRoom(_)) => {
                debug!("Duplicate join from {}", addr);
                let _ = sender.try_send(ServerMessage::error(
                    ErrorCode::AlreadyInRoom,
                    "Already in a room",
                ));
            }
            Err(e) => {
                debug!("Join refused for {}: {}", addr, e);
                let _ = sender.try_send(ServerMessage::JoinError { message: e.to_string() });
            }
        }
    }

    /// Subscribe to (or stop) the monitor feed.
    async fn handle_monitor(
        addr: SocketAddr,
        is_monitor: bool,
        ctx: &ServerContext,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let mut clients = ctx.clients.write().await;
        let Some(client) = clients.get_mut(&addr) else {
            return;
        };
        if let Some(task) = client.monitor_task.take() {
            task.abort();
        }
        if !is_monitor {
            debug!("Client {} left monitor mode", addr);
            return;
        }

        client.monitor_task = Some(spawn_monitor_forwarder(
            ctx.lobby.subscribe_monitor(),
            sender.clone(),
        ));
        drop(clients);

        let tile_size = ctx.lobby.config().tile_size;
        let reply = match ctx.lobby.first_room().await {
            Some(session) => ServerMessage::MonitorConnected {
                success: true,
                room_id: session.id.clone(),
                game_state: Some(session.snapshot().await),
                message: "Monitoring active game".to_string(),
                tile_size,
            },
            None => ServerMessage::MonitorConnected {
                success: true,
                room_id: "waiting".to_string(),
                game_state: None,
                message: "No active games yet".to_string(),
                tile_size,
            },
        };
        let _ = sender.try_send(reply);
        info!("Client {} is monitoring", addr);
    }

    /// Leave the current room.
    async fn handle_leave(
        addr: SocketAddr,
        player_id: &PlayerId,
        ctx: &ServerContext,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        if !ctx.lobby.leave(player_id).await {
            let _ = sender.try_send(ServerMessage::error(ErrorCode::NotInRoom, "Not in a room"));
            return;
        }
        if let Some(client) = ctx.clients.write().await.get_mut(&addr) {
            client.room_id = None;
        }
    }

    /// Drop a closed connection's client entry and room seat.
    async fn cleanup(addr: SocketAddr, ctx: &ServerContext) {
        let Some(client) = ctx.clients.write().await.remove(&addr) else {
            return;
        };
        if let Some(task) = client.monitor_task {
            task.abort();
        }
        if client.room_id.is_some() {
            ctx.lobby.leave(&client.player_id).await;
        }

        let connected_secs = (Utc::now() - client.connected_at).num_seconds();
        info!("Client {} cleaned up after {}s", addr, connected_secs);
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Room table.
    pub fn lobby(&self) -> &Arc<Lobby> {
        &self.lobby
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get live room count.
    pub async fn room_count(&self) -> usize {
        self.lobby.room_count().await
    }
}

/// `Player_` plus the first five characters of the id.
fn default_player_name(player_id: &PlayerId) -> String {
    let prefix: String = player_id.as_str().chars().take(5).collect();
    format!("Player_{}", prefix)
}

/// Forward monitor broadcasts to one connection until either side closes.
fn spawn_monitor_forwarder(
    mut feed: broadcast::Receiver<ServerMessage>,
    sender: mpsc::Sender<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(msg) => {
                    if sender.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Monitor lagged, skipped {} messages", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Tell an over-limit client why it is being turned away.
async fn reject_connection(stream: TcpStream, addr: SocketAddr) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("Handshake failed for rejected client {}: {}", addr, e);
            return;
        }
    };
    let msg = ServerMessage::error(ErrorCode::ServerOverloaded, "Server is full");
    if let Ok(text) = msg.to_json() {
        let _ = ws.send(Message::Text(text)).await;
    }
    let _ = ws.close(None).await;
}
