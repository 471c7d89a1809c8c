//! WebSocket Game Server
//!
//! Async WebSocket server in front of one [`GameTable`]. Handles
//! authentication and request routing, and relays the table's broadcast
//! event stream to every connection. Per-connection relay tasks read from
//! their own `broadcast::Receiver`, so a slow client lags and drops old
//! events instead of slowing the table loop or other clients.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::game::engine::GameTable;
use crate::game::ledger::OwnerId;
use crate::network::auth::{validate_token, AuthConfig, AuthError};
use crate::network::protocol::{
    AuthRequest, AuthResult, ClientMessage, ErrorCode, ServerError, ServerMessage,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Idle connection timeout.
    pub connection_timeout: Duration,
    /// Authentication settings.
    pub auth: AuthConfig,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().expect("valid literal addr"),
            max_connections: 1000,
            connection_timeout: Duration::from_secs(300),
            auth: AuthConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self {
            auth: AuthConfig::from_env(),
            ..Default::default()
        };
        if let Ok(bind) = std::env::var("CRASHPOINT_BIND") {
            match bind.parse() {
                Ok(addr) => config.bind_addr = addr,
                Err(err) => warn!(%bind, %err, "ignoring invalid CRASHPOINT_BIND"),
            }
        }
        config
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Connected client state.
struct ConnectedClient {
    /// Ledger owner (after auth).
    owner_id: Option<OwnerId>,
    /// Is authenticated.
    authenticated: bool,
    /// Connection time.
    #[allow(dead_code)]
    connected_at: Instant,
    /// Last activity.
    last_activity: Instant,
    /// Message sender (for direct messaging to client).
    sender: mpsc::Sender<ServerMessage>,
}

type ClientMap = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// The table this server fronts.
    table: Arc<GameTable>,
    /// Connected clients.
    clients: ClientMap,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server fronting `table`.
    pub fn new(config: ServerConfig, table: Arc<GameTable>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            table,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Run the server: the table loop, the accept loop, and the idle
    /// connection reaper.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Game server listening on {}", self.config.bind_addr);

        let table_handle = tokio::spawn(Arc::clone(&self.table).run());

        let cleanup_clients = self.clients.clone();
        let idle_timeout = self.config.connection_timeout;
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_clients, idle_timeout).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let client_count = self.clients.read().await.len();
                            if client_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
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

        self.table.shutdown();
        cleanup_handle.abort();
        let _ = table_handle.await;

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let table = self.table.clone();
        let config = self.config.clone();
        let mut events_rx = self.table.subscribe();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(
                    addr,
                    ConnectedClient {
                        owner_id: None,
                        authenticated: false,
                        connected_at: Instant::now(),
                        last_activity: Instant::now(),
                        sender: msg_tx.clone(),
                    },
                );
            }

            // Outbound task: direct replies interleaved with the table's
            // event stream.
            let sender_task = tokio::spawn(async move {
                loop {
                    let message = tokio::select! {
                        reply = msg_rx.recv() => match reply {
                            Some(msg) => msg,
                            None => break,
                        },
                        event = events_rx.recv() => match event {
                            Ok(event) => ServerMessage::Event(event),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                // Slow client: drop-oldest, keep going.
                                debug!("client {} lagged, skipped {} events", addr, skipped);
                                continue;
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        },
                    };
                    let text = match message.to_json() {
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

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error(ServerError {
                                            code: ErrorCode::InvalidInput,
                                            message: "Invalid message format".to_string(),
                                        })).await;
                                        continue;
                                    }
                                };

                                // Update activity
                                {
                                    let mut clients = clients.write().await;
                                    if let Some(client) = clients.get_mut(&addr) {
                                        client.last_activity = Instant::now();
                                    }
                                }

                                Self::handle_client_message(
                                    addr,
                                    client_msg,
                                    &clients,
                                    &table,
                                    &config,
                                    &msg_tx,
                                ).await;
                            }
                            Some(Ok(Message::Ping(_))) => {
                                let _ = msg_tx.send(ServerMessage::Pong {
                                    timestamp: 0,
                                    server_time: unix_millis(),
                                }).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            sender_task.abort();
            clients.write().await.remove(&addr);
            info!("Client {} cleaned up", addr);
        });
    }

    /// Handle a client message. Betting, cash-out, and balance queries
    /// require authentication; status, history, verification, and ping are
    /// public.
    async fn handle_client_message(
        addr: SocketAddr,
        msg: ClientMessage,
        clients: &ClientMap,
        table: &Arc<GameTable>,
        config: &ServerConfig,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::Auth(auth) => {
                Self::handle_auth(addr, auth, clients, config, sender).await;
            }
            ClientMessage::PlaceBet(req) => {
                let Some(owner) = Self::authenticated_owner(addr, clients, sender).await else {
                    return;
                };
                match table
                    .place_bet(owner, req.amount, req.currency, req.auto_cashout)
                    .await
                {
                    Ok(bet) => {
                        let _ = sender
                            .send(ServerMessage::BetAccepted {
                                bet_id: bet.id.to_string(),
                                round_id: bet.round_id,
                                amount: bet.amount,
                                currency: bet.currency,
                            })
                            .await;
                    }
                    Err(err) => {
                        let _ = sender.send(ServerMessage::Error((&err).into())).await;
                    }
                }
            }
            ClientMessage::Cashout => {
                let Some(owner) = Self::authenticated_owner(addr, clients, sender).await else {
                    return;
                };
                match table.cashout(owner).await {
                    Ok(receipt) => {
                        let _ = sender
                            .send(ServerMessage::CashoutResult {
                                bet_id: receipt.bet_id.to_string(),
                                multiplier: receipt.multiplier,
                                payout: receipt.payout,
                                currency: receipt.currency,
                            })
                            .await;
                    }
                    Err(err) => {
                        let _ = sender.send(ServerMessage::Error((&err).into())).await;
                    }
                }
            }
            ClientMessage::GetRoundStatus => {
                let status = table.status().await;
                let _ = sender.send(ServerMessage::RoundStatus(status)).await;
            }
            ClientMessage::GetHistory { limit } => {
                let limit = limit.unwrap_or(20).min(100);
                let rounds = table.history(limit).await;
                let _ = sender.send(ServerMessage::History { rounds }).await;
            }
            ClientMessage::GetBalance => {
                let Some(owner) = Self::authenticated_owner(addr, clients, sender).await else {
                    return;
                };
                let ton = table
                    .balance(owner, crate::game::ledger::Currency::Ton)
                    .await;
                let stars = table
                    .balance(owner, crate::game::ledger::Currency::Stars)
                    .await;
                let _ = sender.send(ServerMessage::Balance { ton, stars }).await;
            }
            ClientMessage::Verify(req) => {
                let outcome = table
                    .verify(
                        &req.server_seed_hash,
                        &req.server_seed,
                        &req.client_seed,
                        req.round_id,
                        req.claimed_multiplier,
                    )
                    .await;
                let _ = sender
                    .send(ServerMessage::VerifyResult {
                        valid: outcome.valid,
                        computed_multiplier: outcome.computed_multiplier,
                    })
                    .await;
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender
                    .send(ServerMessage::Pong {
                        timestamp,
                        server_time: unix_millis(),
                    })
                    .await;
            }
        }
    }

    /// Handle authentication.
    async fn handle_auth(
        addr: SocketAddr,
        auth: AuthRequest,
        clients: &ClientMap,
        config: &ServerConfig,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match validate_token(&auth.token, &config.auth) {
            Ok(claims) => {
                let owner = claims.owner_id();
                {
                    let mut clients = clients.write().await;
                    if let Some(client) = clients.get_mut(&addr) {
                        client.owner_id = Some(owner);
                        client.authenticated = true;
                    }
                }
                let _ = sender
                    .send(ServerMessage::AuthResult(AuthResult {
                        success: true,
                        owner_id: Some(owner.0),
                        error: None,
                        server_version: config.version.clone(),
                    }))
                    .await;
                debug!("Client {} authenticated as owner {}", addr, owner.0);
            }
            Err(err) => {
                let code = match err {
                    AuthError::Expired => ErrorCode::TokenExpired,
                    AuthError::InvalidSignature | AuthError::InvalidFormat => {
                        ErrorCode::InvalidToken
                    }
                    _ => ErrorCode::AuthFailed,
                };
                let _ = sender
                    .send(ServerMessage::AuthResult(AuthResult {
                        success: false,
                        owner_id: None,
                        error: Some(err.to_string()),
                        server_version: config.version.clone(),
                    }))
                    .await;
                let _ = sender
                    .send(ServerMessage::Error(ServerError {
                        code,
                        message: err.to_string(),
                    }))
                    .await;
                debug!("Client {} auth failed: {}", addr, err);
            }
        }
    }

    /// The caller's owner id, or an error to the client if unauthenticated.
    async fn authenticated_owner(
        addr: SocketAddr,
        clients: &ClientMap,
        sender: &mpsc::Sender<ServerMessage>,
    ) -> Option<OwnerId> {
        let owner = {
            let clients = clients.read().await;
            clients
                .get(&addr)
                .filter(|c| c.authenticated)
                .and_then(|c| c.owner_id)
        };
        if owner.is_none() {
            let _ = sender
                .send(ServerMessage::Error(ServerError {
                    code: ErrorCode::NotAuthenticated,
                    message: "Must authenticate first".to_string(),
                }))
                .await;
        }
        owner
    }

    /// Reap idle connections.
    async fn run_cleanup_loop(clients: ClientMap, idle_timeout: Duration) {
        let mut interval = interval(Duration::from_secs(60));

        loop {
            interval.tick().await;

            let now = Instant::now();
            let to_remove: Vec<_> = {
                let clients = clients.read().await;
                clients
                    .iter()
                    .filter(|(_, c)| now.duration_since(c.last_activity) > idle_timeout)
                    .map(|(addr, _)| *addr)
                    .collect()
            };

            for addr in to_remove {
                let mut clients = clients.write().await;
                if let Some(client) = clients.remove(&addr) {
                    let _ = client
                        .sender
                        .send(ServerMessage::Shutdown {
                            reason: "Idle timeout".to_string(),
                        })
                        .await;
                    info!("Removed idle client {}", addr);
                }
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::EngineConfig;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.connection_timeout, Duration::from_secs(300));
        assert!(!config.auth.is_configured());
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let table = Arc::new(GameTable::new(EngineConfig::default()));
        let server = GameServer::new(config, table);

        assert_eq!(server.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let table = Arc::new(GameTable::new(EngineConfig::default()));
        let server = GameServer::new(config, table);
        server.shutdown();
        // Should not panic
    }
}
