//! Network Layer
//!
//! WebSocket server for real-time client communication.
//! This layer is **non-deterministic** - all round logic runs through `game/`.

pub mod auth;
pub mod protocol;
pub mod server;

pub use auth::{validate_token, AuthConfig, AuthError, TokenClaims};
pub use protocol::{
    AuthRequest, BetRequest, ClientMessage, ErrorCode, ServerError, ServerMessage, VerifyRequest,
};
pub use server::{GameServer, GameServerError, ServerConfig};
