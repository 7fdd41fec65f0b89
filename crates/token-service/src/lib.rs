//! Token Service
//!
//! An OAuth 2.0 authorization front that puts a two-step login in front of the
//! authorize endpoint. The browser names a user at `/login`, proves control of
//! that user by echoing a one-time confirmation code to `/auth`, and only then
//! is its parked authorize request handed to the authorization core.
//!
//! # Features
//!
//! - **Session-bound handshake**: every step is tied to an opaque session cookie
//! - **One-time codes**: single use, short lived, with an attempt limit
//! - **Pluggable stores**: [`session::SessionStore`] and [`core::AuthorizationCore`] are traits
//! - **Bundled core**: in-memory authorization code, refresh and client credentials grants
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use token_service::{Config, MemoryCore, MemorySessionStore, TokenServer, server::transport::HttpState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let sessions = Arc::new(MemorySessionStore::new(config.session_ttl));
//!     let core = Arc::new(MemoryCore::from_config(&config).await);
//!
//!     TokenServer::new(HttpState::new(config, sessions, core)).run_http().await
//! }
//! ```

pub mod config;
pub mod confirm;
pub mod core;
pub mod error;
pub mod server;
pub mod session;

pub use config::Config;
pub use crate::core::MemoryCore;
pub use error::{CoreError, HandshakeError, StoreError};
pub use server::TokenServer;
pub use session::MemorySessionStore;
