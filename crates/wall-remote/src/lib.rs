//! wall-remote library crate.
//!
//! An async client for the wall display's WebSocket control server.  It keeps
//! one connection open, reconnects when it drops, queues what is sent while
//! it is down, and matches every reply to the request that caused it.  It
//! also drives the gamepad poller that feeds the wall's emulator.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! CLI / embedding application
//!         ↕
//! [wall-remote]
//!   ├── domain/             RemoteConfig, TOML config file, endpoint derivation
//!   ├── application/        JoypadBridge: input edges → `emulator input`
//!   └── infrastructure/
//!         ├── transport/           WebSocket connector (tokio-tungstenite)
//!         ├── connection_manager/  actor owning wall_core::Multiplexer
//!         └── frame_loop/          per-frame driver for wall_core::InputPoller
//!         ↕
//! Wall control server  (JSON text frames over WebSocket)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no async code and no sockets.
//! - `application` depends on `domain` and `wall-core` only.
//! - `infrastructure` depends on all other layers plus `tokio` and
//!   `tokio-tungstenite`.
//!
//! # For beginners: where is the logic?
//!
//! Almost all decisions (which id a message gets, whether it is sent now or
//! queued, which callback a reply belongs to, when to reconnect) are made by
//! plain structs in `wall-core`.  The tasks in this crate only feed them
//! events and carry out what they return.  That is why most behaviour can be
//! tested without a network or even a runtime.
//!
//! # Example
//!
//! ```rust,no_run
//! use wall_core::Command;
//! use wall_remote::domain::RemoteConfig;
//! use wall_remote::infrastructure::{ConnectionManager, WsConnector};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let remote = ConnectionManager::open(&RemoteConfig::default(), WsConnector::default())?;
//! let reply = remote.request(Command::ShaderList.into_message()?).await?;
//! println!("{}", reply.into_value());
//! remote.dispose().await;
//! # Ok(())
//! # }
//! ```

/// Domain layer: configuration types (no async I/O).
pub mod domain;

/// Application layer: input-to-command translation.
pub mod application;

/// Infrastructure layer: WebSocket transport, connection actor, frame loop.
pub mod infrastructure;
