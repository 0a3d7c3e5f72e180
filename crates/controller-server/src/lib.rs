//! # Controller Hub Server
//!
//! Hosts the WebSocket endpoint phones connect to when they act as
//! gamepads. Each connection gets its own task; all of them share one
//! [`Hub`], which wraps the session registry in a single lock. A fixed-rate
//! game loop reads input snapshots from the hub and pushes game state and
//! menu action changes back out to every controller.
//!
//! ## Modules
//!
//! - [`config`]: Environment-driven settings (port, capacity, colors, ticks)
//! - [`hub`]: The locked registry handle and per-connection outboxes
//! - [`server`]: Listener, upgrade path check, handshake and read loop
//! - [`game_loop`]: Tick-driven consumer of input snapshots

pub mod config;
pub mod game_loop;
pub mod hub;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use hub::{ClientOutbox, Hub, OUTBOX_CAPACITY};
pub use server::{bind, run_server, serve};
