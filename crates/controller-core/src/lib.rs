//! Controller hub core - lets phones act as gamepads for a shared game.
//!
//! This crate holds everything that does not touch a socket:
//! - The JSON wire protocol and its codec
//! - Per-controller sessions and their queued input
//! - The session registry (names, colors, capacity, broadcast)
//! - Per-tick input snapshots for the game loop
//! - Shared controller state (game state machine, menu actions)
//!
//! # Modules
//!
//! - [`protocol`]: Wire messages and enums, `decode`/`encode`
//! - [`session`]: Client sessions, input state and the [`Outbox`] seam
//! - [`registry`]: The session table every task shares behind one lock
//! - [`snapshot`]: What the game loop reads each tick
//! - [`broadcast`]: Game state transitions and menu action availability
//! - [`lobby`]: Which menu actions are offered and what they do
//! - [`view`]: A controller's picture of the shared state

pub mod broadcast;
pub mod lobby;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod view;

// Re-export commonly used types
pub use broadcast::{MenuActionSet, SharedControllerState, TransitionError};
pub use lobby::LobbyRules;
pub use protocol::{
    decode, encode, Button, CodecError, ConnectFailureReason, Direction, GameState, InputMode,
    MenuAction, MenuActionState, Message, PlayerColor, PlayerInfo, SessionId, UnknownColor,
};
pub use registry::{RegistryError, SessionRegistry};
pub use session::{ClientSession, DeliveryError, InputState, InputUpdate, Joystick, Outbox};
pub use snapshot::{InputSnapshot, MenuActionEvent, SessionInput};
pub use view::ControllerView;
