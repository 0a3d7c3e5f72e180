//! Per-tick view of all controller input.

use crate::protocol::{Button, MenuAction, PlayerColor, SessionId};
use crate::session::{InputState, Joystick};

/// Input of one session at snapshot time.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInput {
    pub id: SessionId,
    pub name: String,
    pub color: PlayerColor,
    pub input: InputState,
}

impl SessionInput {
    pub fn is_pressed(&self, button: Button) -> bool {
        self.input.is_pressed(button)
    }

    pub fn joystick(&self) -> Joystick {
        self.input.joystick
    }
}

/// A menu action selected on a controller since the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuActionEvent {
    pub session: SessionId,
    pub action: MenuAction,
}

/// Copy of every connected session's input, taken once per game tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    pub tick: u64,
    /// Sessions in join order
    pub sessions: Vec<SessionInput>,
    /// Menu actions in arrival order
    pub menu_actions: Vec<MenuActionEvent>,
}

impl InputSnapshot {
    pub fn get(&self, id: SessionId) -> Option<&SessionInput> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&SessionInput> {
        self.sessions.iter().find(|s| s.name == name)
    }

    pub fn player_count(&self) -> usize {
        self.sessions.len()
    }
}
