//! What a controller displays, rebuilt from the messages the hub sends it.
//!
//! Every server message is an absolute statement, so applying one twice is
//! the same as applying it once.

use crate::protocol::{
    Button, ConnectFailureReason, GameState, InputMode, MenuAction, Message, PlayerColor,
    PlayerInfo, SessionId,
};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerView {
    pub id: Option<SessionId>,
    pub color: Option<PlayerColor>,
    pub game_state: GameState,
    pub menu_actions: BTreeSet<MenuAction>,
    pub enabled_buttons: BTreeSet<Button>,
    /// Enabled buttons that are still cooling down
    pub cooldown_buttons: BTreeSet<Button>,
    pub input_mode: InputMode,
    pub player_info: Option<PlayerInfo>,
    pub vibration: Option<Vec<u32>>,
    pub failure: Option<ConnectFailureReason>,
}

impl ControllerView {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handshake has been accepted.
    pub fn is_ready(&self) -> bool {
        self.id.is_some() && self.failure.is_none()
    }

    /// Human-readable reason the hub refused this controller.
    pub fn failure_text(&self) -> Option<String> {
        self.failure.map(|reason| reason.to_string())
    }

    pub fn apply(&mut self, message: &Message) {
        match message {
            Message::NameOk { id } => self.id = Some(*id),
            Message::SetColor { color } => self.color = Some(*color),
            Message::ConnectFailure { reason } => self.failure = Some(*reason),
            Message::GameState { state } => self.game_state = *state,
            Message::SetMenuActions { actions } => {
                for state in actions {
                    if state.enabled {
                        self.menu_actions.insert(state.action);
                    } else {
                        self.menu_actions.remove(&state.action);
                    }
                }
            }
            Message::SetEnabledButtons { buttons } => {
                self.enabled_buttons = buttons.iter().copied().collect();
            }
            Message::SetCooldownButtons { cooldown_buttons } => {
                self.cooldown_buttons = cooldown_buttons.iter().copied().collect();
            }
            Message::SetInputMode { input_mode } => self.input_mode = *input_mode,
            Message::VibrationSequence { pattern } => self.vibration = Some(pattern.clone()),
            Message::PlayerInfo {
                health_points,
                gold,
            } => {
                self.player_info = Some(PlayerInfo {
                    health_points: *health_points,
                    gold: *gold,
                })
            }
            // Controller-to-hub traffic does not change the view
            Message::Connect { .. }
            | Message::Button { .. }
            | Message::Joystick { .. }
            | Message::MenuAction { .. } => {}
        }
    }
}
