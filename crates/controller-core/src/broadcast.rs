//! State shared by every controller: the game state and which menu actions
//! are currently offered.
//!
//! Both are only ever sent as absolute values, so a controller that sees
//! the same update twice ends up in the same place.

use crate::protocol::{GameState, MenuAction, MenuActionState, Message};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: GameState,
    pub to: GameState,
}

impl GameState {
    /// Menu -> Started <-> Paused, and back to Menu when a game ends.
    pub fn can_transition_to(self, next: GameState) -> bool {
        matches!(
            (self, next),
            (GameState::Menu, GameState::Started)
                | (GameState::Started, GameState::Paused)
                | (GameState::Paused, GameState::Started)
                | (GameState::Started, GameState::Menu)
                | (GameState::Paused, GameState::Menu)
        )
    }
}

/// The set of enabled menu actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuActionSet {
    enabled: BTreeSet<MenuAction>,
}

impl Default for MenuActionSet {
    fn default() -> Self {
        Self {
            enabled: [MenuAction::PauseGame, MenuAction::ShowMap]
                .into_iter()
                .collect(),
        }
    }
}

impl MenuActionSet {
    pub fn is_enabled(&self, action: MenuAction) -> bool {
        self.enabled.contains(&action)
    }

    /// Apply `(action, enabled)` pairs. Returns whether anything changed.
    pub fn apply(&mut self, pairs: &[(MenuAction, bool)]) -> bool {
        let mut changed = false;
        for &(action, enabled) in pairs {
            changed |= if enabled {
                self.enabled.insert(action)
            } else {
                self.enabled.remove(&action)
            };
        }
        changed
    }

    /// Availability of every menu action.
    pub fn states(&self) -> Vec<MenuActionState> {
        MenuAction::ALL
            .iter()
            .map(|&action| MenuActionState {
                action,
                enabled: self.is_enabled(action),
            })
            .collect()
    }

    pub fn to_message(&self) -> Message {
        Message::SetMenuActions {
            actions: self.states(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedControllerState {
    game_state: GameState,
    menu_actions: MenuActionSet,
}

impl SharedControllerState {
    pub fn game_state(&self) -> GameState {
        self.game_state
    }

    pub fn menu_actions(&self) -> &MenuActionSet {
        &self.menu_actions
    }

    /// Move to `next`. Returns `Ok(false)` when already there.
    pub fn transition(&mut self, next: GameState) -> Result<bool, TransitionError> {
        if next == self.game_state {
            return Ok(false);
        }
        if !self.game_state.can_transition_to(next) {
            return Err(TransitionError {
                from: self.game_state,
                to: next,
            });
        }
        self.game_state = next;
        Ok(true)
    }

    pub fn set_menu_actions(&mut self, pairs: &[(MenuAction, bool)]) -> bool {
        self.menu_actions.apply(pairs)
    }

    /// Messages that bring a freshly joined controller up to date.
    pub fn sync_messages(&self) -> [Message; 2] {
        [
            Message::GameState {
                state: self.game_state,
            },
            self.menu_actions.to_message(),
        ]
    }
}
