//! Which menu actions the game offers, and what selecting them does.

use crate::protocol::{GameState, MenuAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobbyRules {
    /// Players required before `StartGame` is offered
    pub min_players: usize,
}

impl Default for LobbyRules {
    fn default() -> Self {
        Self { min_players: 2 }
    }
}

impl LobbyRules {
    pub fn new(min_players: usize) -> Self {
        Self { min_players }
    }

    /// Absolute availability of the state-driving actions.
    pub fn availability(&self, state: GameState, players: usize) -> [(MenuAction, bool); 4] {
        [
            (
                MenuAction::StartGame,
                state == GameState::Menu && players >= self.min_players,
            ),
            (MenuAction::PauseGame, state == GameState::Started),
            (MenuAction::ResumeGame, state == GameState::Paused),
            (MenuAction::QuitGame, state == GameState::Paused),
        ]
    }

    /// The state a selected action leads to, if it is currently offered.
    pub fn resolve(
        &self,
        action: MenuAction,
        state: GameState,
        players: usize,
    ) -> Option<GameState> {
        let offered = self
            .availability(state, players)
            .iter()
            .any(|&(a, enabled)| a == action && enabled);
        if !offered {
            return None;
        }

        match action {
            MenuAction::StartGame | MenuAction::ResumeGame => Some(GameState::Started),
            MenuAction::PauseGame => Some(GameState::Paused),
            MenuAction::QuitGame => Some(GameState::Menu),
            _ => None,
        }
    }
}
