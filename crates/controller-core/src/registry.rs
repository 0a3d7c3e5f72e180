//! The authoritative table of connected controllers.
//!
//! The registry is plain data: callers that share it between tasks wrap it
//! in a single lock so that joins, leaves, broadcasts and snapshots are
//! serialized. Nothing in here blocks on I/O.

use crate::broadcast::{MenuActionSet, SharedControllerState, TransitionError};
use crate::protocol::{
    ConnectFailureReason, GameState, MenuAction, Message, PlayerColor, SessionId,
};
use crate::session::{ClientSession, InputUpdate, Joystick, Outbox};
use crate::snapshot::{InputSnapshot, MenuActionEvent, SessionInput};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("No session with id {0}")]
    UnknownSession(SessionId),

    #[error("Session {id} sent a {kind} message, which controllers may not send")]
    UnexpectedMessage { id: SessionId, kind: &'static str },

    #[error("Could not deliver to session {0}, it has been removed")]
    Evicted(SessionId),
}

pub struct SessionRegistry<O> {
    sessions: HashMap<SessionId, ClientSession<O>>,
    max_players: usize,
    colors: Vec<PlayerColor>,
    /// Monotonic, never rewound when a session leaves
    next_color: usize,
    next_seq: u64,
    shared: SharedControllerState,
    menu_events: Vec<MenuActionEvent>,
    tick: u64,
}

impl<O: Outbox> SessionRegistry<O> {
    /// `colors` is the join rotation; `Any` entries and repeats are
    /// skipped and an empty rotation falls back to [`PlayerColor::ROTATION`].
    /// Capacity is capped at the number of colors so that no two sessions
    /// ever share one.
    pub fn new(max_players: usize, colors: Vec<PlayerColor>) -> Self {
        let mut rotation: Vec<PlayerColor> = Vec::new();
        for color in colors {
            if !color.is_any() && !rotation.contains(&color) {
                rotation.push(color);
            }
        }
        if rotation.is_empty() {
            rotation = PlayerColor::ROTATION.to_vec();
        }

        Self {
            sessions: HashMap::new(),
            max_players: max_players.min(rotation.len()),
            colors: rotation,
            next_color: 0,
            next_seq: 0,
            shared: SharedControllerState::default(),
            menu_events: Vec::new(),
            tick: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn session(&self, id: SessionId) -> Option<&ClientSession<O>> {
        self.sessions.get(&id)
    }

    pub fn name_taken(&self, name: &str) -> bool {
        self.sessions.values().any(|s| s.connected && s.name == name)
    }

    pub fn color_taken(&self, color: PlayerColor) -> bool {
        self.sessions.values().any(|s| s.connected && s.color == color)
    }

    pub fn game_state(&self) -> GameState {
        self.shared.game_state()
    }

    pub fn menu_actions(&self) -> &MenuActionSet {
        self.shared.menu_actions()
    }

    /// Register a controller.
    ///
    /// On success the new session is immediately sent `nameOk`, its color
    /// and the current shared state. Sessions that lost their connection
    /// are dropped first, so they never hold on to a name or a slot.
    pub fn try_create_session(
        &mut self,
        name: &str,
        outbox: O,
    ) -> Result<SessionId, ConnectFailureReason> {
        self.purge_disconnected();

        if self.name_taken(name) {
            return Err(ConnectFailureReason::NameAlreadyTaken);
        }
        if self.sessions.len() >= self.max_players {
            return Err(ConnectFailureReason::MaxPlayersReached);
        }
        let color = self
            .next_free_color()
            .ok_or(ConnectFailureReason::MaxPlayersReached)?;

        let id = Uuid::new_v4();
        let mut session = ClientSession::new(id, name.to_string(), color, self.next_seq, outbox);
        self.next_seq += 1;

        let [state, menu] = self.shared.sync_messages();
        let greeting = [
            Message::NameOk { id },
            Message::SetColor { color },
            state,
            menu,
        ];
        // A failed greeting leaves the session disconnected; the next join
        // or broadcast drops it.
        for msg in &greeting {
            if session.send(msg).is_err() {
                break;
            }
        }

        self.sessions.insert(id, session);
        Ok(id)
    }

    /// Walk the rotation from the current index and take the first color no
    /// connected session holds. The index only moves forward.
    fn next_free_color(&mut self) -> Option<PlayerColor> {
        for _ in 0..self.colors.len() {
            let color = self.colors[self.next_color % self.colors.len()];
            self.next_color += 1;
            if !self.color_taken(color) {
                return Some(color);
            }
        }
        None
    }

    fn purge_disconnected(&mut self) {
        let stale: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| !s.connected)
            .map(|s| s.id)
            .collect();
        for id in stale {
            let _ = self.remove_session(id);
        }
    }

    pub fn remove_session(&mut self, id: SessionId) -> Result<ClientSession<O>, RegistryError> {
        let mut session = self
            .sessions
            .remove(&id)
            .ok_or(RegistryError::UnknownSession(id))?;
        session.connected = false;
        self.menu_events.retain(|e| e.session != id);
        Ok(session)
    }

    /// Send `message` to every connected session. Sessions whose outbox is
    /// closed are removed; their ids are returned.
    pub fn broadcast(&mut self, message: &Message) -> Vec<SessionId> {
        let failed: Vec<SessionId> = self
            .sessions
            .values_mut()
            .filter_map(|s| s.send(message).err().map(|_| s.id))
            .collect();

        for id in &failed {
            let _ = self.remove_session(*id);
        }
        failed
    }

    /// Send `message` to a single session.
    pub fn send_to(&mut self, id: SessionId, message: &Message) -> Result<(), RegistryError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(RegistryError::UnknownSession(id))?;

        if session.send(message).is_err() {
            let _ = self.remove_session(id);
            return Err(RegistryError::Evicted(id));
        }
        Ok(())
    }

    /// Route a decoded frame from a controller. Input is queued until the
    /// next snapshot.
    pub fn handle_client_message(
        &mut self,
        id: SessionId,
        message: Message,
    ) -> Result<(), RegistryError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(RegistryError::UnknownSession(id))?;

        match message {
            Message::Button { button, on_off } => session.queue(InputUpdate::Button {
                button,
                pressed: on_off,
            }),
            Message::Joystick {
                vertical,
                horizontal,
            } => session.queue(InputUpdate::Joystick(Joystick::clamped(vertical, horizontal))),
            Message::MenuAction { action } => {
                self.menu_events.push(MenuActionEvent {
                    session: id,
                    action,
                });
            }
            // `connect` after the handshake lands here too
            other => {
                return Err(RegistryError::UnexpectedMessage {
                    id,
                    kind: other.kind(),
                });
            }
        }
        Ok(())
    }

    /// Apply every queued input and copy out the result.
    pub fn snapshot(&mut self) -> InputSnapshot {
        self.tick += 1;

        let mut sessions: Vec<&mut ClientSession<O>> = self
            .sessions
            .values_mut()
            .filter(|s| s.connected)
            .collect();
        sessions.sort_by_key(|s| s.seq);

        let sessions = sessions
            .into_iter()
            .map(|s| {
                s.flush_pending();
                SessionInput {
                    id: s.id,
                    name: s.name.clone(),
                    color: s.color,
                    input: s.input().clone(),
                }
            })
            .collect();

        InputSnapshot {
            tick: self.tick,
            sessions,
            menu_actions: std::mem::take(&mut self.menu_events),
        }
    }

    /// Change the game state and tell every controller. Returns the ids of
    /// sessions evicted while broadcasting.
    pub fn set_game_state(&mut self, state: GameState) -> Result<Vec<SessionId>, TransitionError> {
        if !self.shared.transition(state)? {
            return Ok(Vec::new());
        }
        Ok(self.broadcast(&Message::GameState { state }))
    }

    /// Apply `(action, enabled)` pairs and broadcast the full availability
    /// list if anything changed.
    pub fn set_menu_actions(&mut self, pairs: &[(MenuAction, bool)]) -> Vec<SessionId> {
        if !self.shared.set_menu_actions(pairs) {
            return Vec::new();
        }
        let message = self.shared.menu_actions().to_message();
        self.broadcast(&message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Button;
    use std::sync::mpsc;

    type Registry = SessionRegistry<mpsc::Sender<Message>>;

    fn join(registry: &mut Registry, name: &str) -> (SessionId, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel();
        let id = registry.try_create_session(name, tx).unwrap();
        (id, rx)
    }

    #[test]
    fn test_join_greeting() {
        let mut registry = Registry::new(4, PlayerColor::ROTATION.to_vec());
        let (id, rx) = join(&mut registry, "Link");

        let received: Vec<Message> = rx.try_iter().collect();
        assert_eq!(received.len(), 4);
        assert_eq!(received[0], Message::NameOk { id });
        assert_eq!(
            received[1],
            Message::SetColor {
                color: PlayerColor::Red
            }
        );
        assert_eq!(
            received[2],
            Message::GameState {
                state: GameState::Menu
            }
        );
        assert!(matches!(received[3], Message::SetMenuActions { .. }));
    }

    #[test]
    fn test_duplicate_name_checked_before_capacity() {
        let mut registry = Registry::new(1, vec![]);
        let _first = join(&mut registry, "Link");

        let (tx, _rx) = mpsc::channel();
        assert_eq!(
            registry.try_create_session("Link", tx),
            Err(ConnectFailureReason::NameAlreadyTaken)
        );
        let (tx, _rx) = mpsc::channel();
        assert_eq!(
            registry.try_create_session("Zelda", tx),
            Err(ConnectFailureReason::MaxPlayersReached)
        );
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut registry = Registry::new(4, vec![]);
        let _first = join(&mut registry, "Link");
        let _second = join(&mut registry, "link");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_rotation_is_monotonic() {
        let mut registry = Registry::new(4, PlayerColor::ROTATION.to_vec());
        let (a, _ra) = join(&mut registry, "A");
        let (_b, _rb) = join(&mut registry, "B");
        registry.remove_session(a).unwrap();

        let (c, _rc) = join(&mut registry, "C");
        assert_eq!(registry.session(c).unwrap().color, PlayerColor::Green);
    }

    #[test]
    fn test_rejoin_skips_colors_in_use() {
        let mut registry = Registry::new(4, PlayerColor::ROTATION.to_vec());
        let (a, _ra) = join(&mut registry, "A");
        let (b, _rb) = join(&mut registry, "B");
        let (c, _rc) = join(&mut registry, "C");
        let (d, _rd) = join(&mut registry, "D");
        registry.remove_session(b).unwrap();

        // The rotation is back at Red, which A still holds
        let (e, _re) = join(&mut registry, "E");
        assert_eq!(registry.session(e).unwrap().color, PlayerColor::Blue);

        let mut colors: Vec<PlayerColor> = [a, c, d, e]
            .iter()
            .map(|id| registry.session(*id).unwrap().color)
            .collect();
        colors.sort();
        colors.dedup();
        assert_eq!(colors.len(), 4);
    }

    #[test]
    fn test_capacity_capped_by_colors() {
        let mut registry = Registry::new(
            4,
            vec![PlayerColor::Any, PlayerColor::Yellow, PlayerColor::Yellow],
        );
        assert_eq!(registry.max_players(), 1);

        let (a, _ra) = join(&mut registry, "A");
        assert_eq!(registry.session(a).unwrap().color, PlayerColor::Yellow);

        let (tx, _rx) = mpsc::channel();
        assert_eq!(
            registry.try_create_session("B", tx),
            Err(ConnectFailureReason::MaxPlayersReached)
        );
    }

    #[test]
    fn test_failed_greeting_frees_name_and_slot() {
        let mut registry = Registry::new(1, vec![]);
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let gone = registry.try_create_session("Link", tx).unwrap();
        assert!(!registry.session(gone).unwrap().connected);

        let (link, _rl) = join(&mut registry, "Link");
        assert!(!registry.contains(gone));
        assert!(registry.contains(link));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_unknown_session() {
        let mut registry = Registry::new(4, vec![]);
        let id = Uuid::new_v4();
        assert_eq!(
            registry.remove_session(id).err(),
            Some(RegistryError::UnknownSession(id))
        );
    }

    #[test]
    fn test_broadcast_evicts_closed_outbox() {
        let mut registry = Registry::new(4, vec![]);
        let (a, ra) = join(&mut registry, "A");
        let (b, rb) = join(&mut registry, "B");
        drop(rb);

        let evicted = registry.broadcast(&Message::GameState {
            state: GameState::Menu,
        });

        assert_eq!(evicted, vec![b]);
        assert!(registry.contains(a));
        assert!(!registry.contains(b));
        assert!(ra
            .try_iter()
            .any(|m| m == Message::GameState { state: GameState::Menu }));
    }

    #[test]
    fn test_send_to_evicts_closed_outbox() {
        let mut registry = Registry::new(4, vec![]);
        let (a, ra) = join(&mut registry, "A");
        drop(ra);

        let err = registry
            .send_to(a, &Message::VibrationSequence { pattern: vec![100] })
            .unwrap_err();
        assert_eq!(err, RegistryError::Evicted(a));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_server_messages_from_client_rejected() {
        let mut registry = Registry::new(4, vec![]);
        let (a, _ra) = join(&mut registry, "A");

        let err = registry
            .handle_client_message(
                a,
                Message::GameState {
                    state: GameState::Started,
                },
            )
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnexpectedMessage {
                id: a,
                kind: "gameState"
            }
        );

        let err = registry
            .handle_client_message(a, Message::Connect { name: "B".into() })
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnexpectedMessage { .. }));
    }

    #[test]
    fn test_input_invisible_until_snapshot() {
        let mut registry = Registry::new(4, vec![]);
        let (a, _ra) = join(&mut registry, "A");

        registry
            .handle_client_message(
                a,
                Message::Button {
                    button: Button::Open,
                    on_off: true,
                },
            )
            .unwrap();
        assert!(!registry.session(a).unwrap().input().is_pressed(Button::Open));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.tick, 1);
        assert!(snapshot.get(a).unwrap().is_pressed(Button::Open));
    }

    #[test]
    fn test_menu_events_drained() {
        let mut registry = Registry::new(4, vec![]);
        let (a, _ra) = join(&mut registry, "A");
        registry
            .handle_client_message(
                a,
                Message::MenuAction {
                    action: MenuAction::StartGame,
                },
            )
            .unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot.menu_actions,
            vec![MenuActionEvent {
                session: a,
                action: MenuAction::StartGame
            }]
        );
        assert!(registry.snapshot().menu_actions.is_empty());
    }

    #[test]
    fn test_unchanged_state_not_broadcast() {
        let mut registry = Registry::new(4, vec![]);
        let (_a, ra) = join(&mut registry, "A");
        let _greeting: Vec<Message> = ra.try_iter().collect();

        registry.set_game_state(GameState::Menu).unwrap();
        registry.set_menu_actions(&[(MenuAction::PauseGame, true)]);
        assert_eq!(ra.try_iter().count(), 0);

        registry.set_game_state(GameState::Started).unwrap();
        assert_eq!(
            ra.try_iter().collect::<Vec<_>>(),
            vec![Message::GameState {
                state: GameState::Started
            }]
        );
    }
}
