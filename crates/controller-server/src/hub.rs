//! The shared handle every connection task and the game loop hold.
//!
//! All registry access goes through one mutex. The lock is never held
//! across an `.await`: outboxes are bounded channels drained by each
//! connection's writer task and filled with `try_send`, so a slow
//! controller cannot stall the others. One that falls a full outbox behind
//! is evicted.

use crate::config::ServerConfig;
use controller_core::{
    ConnectFailureReason, DeliveryError, GameState, InputSnapshot, MenuAction, Message, Outbox,
    RegistryError, SessionId, SessionRegistry, TransitionError,
};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Messages a connection may have queued before it counts as stalled.
pub const OUTBOX_CAPACITY: usize = 64;

/// Outgoing queue of one WebSocket connection.
#[derive(Debug, Clone)]
pub struct ClientOutbox(mpsc::Sender<Message>);

impl ClientOutbox {
    pub fn new(sender: mpsc::Sender<Message>) -> Self {
        Self(sender)
    }

    /// A fresh outbox of [`OUTBOX_CAPACITY`] and the receiver its writer
    /// task drains.
    pub fn channel() -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        (Self(tx), rx)
    }
}

impl Outbox for ClientOutbox {
    fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        self.0.try_send(message.clone()).map_err(|_| DeliveryError)
    }
}

pub struct Hub {
    registry: Mutex<SessionRegistry<ClientOutbox>>,
}

impl Hub {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            registry: Mutex::new(SessionRegistry::new(
                config.max_players,
                config.colors.clone(),
            )),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionRegistry<ClientOutbox>> {
        // Registry methods never leave it half-updated, so poisoning is ignored
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Try to admit a controller under `name`.
    pub fn join(
        &self,
        name: &str,
        outbox: ClientOutbox,
    ) -> Result<SessionId, ConnectFailureReason> {
        let mut registry = self.lock();
        let id = registry.try_create_session(name, outbox)?;
        if let Some(session) = registry.session(id) {
            info!(
                "Player {} joined as {} ({} of {})",
                name,
                session.color,
                registry.len(),
                registry.max_players()
            );
        }
        Ok(id)
    }

    /// Remove a session whose socket has closed.
    pub fn disconnect(&self, id: SessionId) -> Result<(), RegistryError> {
        let mut registry = self.lock();
        let session = registry.remove_session(id)?;
        info!("Player {} left ({} remaining)", session.name, registry.len());
        Ok(())
    }

    /// Hand a decoded frame from a controller to the registry.
    pub fn submit(&self, id: SessionId, message: Message) -> Result<(), RegistryError> {
        self.lock().handle_client_message(id, message)
    }

    pub fn snapshot(&self) -> InputSnapshot {
        self.lock().snapshot()
    }

    pub fn game_state(&self) -> GameState {
        self.lock().game_state()
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    pub fn set_game_state(&self, state: GameState) -> Result<(), TransitionError> {
        let evicted = self.lock().set_game_state(state)?;
        log_evicted(&evicted);
        Ok(())
    }

    pub fn set_menu_actions(&self, pairs: &[(MenuAction, bool)]) {
        let evicted = self.lock().set_menu_actions(pairs);
        log_evicted(&evicted);
    }

    pub fn broadcast(&self, message: &Message) {
        let evicted = self.lock().broadcast(message);
        log_evicted(&evicted);
    }

    /// Send to one controller, e.g. `setEnabledButtons`, `setCooldownButtons`,
    /// `setInputMode` or `playerInfo`.
    pub fn send_to(&self, id: SessionId, message: &Message) -> Result<(), RegistryError> {
        let result = self.lock().send_to(id, message);
        if let Err(RegistryError::Evicted(id)) = &result {
            log_evicted(&[*id]);
        }
        result
    }
}

fn log_evicted(ids: &[SessionId]) {
    for id in ids {
        warn!("Session {} stopped accepting messages and was removed", id);
    }
}
