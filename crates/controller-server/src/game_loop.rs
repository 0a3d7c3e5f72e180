//! Fixed-rate loop that consumes controller input.
//!
//! Each tick takes one snapshot, applies any menu actions that were
//! selected since the last tick, and republishes which menu actions are
//! available.

use crate::hub::Hub;
use controller_core::{GameState, InputSnapshot, LobbyRules};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, trace, warn};

pub async fn run_game_loop(hub: Arc<Hub>, rules: LobbyRules, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        tick(&hub, &rules);
    }
}

/// Run one tick and return the snapshot it was based on.
pub fn tick(hub: &Hub, rules: &LobbyRules) -> InputSnapshot {
    let snapshot = hub.snapshot();
    let players = snapshot.player_count();

    for event in &snapshot.menu_actions {
        let Some(next) = rules.resolve(event.action, hub.game_state(), players) else {
            trace!("Ignoring {:?} from {}", event.action, event.session);
            continue;
        };
        match hub.set_game_state(next) {
            Ok(()) => info!(
                "Game state is now {} ({:?} from {})",
                next, event.action, event.session
            ),
            Err(e) => warn!("{}", e),
        }
    }

    // Everyone left mid-game
    if players == 0 && hub.game_state() != GameState::Menu {
        if let Err(e) = hub.set_game_state(GameState::Menu) {
            warn!("{}", e);
        }
    }

    hub.set_menu_actions(&rules.availability(hub.game_state(), players));

    trace!(
        "Tick {}: {} players, {} menu actions",
        snapshot.tick,
        players,
        snapshot.menu_actions.len()
    );
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::hub::ClientOutbox;
    use controller_core::{MenuAction, Message, SessionId};
    use tokio::sync::mpsc;

    fn join(hub: &Hub, name: &str) -> (SessionId, mpsc::Receiver<Message>) {
        let (outbox, rx) = ClientOutbox::channel();
        let id = hub.join(name, outbox).unwrap();
        (id, rx)
    }

    fn select(hub: &Hub, id: SessionId, action: MenuAction) {
        hub.submit(id, Message::MenuAction { action }).unwrap();
    }

    #[test]
    fn test_start_pause_resume_quit() {
        let hub = Hub::new(&ServerConfig::default());
        let rules = LobbyRules::new(2);
        let (link, _rl) = join(&hub, "Link");

        select(&hub, link, MenuAction::StartGame);
        tick(&hub, &rules);
        assert_eq!(hub.game_state(), GameState::Menu);

        let (_zelda, _rz) = join(&hub, "Zelda");
        tick(&hub, &rules);
        select(&hub, link, MenuAction::StartGame);
        tick(&hub, &rules);
        assert_eq!(hub.game_state(), GameState::Started);

        select(&hub, link, MenuAction::PauseGame);
        tick(&hub, &rules);
        assert_eq!(hub.game_state(), GameState::Paused);

        select(&hub, link, MenuAction::ResumeGame);
        tick(&hub, &rules);
        assert_eq!(hub.game_state(), GameState::Started);

        select(&hub, link, MenuAction::PauseGame);
        select(&hub, link, MenuAction::QuitGame);
        tick(&hub, &rules);
        assert_eq!(hub.game_state(), GameState::Menu);
    }

    #[test]
    fn test_everyone_leaving_returns_to_menu() {
        let hub = Hub::new(&ServerConfig::default());
        let rules = LobbyRules::new(1);
        let (link, _rl) = join(&hub, "Link");

        select(&hub, link, MenuAction::StartGame);
        tick(&hub, &rules);
        assert_eq!(hub.game_state(), GameState::Started);

        hub.disconnect(link).unwrap();
        tick(&hub, &rules);
        assert_eq!(hub.game_state(), GameState::Menu);
    }

    #[test]
    fn test_start_offered_once_enough_players() {
        let hub = Hub::new(&ServerConfig::default());
        let rules = LobbyRules::new(2);
        let (_link, mut rl) = join(&hub, "Link");
        let (_zelda, _rz) = join(&hub, "Zelda");
        tick(&hub, &rules);

        let mut offered = false;
        while let Ok(msg) = rl.try_recv() {
            if let Message::SetMenuActions { actions } = msg {
                offered = actions
                    .iter()
                    .any(|a| a.action == MenuAction::StartGame && a.enabled);
            }
        }
        assert!(offered);
    }
}
