//! Per-controller session state.
//!
//! A [`ClientSession`] owns the outgoing side of its connection (an
//! [`Outbox`]) and the input it has reported so far. Input frames are
//! queued as they arrive and only folded into the visible state when the
//! registry takes a snapshot.

use crate::protocol::{Button, Message, PlayerColor, SessionId};
use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("outbox is closed or full")]
pub struct DeliveryError;

/// Outgoing message queue of one connection.
///
/// Implementations must not block: the registry calls `deliver` while
/// holding its lock.
pub trait Outbox {
    fn deliver(&self, message: &Message) -> Result<(), DeliveryError>;
}

impl Outbox for mpsc::Sender<Message> {
    fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        self.send(message.clone()).map_err(|_| DeliveryError)
    }
}

/// Joystick position, both axes in [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Joystick {
    pub vertical: f32,
    pub horizontal: f32,
}

impl Joystick {
    pub fn clamped(vertical: f32, horizontal: f32) -> Self {
        Self {
            vertical: clamp_axis(vertical),
            horizontal: clamp_axis(horizontal),
        }
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

/// Last known input of a controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    pub buttons: BTreeMap<Button, bool>,
    pub joystick: Joystick,
}

impl InputState {
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons.get(&button).copied().unwrap_or(false)
    }

    /// Apply one frame's effect in full.
    pub fn apply(&mut self, update: InputUpdate) {
        match update {
            InputUpdate::Button { button, pressed } => {
                self.buttons.insert(button, pressed);
            }
            InputUpdate::Joystick(joystick) => self.joystick = joystick,
        }
    }
}

/// The state change carried by one input frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputUpdate {
    Button { button: Button, pressed: bool },
    Joystick(Joystick),
}

/// A connected controller.
pub struct ClientSession<O> {
    pub id: SessionId,
    pub name: String,
    pub color: PlayerColor,
    pub connected: bool,
    /// Join order, used to keep snapshots stable
    pub(crate) seq: u64,
    input: InputState,
    pending: VecDeque<InputUpdate>,
    outbox: O,
}

impl<O: Outbox> ClientSession<O> {
    pub fn new(id: SessionId, name: String, color: PlayerColor, seq: u64, outbox: O) -> Self {
        Self {
            id,
            name,
            color,
            connected: true,
            seq,
            input: InputState::default(),
            pending: VecDeque::new(),
            outbox,
        }
    }

    /// Input as of the last snapshot.
    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn queue(&mut self, update: InputUpdate) {
        self.pending.push_back(update);
    }

    /// Apply every queued update in arrival order.
    pub fn flush_pending(&mut self) {
        while let Some(update) = self.pending.pop_front() {
            self.input.apply(update);
        }
    }

    /// Send a message to this controller. A failure marks the session as
    /// disconnected.
    pub fn send(&mut self, message: &Message) -> Result<(), DeliveryError> {
        if !self.connected {
            return Err(DeliveryError);
        }
        let result = self.outbox.deliver(message);
        if result.is_err() {
            self.connected = false;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn session() -> (ClientSession<mpsc::Sender<Message>>, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel();
        let session = ClientSession::new(Uuid::new_v4(), "Zelda".into(), PlayerColor::Blue, 0, tx);
        (session, rx)
    }

    #[test]
    fn test_pending_applied_in_order() {
        let (mut session, _rx) = session();
        session.queue(InputUpdate::Button {
            button: Button::Attack,
            pressed: true,
        });
        session.queue(InputUpdate::Joystick(Joystick::clamped(0.5, -0.5)));
        session.queue(InputUpdate::Button {
            button: Button::Attack,
            pressed: false,
        });

        assert!(!session.input().is_pressed(Button::Attack));
        assert_eq!(session.pending_len(), 3);

        session.flush_pending();

        assert_eq!(session.pending_len(), 0);
        assert!(!session.input().is_pressed(Button::Attack));
        assert_eq!(session.input().buttons.get(&Button::Attack), Some(&false));
        assert_eq!(session.input().joystick, Joystick::clamped(0.5, -0.5));
    }

    #[test]
    fn test_button_only_touches_named_button() {
        let mut input = InputState::default();
        input.apply(InputUpdate::Button {
            button: Button::Pull,
            pressed: true,
        });
        input.apply(InputUpdate::Button {
            button: Button::Carry,
            pressed: true,
        });
        input.apply(InputUpdate::Button {
            button: Button::Pull,
            pressed: false,
        });

        assert!(!input.is_pressed(Button::Pull));
        assert!(input.is_pressed(Button::Carry));
        assert!(!input.is_pressed(Button::Read));
    }

    #[test]
    fn test_joystick_clamped() {
        let joystick = Joystick::clamped(2.0, -3.0);
        assert_eq!(joystick.vertical, 1.0);
        assert_eq!(joystick.horizontal, -1.0);
        assert_eq!(Joystick::clamped(f32::NAN, 0.3).vertical, 0.0);
    }

    #[test]
    fn test_send_failure_disconnects() {
        let (mut session, rx) = session();
        let msg = Message::SetColor {
            color: PlayerColor::Blue,
        };
        assert!(session.send(&msg).is_ok());
        assert_eq!(rx.try_recv().unwrap(), msg);

        drop(rx);
        assert_eq!(session.send(&msg), Err(DeliveryError));
        assert!(!session.connected);
    }
}
