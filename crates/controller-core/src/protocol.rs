//! Wire protocol spoken between phone controllers and the hub.
//!
//! Every WebSocket text frame carries exactly one JSON object. The `type`
//! field names the variant, the remaining fields are camelCase, and enum
//! values travel as their variant names:
//!
//! ```json
//! {"type":"button","button":"Attack","onOff":true}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Opaque identifier assigned to a session when its handshake succeeds.
pub type SessionId = Uuid;

/// Controller buttons the game can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Button {
    Attack,
    Pull,
    Carry,
    Press,
    Throw,
    Read,
    Open,
    UseBomb,
    Exit,
    /// Used by springs to bounce a player back
    JumpBack,
}

impl Button {
    pub const ALL: [Button; 10] = [
        Button::Attack,
        Button::Pull,
        Button::Carry,
        Button::Press,
        Button::Throw,
        Button::Read,
        Button::Open,
        Button::UseBomb,
        Button::Exit,
        Button::JumpBack,
    ];
}

/// Named capabilities that can be offered to or withdrawn from controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MenuAction {
    StartGame,
    QuitGame,
    PauseGame,
    ResumeGame,
    /// Browse to the next page of a multi-page info screen
    Next,
    Back,
    Yes,
    No,
    ShowMap,
}

impl MenuAction {
    pub const ALL: [MenuAction; 9] = [
        MenuAction::StartGame,
        MenuAction::QuitGame,
        MenuAction::PauseGame,
        MenuAction::ResumeGame,
        MenuAction::Next,
        MenuAction::Back,
        MenuAction::Yes,
        MenuAction::No,
        MenuAction::ShowMap,
    ];
}

/// Player color. `Any` may interact with objects of every color and is
/// never handed out by the join rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Yellow,
    Any,
}

impl PlayerColor {
    /// Default join rotation.
    pub const ROTATION: [PlayerColor; 4] = [
        PlayerColor::Red,
        PlayerColor::Blue,
        PlayerColor::Green,
        PlayerColor::Yellow,
    ];

    pub fn is_any(&self) -> bool {
        matches!(self, PlayerColor::Any)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown player color: {0:?}")]
pub struct UnknownColor(pub String);

impl FromStr for PlayerColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Red" => Ok(PlayerColor::Red),
            "Blue" => Ok(PlayerColor::Blue),
            "Green" => Ok(PlayerColor::Green),
            "Yellow" => Ok(PlayerColor::Yellow),
            "Any" => Ok(PlayerColor::Any),
            other => Err(UnknownColor(other.to_string())),
        }
    }
}

impl fmt::Display for PlayerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Game state as seen by every controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    #[default]
    Menu,
    Started,
    Paused,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why the hub refused a `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum ConnectFailureReason {
    #[error("A player with this name is already connected")]
    NameAlreadyTaken,

    #[error("The maximum number of players is already connected")]
    MaxPlayersReached,
}

/// Absolute availability of one menu action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuActionState {
    pub action: MenuAction,
    pub enabled: bool,
}

/// HUD data shown on a single controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub health_points: u32,
    pub gold: u32,
}

/// What kind of input the game currently expects from one controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputMode {
    /// Buttons, joystick and menus
    #[default]
    Normal,
    /// Device orientation only; the controller may hide joystick and buttons
    IMUOrientation,
    /// The player is down and playing the revival minigame
    RevivalMinigame,
}

/// Who is allowed to send a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

/// One frame of the controller protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// First frame of every connection, carries the player name
    Connect { name: String },

    #[serde(rename_all = "camelCase")]
    Button { button: Button, on_off: bool },

    /// Both axes in [-1, 1]
    Joystick { vertical: f32, horizontal: f32 },

    /// A menu action was selected on a controller
    MenuAction { action: MenuAction },

    SetColor { color: PlayerColor },

    ConnectFailure { reason: ConnectFailureReason },

    GameState { state: GameState },

    /// Handshake accepted
    NameOk { id: SessionId },

    SetMenuActions { actions: Vec<MenuActionState> },

    SetEnabledButtons { buttons: Vec<Button> },

    /// Buttons that are enabled but cannot be used until their cooldown ends
    #[serde(rename_all = "camelCase")]
    SetCooldownButtons { cooldown_buttons: Vec<Button> },

    #[serde(rename_all = "camelCase")]
    SetInputMode { input_mode: InputMode },

    /// Alternating vibrate/pause durations in milliseconds
    VibrationSequence { pattern: Vec<u32> },

    #[serde(rename_all = "camelCase")]
    PlayerInfo { health_points: u32, gold: u32 },
}

impl Message {
    /// Build a joystick frame, refusing values outside [-1, 1].
    pub fn joystick(vertical: f32, horizontal: f32) -> Result<Self, CodecError> {
        check_axis("vertical", vertical)?;
        check_axis("horizontal", horizontal)?;
        Ok(Message::Joystick {
            vertical,
            horizontal,
        })
    }

    pub fn direction(&self) -> Direction {
        match self {
            Message::Connect { .. }
            | Message::Button { .. }
            | Message::Joystick { .. }
            | Message::MenuAction { .. } => Direction::ClientToServer,
            Message::SetColor { .. }
            | Message::ConnectFailure { .. }
            | Message::GameState { .. }
            | Message::NameOk { .. }
            | Message::SetMenuActions { .. }
            | Message::SetEnabledButtons { .. }
            | Message::SetCooldownButtons { .. }
            | Message::SetInputMode { .. }
            | Message::VibrationSequence { .. }
            | Message::PlayerInfo { .. } => Direction::ServerToClient,
        }
    }

    /// The wire discriminant, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Connect { .. } => "connect",
            Message::Button { .. } => "button",
            Message::Joystick { .. } => "joystick",
            Message::MenuAction { .. } => "menuAction",
            Message::SetColor { .. } => "setColor",
            Message::ConnectFailure { .. } => "connectFailure",
            Message::GameState { .. } => "gameState",
            Message::NameOk { .. } => "nameOk",
            Message::SetMenuActions { .. } => "setMenuActions",
            Message::SetEnabledButtons { .. } => "setEnabledButtons",
            Message::SetCooldownButtons { .. } => "setCooldownButtons",
            Message::SetInputMode { .. } => "setInputMode",
            Message::VibrationSequence { .. } => "vibrationSequence",
            Message::PlayerInfo { .. } => "playerInfo",
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("player name must not be empty")]
    EmptyName,

    #[error("joystick axes must be finite numbers")]
    NonFiniteAxis,

    #[error("{axis} axis {value} is outside [-1, 1]")]
    AxisOutOfRange { axis: &'static str, value: f32 },
}

fn check_axis(axis: &'static str, value: f32) -> Result<(), CodecError> {
    if (-1.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CodecError::AxisOutOfRange { axis, value })
    }
}

/// Decode one text frame.
///
/// Unknown discriminants and missing fields are rejected. Joystick values
/// are clamped into [-1, 1] instead of being passed on raw.
pub fn decode(text: &str) -> Result<Message, CodecError> {
    let message: Message = serde_json::from_str(text)?;

    match message {
        Message::Connect { name } if name.is_empty() => Err(CodecError::EmptyName),
        Message::Joystick {
            vertical,
            horizontal,
        } => {
            if !vertical.is_finite() || !horizontal.is_finite() {
                return Err(CodecError::NonFiniteAxis);
            }
            Ok(Message::Joystick {
                vertical: vertical.clamp(-1.0, 1.0),
                horizontal: horizontal.clamp(-1.0, 1.0),
            })
        }
        other => Ok(other),
    }
}

pub fn encode(message: &Message) -> Result<String, CodecError> {
    Ok(serde_json::to_string(message)?)
}
