//! Event envelope exchanged between clients and the lobby.
//!
//! Every event is a JSON object `{"type": "<kind>", "data": <payload>}`.
//! Events without payload omit `data`. Inbound and outbound events share some
//! type names (`message`, `line`, `kick-vote`, ...) but not their payloads,
//! which is why they are two separate enums.

use serde::{Deserialize, Serialize};

use crate::gamestate_common::*;
use crate::settings_common::LobbySettings;

/// Events sent by a client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Start,
    RequestDrawing,
    /// index into the words offered by `your-turn`
    ChooseWord(usize),
    Undo,
    /// id of the player to vote against
    KickVote(PlayerId),
    NameChange(String),
    /// chat message or guess
    Message(String),
    Line(LineData),
    Fill(FillData),
    ClearDrawingBoard,
    ToggleSpectate,
}

impl ClientEvent {
    pub fn parse(frame: &[u8]) -> Result<ClientEvent, serde_json::Error> {
        serde_json::from_slice(frame)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::Start => "start",
            ClientEvent::RequestDrawing => "request-drawing",
            ClientEvent::ChooseWord(_) => "choose-word",
            ClientEvent::Undo => "undo",
            ClientEvent::KickVote(_) => "kick-vote",
            ClientEvent::NameChange(_) => "name-change",
            ClientEvent::Message(_) => "message",
            ClientEvent::Line(_) => "line",
            ClientEvent::Fill(_) => "fill",
            ClientEvent::ClearDrawingBoard => "clear-drawing-board",
            ClientEvent::ToggleSpectate => "toggle-spectate",
        }
    }
}

/// Events sent by the lobby.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    UpdatePlayers(Vec<Player>),
    UpdateWordhint(Vec<WordHint>),
    /// id of the player that guessed the word
    CorrectGuess(PlayerId),
    /// the guess that almost matched, only sent to the guesser
    CloseGuess(String),
    SystemMessage(String),
    NonGuessingPlayerMessage(OutgoingMessage),
    Message(OutgoingMessage),
    Ready(Box<Ready>),
    GameOver(Box<GameOverEvent>),
    /// words the drawer may choose from
    YourTurn(Vec<String>),
    NextTurn(NextTurn),
    Drawing(Vec<DrawingInstruction>),
    DrawerKicked,
    OwnerChange(OwnerChangeEvent),
    LobbySettingsChanged(LobbySettings),
    Shutdown,
    KickVote(KickVote),
    NameChange(NameChangeEvent),
    Line(LineData),
    Fill(FillData),
    ClearDrawingBoard,
}

impl ServerEvent {
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_frame(frame: &str) -> Result<ServerEvent, serde_json::Error> {
        serde_json::from_str(frame)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::UpdatePlayers(_) => "update-players",
            ServerEvent::UpdateWordhint(_) => "update-wordhint",
            ServerEvent::CorrectGuess(_) => "correct-guess",
            ServerEvent::CloseGuess(_) => "close-guess",
            ServerEvent::SystemMessage(_) => "system-message",
            ServerEvent::NonGuessingPlayerMessage(_) => "non-guessing-player-message",
            ServerEvent::Message(_) => "message",
            ServerEvent::Ready(_) => "ready",
            ServerEvent::GameOver(_) => "game-over",
            ServerEvent::YourTurn(_) => "your-turn",
            ServerEvent::NextTurn(_) => "next-turn",
            ServerEvent::Drawing(_) => "drawing",
            ServerEvent::DrawerKicked => "drawer-kicked",
            ServerEvent::OwnerChange(_) => "owner-change",
            ServerEvent::LobbySettingsChanged(_) => "lobby-settings-changed",
            ServerEvent::Shutdown => "shutdown",
            ServerEvent::KickVote(_) => "kick-vote",
            ServerEvent::NameChange(_) => "name-change",
            ServerEvent::Line(_) => "line",
            ServerEvent::Fill(_) => "fill",
            ServerEvent::ClearDrawingBoard => "clear-drawing-board",
        }
    }
}

/// First frame a client sends after the key exchange.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Hello {
    /// display name to join with
    pub name: String,
    /// id handed out on a previous join; present when reconnecting
    pub session: Option<PlayerId>,
}
