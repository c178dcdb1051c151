use scribble_session_common::settings_common::SettingsError;
use thiserror::Error;

/// Everything that can go wrong while acting on a lobby.
///
/// The display strings double as the text of the `system-message` that is
/// sent to the player whose event caused the error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LobbyError {
    #[error("The lobby is full.")]
    LobbyFull,
    #[error("Unknown player.")]
    UnknownPlayer,
    #[error("It is not your turn.")]
    NotYourTurn,
    #[error("You can't vote to kick yourself.")]
    SelfVote,
    #[error("You already voted to kick this player.")]
    AlreadyVoted,
    #[error("Vote kicking is disabled in this lobby.")]
    VotekickDisabled,
    #[error("The connection has been closed.")]
    ConnectionClosed,
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
    #[error("Only the lobby owner can do that.")]
    NotLobbyOwner,
    #[error("At least two connected players are required to start.")]
    NotEnoughPlayers,
    #[error("Too many clients from the same address.")]
    TooManyClientsPerIp,
    #[error("Invalid lobby settings: {0}")]
    InvalidSettings(#[from] SettingsError),
}

impl LobbyError {
    /// Errors that are reported back to the offending client only, as a
    /// targeted system message. Join failures happen before a player exists
    /// and are answered by the transport instead.
    pub fn is_client_facing(&self) -> bool {
        !matches!(
            self,
            LobbyError::ConnectionClosed
                | LobbyError::LobbyFull
                | LobbyError::TooManyClientsPerIp
        )
    }
}
