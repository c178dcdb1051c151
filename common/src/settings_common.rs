use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_MAX_PLAYERS: usize = 2;
pub const MAX_MAX_PLAYERS: usize = 24;
pub const MIN_DRAWING_TIME: u32 = 60;
pub const MAX_DRAWING_TIME: u32 = 300;
pub const MIN_ROUNDS: u32 = 1;
pub const MAX_ROUNDS: u32 = 20;
pub const MIN_CLIENTS_PER_IP_LIMIT: usize = 1;
pub const MAX_CLIENTS_PER_IP_LIMIT: usize = MAX_MAX_PLAYERS;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("max players must be between 2 and 24, got {0}")]
    MaxPlayers(usize),
    #[error("custom words chance must be between 0 and 100, got {0}")]
    CustomWordsChance(u8),
    #[error("clients per ip limit must be between 1 and 24, got {0}")]
    ClientsPerIpLimit(usize),
    #[error("drawing time must be between 60 and 300 seconds, got {0}")]
    DrawingTime(u32),
    #[error("rounds must be between 1 and 20, got {0}")]
    Rounds(u32),
}

/// The lobby settings that the owner may edit after the lobby has been
/// opened. Persisting them is up to whoever hosts the lobby.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LobbySettings {
    /// maximum amount of players in the lobby, disconnected ones included
    pub max_players: usize,
    /// is the lobby listed for clients asking for open lobbies?
    pub public: bool,
    /// may players kick each other by majority vote?
    pub enable_votekick: bool,
    /// chance in percent of each offered word being a custom word
    pub custom_words_chance: u8,
    /// how many connected players may share one address
    pub clients_per_ip_limit: usize,
    /// seconds a drawer has for one drawing
    pub drawing_time: u32,
    /// one round means every participant draws once
    pub rounds: u32,
}

impl Default for LobbySettings {
    fn default() -> Self {
        LobbySettings {
            max_players: 12,
            public: false,
            enable_votekick: true,
            custom_words_chance: 50,
            clients_per_ip_limit: 1,
            drawing_time: 120,
            rounds: 4,
        }
    }
}

impl LobbySettings {
    /// Checks every setting against its allowed range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_MAX_PLAYERS..=MAX_MAX_PLAYERS).contains(&self.max_players) {
            return Err(SettingsError::MaxPlayers(self.max_players));
        }
        if self.custom_words_chance > 100 {
            return Err(SettingsError::CustomWordsChance(self.custom_words_chance));
        }
        if !(MIN_CLIENTS_PER_IP_LIMIT..=MAX_CLIENTS_PER_IP_LIMIT).contains(&self.clients_per_ip_limit) {
            return Err(SettingsError::ClientsPerIpLimit(self.clients_per_ip_limit));
        }
        if !(MIN_DRAWING_TIME..=MAX_DRAWING_TIME).contains(&self.drawing_time) {
            return Err(SettingsError::DrawingTime(self.drawing_time));
        }
        if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&self.rounds) {
            return Err(SettingsError::Rounds(self.rounds));
        }
        Ok(())
    }
}
