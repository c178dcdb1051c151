use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a player for the whole lifetime of a lobby, across reconnects.
pub type PlayerId = Uuid;

/// Lifecycle of a lobby.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LobbyState {
    /// the lobby has been opened but never started
    Unstarted,
    /// turns are being played
    Ongoing,
    /// the configured number of rounds has been played
    GameOver,
}

/// What a player is doing in the current turn.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Guessing,
    Drawing,
    /// waiting for the next turn, e.g. after guessing correctly
    Standby,
    Spectating,
}

/// The public view of a player, as sent to every client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// player id
    pub id: PlayerId,
    /// name of the player
    pub name: String,
    /// the total score of the player in this lobby
    pub score: i64,
    /// points earned during the most recent turn
    pub last_score: i64,
    /// position in the standings, 1 is best
    pub rank: usize,
    /// is the connection of the player currently established?
    pub connected: bool,
    pub state: PlayerState,
}

/// One character of the word that is to be guessed.
///
/// `character` stays `None` until the character is revealed. `underline`
/// marks characters that are part of the guessable word, whitespace and
/// punctuation are shown right away and never underlined.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WordHint {
    pub character: Option<char>,
    pub underline: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineData {
    pub from_x: f32,
    pub from_y: f32,
    pub to_x: f32,
    pub to_y: f32,
    pub color: RgbColor,
    pub line_width: f32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FillData {
    pub x: f32,
    pub y: f32,
    pub color: RgbColor,
}

/// A single entry of the drawing log of the current turn.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum DrawingInstruction {
    Line(LineData),
    Fill(FillData),
}

/// Progress of a kick vote. The voters are never part of this, only the
/// aggregated count.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KickVote {
    pub player_id: PlayerId,
    pub player_name: String,
    pub vote_count: usize,
    pub required_vote_count: usize,
}

impl KickVote {
    pub fn succeeded(&self) -> bool {
        self.vote_count >= self.required_vote_count
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerChangeEvent {
    pub player_id: PlayerId,
    pub player_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NameChangeEvent {
    pub player_id: PlayerId,
    pub player_name: String,
}

/// A chat line as relayed by the server.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// display name of the author at the time of writing
    pub author: String,
    pub author_id: PlayerId,
    pub content: String,
}

/// Everything a client needs to render the lobby without any further data.
/// Sent once per new or reconnecting connection.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ready {
    pub player_id: PlayerId,
    pub player_name: String,
    pub allow_drawing: bool,

    pub votekick_enabled: bool,
    pub game_state: LobbyState,
    pub owner_id: Option<PlayerId>,
    pub round: u32,
    pub rounds: u32,
    /// unix time in milliseconds, 0 if no turn timer is running
    pub round_end_time: i64,
    pub drawing_time_setting: u32,
    pub word_hints: Vec<WordHint>,
    pub players: Vec<Player>,
    pub current_drawing: Vec<DrawingInstruction>,
}

/// State right after a new turn started. No word has been chosen yet, so
/// there are no word hints and no drawing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NextTurn {
    /// word of the turn that just ended, `None` for the very first turn
    pub previous_word: Option<String>,
    pub players: Vec<Player>,
    pub round: u32,
    pub round_end_time: i64,
}

/// The ready snapshot plus the word of the final turn, since no `next-turn`
/// follows that could carry it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameOverEvent {
    #[serde(flatten)]
    pub ready: Ready,
    pub previous_word: Option<String>,
}
