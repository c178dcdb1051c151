//! Fans events out to the connections of a lobby.
//!
//! Delivery to one connection never depends on another: every matching
//! connected player gets exactly one attempt, failures are collected and
//! handed back so the caller can mark those players as disconnected.

use scribble_session_common::gamestate_common::{PlayerId, PlayerState};
use scribble_session_common::messages_common::ServerEvent;
use tracing::{error, warn};

use crate::error::LobbyError;
use crate::registry::{PlayerEntry, PlayerRegistry};
use crate::wordhints::WordHints;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    AllExcept(PlayerId),
    DrawerOnly,
    /// players that still have to guess the word
    GuessersOnly,
    /// players that may see the word or talk about it: the drawer, players
    /// that guessed correctly and spectators
    NonGuessing,
    Single(PlayerId),
}

impl Audience {
    pub fn matches(&self, entry: &PlayerEntry) -> bool {
        match self {
            Audience::All => true,
            Audience::AllExcept(id) => entry.id() != *id,
            Audience::DrawerOnly => entry.state() == PlayerState::Drawing,
            Audience::GuessersOnly => entry.state() == PlayerState::Guessing,
            Audience::NonGuessing => entry.state() != PlayerState::Guessing,
            Audience::Single(id) => entry.id() == *id,
        }
    }
}

/// Outcome of a single broadcast.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    /// players whose connection failed during this broadcast
    pub failed: Vec<PlayerId>,
}

impl Delivery {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Books the outcome of one send. Only a closed connection marks the
    /// player as failed.
    fn record(&mut self, player_id: PlayerId, kind: &str, result: Result<(), LobbyError>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(LobbyError::ConnectionClosed) => {
                warn!(player = %player_id, kind, "failed to send event");
                self.failed.push(player_id);
            }
            Err(err) => error!(player = %player_id, kind, "failed to send event: {}", err),
        }
    }
}

/// Sends the same event to every connected player of `audience`. The event
/// is serialized once.
pub fn broadcast(registry: &PlayerRegistry, event: &ServerEvent, audience: Audience) -> Delivery {
    let frame = match event.to_frame() {
        Ok(frame) => frame,
        Err(err) => {
            error!(kind = event.kind(), "failed to serialize event: {}", err);
            return Delivery::default();
        }
    };

    let mut delivery = Delivery::default();
    for entry in registry.iter().filter(|p| audience.matches(p)) {
        if let Some(connection) = entry.connection() {
            delivery.record(entry.id(), event.kind(), connection.send_frame(frame.clone()));
        }
    }
    delivery
}

/// Like `broadcast`, but builds the event per recipient. Recipients for
/// which `event_for` returns `None` are skipped.
pub fn broadcast_with<F>(registry: &PlayerRegistry, audience: Audience, mut event_for: F) -> Delivery
where
    F: FnMut(&PlayerEntry) -> Option<ServerEvent>,
{
    let mut delivery = Delivery::default();
    for entry in registry.iter().filter(|p| audience.matches(p)) {
        let connection = match entry.connection() {
            Some(connection) => connection,
            None => continue,
        };
        if let Some(event) = event_for(entry) {
            delivery.record(entry.id(), event.kind(), connection.send(&event));
        }
    }
    delivery
}

/// Whether `entry` may see the whole word of the running turn. Everybody
/// except the players that still have to guess it.
pub fn knows_word(entry: &PlayerEntry) -> bool {
    entry.state() != PlayerState::Guessing
}

/// Sends the word hints to `audience`: the current blanks to guessers, the
/// full word to everybody else.
pub fn broadcast_word_hints(registry: &PlayerRegistry, hints: &WordHints, audience: Audience) -> Delivery {
    let full = hints.full();
    let partial = hints.partial();
    broadcast_with(registry, audience, |entry| {
        let hints = if knows_word(entry) {
            full.clone()
        } else {
            partial.clone()
        };
        Some(ServerEvent::UpdateWordhint(hints))
    })
}
