use std::sync::Arc;
use std::time::{Duration, Instant};

use scribble_session_common::gamestate_common::{Player, PlayerId, PlayerState};
use tracing::info;
use uuid::Uuid;

use crate::config::MAX_NAME_LENGTH;
use crate::connection::{Connection, ConnectionId};
use crate::error::LobbyError;

/// What a player wants to be for upcoming turns. Only applied at turn
/// boundaries while a game is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    Player,
    Spectator,
}

/// A player as the lobby knows it, connection and bookkeeping included.
#[derive(Debug)]
pub struct PlayerEntry {
    info: Player,
    /// position in join order, never reused
    ordinal: u64,
    address: String,
    connection: Option<Arc<Connection>>,
    /// set exactly while the player is disconnected
    disconnect_time: Option<Instant>,
    desired: Participation,
}

impl PlayerEntry {
    pub fn id(&self) -> PlayerId {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &Player {
        &self.info
    }

    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    pub fn is_connected(&self) -> bool {
        self.info.connected
    }

    pub fn state(&self) -> PlayerState {
        self.info.state
    }

    pub fn connection(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref()
    }

    pub fn disconnect_time(&self) -> Option<Instant> {
        self.disconnect_time
    }

    pub fn desired(&self) -> Participation {
        self.desired
    }

    /// Connected and willing to draw and guess.
    pub fn is_participant(&self) -> bool {
        self.info.connected && self.desired == Participation::Player
    }

    pub fn set_state(&mut self, state: PlayerState) {
        self.info.state = state;
    }

    pub fn set_name(&mut self, name: String) {
        self.info.name = name;
    }

    pub fn set_desired(&mut self, desired: Participation) {
        self.desired = desired;
    }

    /// Closes and forgets the connection, if any.
    fn drop_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

/// Trims a requested display name and cuts it to `MAX_NAME_LENGTH`
/// characters. Empty names are refused.
pub fn sanitize_name(name: &str) -> Option<String> {
    let name: String = name.trim().chars().take(MAX_NAME_LENGTH).collect();
    let name = name.trim_end().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// All players of one lobby in join order.
pub struct PlayerRegistry {
    players: Vec<PlayerEntry>,
    next_ordinal: u64,
    max_players: usize,
    clients_per_ip_limit: usize,
    reconnect_grace: Duration,
}

impl PlayerRegistry {
    pub fn new(max_players: usize, clients_per_ip_limit: usize, reconnect_grace: Duration) -> Self {
        PlayerRegistry {
            players: Vec::new(),
            next_ordinal: 0,
            max_players,
            clients_per_ip_limit,
            reconnect_grace,
        }
    }

    /// Applies changed lobby settings. Lowering the limits never removes
    /// anybody, it only affects future joins.
    pub fn set_limits(&mut self, max_players: usize, clients_per_ip_limit: usize) {
        self.max_players = max_players;
        self.clients_per_ip_limit = clients_per_ip_limit;
    }

    /// Adds a new player with a fresh id.
    ///
    /// If the lobby is at capacity, the disconnected player with the oldest
    /// disconnect time whose grace period is over gets evicted and returned
    /// alongside the new player. Without such a candidate the join fails with
    /// `LobbyFull` and nothing is changed.
    pub fn join(
        &mut self,
        name: &str,
        address: &str,
        connection: Arc<Connection>,
        state: PlayerState,
        now: Instant,
    ) -> Result<(Player, Option<PlayerEntry>), LobbyError> {
        let same_address = self
            .players
            .iter()
            .filter(|p| p.is_connected() && p.address == address)
            .count();
        if same_address >= self.clients_per_ip_limit {
            return Err(LobbyError::TooManyClientsPerIp);
        }

        let evicted = if self.players.len() >= self.max_players {
            Some(
                self.evict_oldest_disconnected(now)
                    .ok_or(LobbyError::LobbyFull)?,
            )
        } else {
            None
        };

        let entry = PlayerEntry {
            info: Player {
                id: Uuid::new_v4(),
                name: name.to_string(),
                score: 0,
                last_score: 0,
                rank: 0,
                connected: true,
                state,
            },
            ordinal: self.next_ordinal,
            address: address.to_string(),
            connection: Some(connection),
            disconnect_time: None,
            desired: Participation::Player,
        };
        self.next_ordinal += 1;
        self.players.push(entry);
        self.recompute_ranks();

        let player = self.players[self.players.len() - 1].info.clone();
        Ok((player, evicted))
    }

    /// Attaches a new connection to a disconnected player.
    pub fn reconnect(
        &mut self,
        player_id: PlayerId,
        address: &str,
        connection: Arc<Connection>,
    ) -> Result<Player, LobbyError> {
        let entry = self
            .players
            .iter_mut()
            .find(|p| p.id() == player_id && !p.is_connected())
            .ok_or(LobbyError::UnknownPlayer)?;
        entry.connection = Some(connection);
        entry.disconnect_time = None;
        entry.info.connected = true;
        entry.address = address.to_string();
        Ok(entry.info.clone())
    }

    /// Marks a player as disconnected, keeping everything else.
    ///
    /// Returns whether the player was connected before.
    pub fn disconnect(&mut self, player_id: PlayerId, now: Instant) -> Result<bool, LobbyError> {
        let entry = self.get_mut(player_id).ok_or(LobbyError::UnknownPlayer)?;
        if !entry.is_connected() {
            return Ok(false);
        }
        entry.drop_connection();
        entry.info.connected = false;
        entry.disconnect_time = Some(now);
        Ok(true)
    }

    /// Like `disconnect`, but only if `connection_id` is still the player's
    /// current connection. A transport that noticed its peer going away
    /// must not disconnect a player that already reconnected elsewhere.
    pub fn connection_lost(&mut self, player_id: PlayerId, connection_id: ConnectionId, now: Instant) -> bool {
        let current = self
            .get(player_id)
            .and_then(|p| p.connection())
            .map(|c| c.id());
        if current != Some(connection_id) {
            return false;
        }
        self.disconnect(player_id, now).unwrap_or(false)
    }

    /// Removes the disconnected player that has been gone the longest, as
    /// long as their grace period is over. Join order breaks ties.
    pub fn evict_oldest_disconnected(&mut self, now: Instant) -> Option<PlayerEntry> {
        let grace = self.reconnect_grace;
        let index = self
            .players
            .iter()
            .enumerate()
            .filter_map(|(index, p)| {
                let since = p.disconnect_time?;
                if now.saturating_duration_since(since) >= grace {
                    Some((since, p.ordinal, index))
                } else {
                    None
                }
            })
            .min()
            .map(|(_, _, index)| index)?;
        let evicted = self.players.remove(index);
        info!(player = %evicted.id(), name = %evicted.name(), "evicted disconnected player");
        Some(evicted)
    }

    /// Removes a player for good, closing their connection.
    pub fn remove(&mut self, player_id: PlayerId) -> Option<PlayerEntry> {
        let index = self.players.iter().position(|p| p.id() == player_id)?;
        let mut entry = self.players.remove(index);
        entry.drop_connection();
        self.recompute_ranks();
        Some(entry)
    }

    /// Removes everybody, closing all connections.
    pub fn clear(&mut self) -> Vec<PlayerEntry> {
        let mut entries: Vec<PlayerEntry> = self.players.drain(..).collect();
        for entry in entries.iter_mut() {
            entry.drop_connection();
        }
        entries
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&PlayerEntry> {
        self.players.iter().find(|p| p.id() == player_id)
    }

    pub fn get_mut(&mut self, player_id: PlayerId) -> Option<&mut PlayerEntry> {
        self.players.iter_mut().find(|p| p.id() == player_id)
    }

    /// All players in join order.
    pub fn iter(&self) -> impl Iterator<Item = &PlayerEntry> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PlayerEntry> {
        self.players.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Adds points to a player's score and the score of the current turn,
    /// then recomputes all ranks.
    pub fn award(&mut self, player_id: PlayerId, points: i64) -> bool {
        match self.get_mut(player_id) {
            Some(entry) => {
                entry.info.score += points;
                entry.info.last_score += points;
                self.recompute_ranks();
                true
            }
            None => false,
        }
    }

    /// Forgets the points of the previous turn.
    pub fn reset_last_scores(&mut self) {
        for entry in self.players.iter_mut() {
            entry.info.last_score = 0;
        }
    }

    pub fn reset_scores(&mut self) {
        for entry in self.players.iter_mut() {
            entry.info.score = 0;
            entry.info.last_score = 0;
        }
        self.recompute_ranks();
    }

    /// Players ordered by score, highest first. Equal scores keep join order.
    pub fn standings(&self) -> Vec<&PlayerEntry> {
        let mut standings: Vec<&PlayerEntry> = self.players.iter().collect();
        standings.sort_by(|a, b| {
            b.info
                .score
                .cmp(&a.info.score)
                .then(a.ordinal.cmp(&b.ordinal))
        });
        standings
    }

    /// Dense ranking over `standings`: equal scores share a rank, the next
    /// lower score gets the next rank.
    pub fn recompute_ranks(&mut self) {
        let ranks: Vec<(PlayerId, usize)> = {
            let mut rank = 0;
            let mut last_score = None;
            self.standings()
                .into_iter()
                .map(|entry| {
                    if last_score != Some(entry.info.score) {
                        rank += 1;
                        last_score = Some(entry.info.score);
                    }
                    (entry.id(), rank)
                })
                .collect()
        };
        for (player_id, rank) in ranks {
            if let Some(entry) = self.get_mut(player_id) {
                entry.info.rank = rank;
            }
        }
    }

    /// Public view of all players in join order.
    pub fn snapshot(&self) -> Vec<Player> {
        self.players.iter().map(|p| p.info.clone()).collect()
    }
}
