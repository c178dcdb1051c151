use std::collections::{HashMap, HashSet};

use scribble_session_common::gamestate_common::{KickVote, PlayerId};

use crate::error::LobbyError;
use crate::registry::PlayerRegistry;

/// Votes needed to kick somebody, given the number of connected players
/// other than the target.
///
/// Half of them, rounded up, but never less than two: in a lobby of two
/// nobody can kick the other.
pub fn required_votes(connected_others: usize) -> usize {
    if connected_others < 2 {
        2
    } else {
        (connected_others + 1) / 2
    }
}

/// Anonymous kick votes, keyed by target.
///
/// Voter ids are only kept to reject double votes. Nothing that leaves this
/// type reveals who voted.
#[derive(Default)]
pub struct KickVoteTally {
    votes: HashMap<PlayerId, HashSet<PlayerId>>,
}

impl KickVoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a vote of `voter` against `target` and returns the resulting
    /// tally. Whether the vote succeeded is up to the caller to act on, see
    /// `KickVote::succeeded`.
    pub fn cast_vote(
        &mut self,
        registry: &PlayerRegistry,
        enabled: bool,
        voter: PlayerId,
        target: PlayerId,
    ) -> Result<KickVote, LobbyError> {
        if !enabled {
            return Err(LobbyError::VotekickDisabled);
        }
        let target_entry = registry.get(target).ok_or(LobbyError::UnknownPlayer)?;
        if voter == target {
            return Err(LobbyError::SelfVote);
        }
        let voters = self.votes.entry(target).or_default();
        if !voters.insert(voter) {
            return Err(LobbyError::AlreadyVoted);
        }

        let vote_count = voters
            .iter()
            .filter(|v| registry.get(**v).map_or(false, |p| p.is_connected()))
            .count();
        let connected_others = registry
            .iter()
            .filter(|p| p.is_connected() && p.id() != target)
            .count();

        Ok(KickVote {
            player_id: target,
            player_name: target_entry.name().to_string(),
            vote_count,
            required_vote_count: required_votes(connected_others),
        })
    }

    /// Drops all votes against `target`, after a kick or when the target
    /// left.
    pub fn discard_target(&mut self, target: PlayerId) {
        self.votes.remove(&target);
    }

    /// Drops all votes cast by `voter`.
    pub fn forget_voter(&mut self, voter: PlayerId) {
        for voters in self.votes.values_mut() {
            voters.remove(&voter);
        }
        self.votes.retain(|_, voters| !voters.is_empty());
    }

    pub fn clear(&mut self) {
        self.votes.clear();
    }

    pub fn votes_against(&self, target: PlayerId) -> usize {
        self.votes.get(&target).map_or(0, |voters| voters.len())
    }
}
