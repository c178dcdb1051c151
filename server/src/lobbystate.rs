//! The lobby: player registry, kick votes and the turn state machine behind
//! one lobby-wide lock.
//!
//! Every public operation runs to completion under that lock, so no other
//! operation ever sees a half-applied transition. Sends to the players happen
//! under the lock as well; they never block since every transport only
//! enqueues. Players whose sends fail are collected while an operation runs
//! and disconnected before the lock is released.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use delegate::delegate;
use parking_lot::Mutex;
use scribble_session_common::gamestate_common::*;
use scribble_session_common::messages_common::{ClientEvent, ServerEvent};
use scribble_session_common::settings_common::LobbySettings;
use tracing::{debug, error, info, warn};

use crate::broadcast::{self, knows_word, Audience};
use crate::config::LobbyConfig;
use crate::connection::{Connection, ConnectionId};
use crate::error::LobbyError;
use crate::kickvote::KickVoteTally;
use crate::registry::{sanitize_name, Participation, PlayerEntry, PlayerRegistry};
use crate::rewardstrategy::GuessContext;
use crate::timer::{TimerEvent, TurnTimer};
use crate::turn::{next_drawer, Turn, TurnPhase};
use crate::words::WordSource;

const DEFAULT_PLAYER_NAME: &str = "Player";

/// Shared handle to a lobby. Cloning is cheap, all clones act on the same
/// lobby.
#[derive(Clone)]
pub struct Lobby {
    state: Arc<Mutex<LobbyInner>>,
}

impl Lobby {
    pub fn new(config: LobbyConfig, words: Box<dyn WordSource>) -> Result<Lobby, LobbyError> {
        config.validate()?;
        let state = Arc::new_cyclic(|me| Mutex::new(LobbyInner::new(config, words, me.clone())));
        Ok(Lobby { state })
    }

    delegate! {
        to self.state.lock() {
            pub fn join(&self, name: &str, address: &str, connection: Arc<Connection>) -> Result<Player, LobbyError>;
            pub fn reconnect(&self, player_id: PlayerId, address: &str, connection: Arc<Connection>) -> Result<Player, LobbyError>;
            pub fn disconnect(&self, player_id: PlayerId) -> Result<(), LobbyError>;
            pub fn connection_lost(&self, player_id: PlayerId, connection_id: ConnectionId) -> bool;
            pub fn handle_event(&self, player_id: PlayerId, event: ClientEvent) -> Result<(), LobbyError>;
            pub fn handle_frame(&self, player_id: PlayerId, frame: &[u8]) -> Result<(), LobbyError>;
            pub fn update_settings(&self, caller: PlayerId, settings: LobbySettings) -> Result<(), LobbyError>;
            pub fn restart(&self, caller: PlayerId) -> Result<(), LobbyError>;
            pub fn shutdown(&self);
            pub fn on_timer(&self, generation: u64, event: TimerEvent) -> bool;
            pub fn lobby_state(&self) -> LobbyState;
            pub fn phase(&self) -> Option<TurnPhase>;
            pub fn round(&self) -> u32;
            pub fn players(&self) -> Vec<Player>;
            pub fn owner(&self) -> Option<PlayerId>;
            pub fn drawer(&self) -> Option<PlayerId>;
            pub fn settings(&self) -> LobbySettings;
            pub fn turn_generation(&self) -> u64;
            pub fn kick_votes_against(&self, target: PlayerId) -> usize;
        }
    }
}

pub struct LobbyInner {
    config: LobbyConfig,
    words: Box<dyn WordSource>,
    registry: PlayerRegistry,
    kick_votes: KickVoteTally,
    state: LobbyState,
    owner: Option<PlayerId>,
    round: u32,
    turn: Option<Turn>,
    /// join ordinal of the most recent drawer
    last_drawer: Option<u64>,
    previous_word: Option<String>,
    /// bumped whenever a timer is started or the turn state moves on without
    /// one, timers of older generations are ignored
    generation: u64,
    timer: Option<TurnTimer>,
    /// players whose connection failed during the current operation
    failed: Vec<PlayerId>,
    me: Weak<Mutex<LobbyInner>>,
}

impl LobbyInner {
    fn new(config: LobbyConfig, words: Box<dyn WordSource>, me: Weak<Mutex<LobbyInner>>) -> Self {
        let registry = PlayerRegistry::new(
            config.settings.max_players,
            config.settings.clients_per_ip_limit,
            config.reconnect_grace,
        );
        LobbyInner {
            config,
            words,
            registry,
            kick_votes: KickVoteTally::new(),
            state: LobbyState::Unstarted,
            owner: None,
            round: 0,
            turn: None,
            last_drawer: None,
            previous_word: None,
            generation: 0,
            timer: None,
            failed: Vec::new(),
            me,
        }
    }

    /// Adds a new player and brings everybody up to date. The new player
    /// receives `ready`, everyone else `update-players`.
    pub fn join(&mut self, name: &str, address: &str, connection: Arc<Connection>) -> Result<Player, LobbyError> {
        let name = sanitize_name(name).unwrap_or_else(|| DEFAULT_PLAYER_NAME.to_string());
        let state = if self.is_drawing() {
            PlayerState::Guessing
        } else {
            PlayerState::Standby
        };
        let (player, evicted) = self
            .registry
            .join(&name, address, connection, state, Instant::now())?;
        info!(player = %player.id, name = %player.name, address, "player joined");

        if let Some(evicted) = evicted {
            self.player_removed(evicted.id());
        }
        if self.owner.is_none() {
            self.owner = Some(player.id);
        }

        self.send_ready(player.id);
        self.broadcast_players(Audience::AllExcept(player.id));
        self.flush_failures();
        Ok(player)
    }

    /// Attaches a new connection to a disconnected player. Score, name and
    /// id are kept.
    pub fn reconnect(
        &mut self,
        player_id: PlayerId,
        address: &str,
        connection: Arc<Connection>,
    ) -> Result<Player, LobbyError> {
        let player = self.registry.reconnect(player_id, address, connection)?;
        info!(player = %player.id, name = %player.name, "player reconnected");

        self.send_ready(player_id);
        let pending_choice = self
            .turn
            .as_ref()
            .filter(|turn| turn.drawer() == player_id && turn.phase() == TurnPhase::AwaitingWordChoice)
            .map(|turn| turn.candidates().to_vec());
        if let Some(candidates) = pending_choice {
            self.send_to(player_id, &ServerEvent::YourTurn(candidates));
        }
        self.broadcast_players(Audience::AllExcept(player_id));
        self.flush_failures();
        Ok(player)
    }

    pub fn disconnect(&mut self, player_id: PlayerId) -> Result<(), LobbyError> {
        if self.registry.disconnect(player_id, Instant::now())? {
            info!(player = %player_id, "player disconnected");
            self.player_left();
        }
        self.flush_failures();
        Ok(())
    }

    /// Called by a transport that lost its peer. Ignored if the player has
    /// reconnected over another connection in the meantime.
    pub fn connection_lost(&mut self, player_id: PlayerId, connection_id: ConnectionId) -> bool {
        let lost = self
            .registry
            .connection_lost(player_id, connection_id, Instant::now());
        if lost {
            info!(player = %player_id, "connection lost");
            self.player_left();
            self.flush_failures();
        }
        lost
    }

    fn player_left(&mut self) {
        self.broadcast_players(Audience::All);
        self.end_turn_if_nobody_guessing();
    }

    /// Applies one event of a connected player. Errors caused by the event
    /// are also reported to that player as `system-message`.
    pub fn handle_event(&mut self, player_id: PlayerId, event: ClientEvent) -> Result<(), LobbyError> {
        debug!(player = %player_id, kind = event.kind(), "received event");
        if !self.registry.get(player_id).map_or(false, |p| p.is_connected()) {
            return Err(LobbyError::UnknownPlayer);
        }

        let result = match event {
            ClientEvent::Start => self.start(player_id),
            ClientEvent::RequestDrawing => self.request_drawing(player_id),
            ClientEvent::ChooseWord(index) => self.choose_word(player_id, index),
            ClientEvent::Undo => self.undo(player_id),
            ClientEvent::KickVote(target) => self.kick_vote(player_id, target),
            ClientEvent::NameChange(name) => self.rename(player_id, &name),
            ClientEvent::Message(text) => self.message(player_id, &text),
            ClientEvent::Line(line) => self.draw(player_id, DrawingInstruction::Line(line)),
            ClientEvent::Fill(fill) => self.draw(player_id, DrawingInstruction::Fill(fill)),
            ClientEvent::ClearDrawingBoard => self.clear_drawing(player_id),
            ClientEvent::ToggleSpectate => self.toggle_spectate(player_id),
        };
        if let Err(err) = &result {
            self.report(player_id, err);
        }
        self.flush_failures();
        result
    }

    /// Parses a raw frame and applies it.
    pub fn handle_frame(&mut self, player_id: PlayerId, frame: &[u8]) -> Result<(), LobbyError> {
        match ClientEvent::parse(frame) {
            Ok(event) => self.handle_event(player_id, event),
            Err(err) => {
                if !self.registry.get(player_id).map_or(false, |p| p.is_connected()) {
                    return Err(LobbyError::UnknownPlayer);
                }
                let err = LobbyError::InvalidEvent(err.to_string());
                self.report(player_id, &err);
                self.flush_failures();
                Err(err)
            }
        }
    }

    fn report(&mut self, player_id: PlayerId, err: &LobbyError) {
        warn!(player = %player_id, "rejected event: {}", err);
        if err.is_client_facing() {
            self.send_to(player_id, &ServerEvent::SystemMessage(err.to_string()));
        }
    }

    fn start(&mut self, caller: PlayerId) -> Result<(), LobbyError> {
        if self.owner != Some(caller) {
            return Err(LobbyError::NotLobbyOwner);
        }
        if self.state == LobbyState::Ongoing {
            return Err(LobbyError::InvalidEvent("The game is already running.".to_string()));
        }
        let participants = self.registry.iter().filter(|p| p.is_participant()).count();
        if participants < 2 {
            return Err(LobbyError::NotEnoughPlayers);
        }
        if self.state == LobbyState::GameOver {
            self.reset_game();
        }

        info!(participants, rounds = self.config.settings.rounds, "game started");
        self.state = LobbyState::Ongoing;
        self.round = 1;
        self.last_drawer = None;
        self.previous_word = None;
        self.begin_turn();
        Ok(())
    }

    /// Picks the next drawer and offers them words. Ends the game instead
    /// if the last round is over or nobody is left to draw.
    fn begin_turn(&mut self) {
        self.cancel_timer();
        self.generation += 1;

        let (drawer, ordinal, wrapped) = match next_drawer(&self.registry, self.last_drawer) {
            Some(next) => next,
            None => {
                warn!("nobody left to draw");
                return self.game_over();
            }
        };
        if wrapped {
            if self.round >= self.config.settings.rounds {
                return self.game_over();
            }
            self.round += 1;
        }

        let candidates = self.words.candidates(
            self.config.word_choice_count.max(1),
            &self.config.custom_words,
            self.config.settings.custom_words_chance,
        );
        if candidates.is_empty() {
            error!("no words available");
            return self.game_over();
        }

        for entry in self.registry.iter_mut() {
            let state = if entry.id() == drawer {
                PlayerState::Drawing
            } else if entry.desired() == Participation::Spectator {
                PlayerState::Spectating
            } else {
                PlayerState::Standby
            };
            entry.set_state(state);
        }
        self.last_drawer = Some(ordinal);
        self.turn = Some(Turn::new(drawer, candidates.clone()));
        info!(drawer = %drawer, round = self.round, "next turn");

        let next_turn = NextTurn {
            previous_word: self.previous_word.clone(),
            players: self.registry.snapshot(),
            round: self.round,
            round_end_time: 0,
        };
        self.broadcast(&ServerEvent::NextTurn(next_turn), Audience::All);
        self.send_to(drawer, &ServerEvent::YourTurn(candidates));

        let schedule = vec![(self.config.word_choice_time, TimerEvent::WordChoiceTimeout)];
        self.spawn_timer(schedule);
    }

    fn choose_word(&mut self, caller: PlayerId, index: usize) -> Result<(), LobbyError> {
        let turn = match &self.turn {
            Some(turn) if self.state == LobbyState::Ongoing => turn,
            _ => return Err(LobbyError::InvalidEvent("There is no word to choose.".to_string())),
        };
        if turn.drawer() != caller {
            return Err(LobbyError::NotYourTurn);
        }
        if turn.phase() != TurnPhase::AwaitingWordChoice {
            return Err(LobbyError::InvalidEvent("The word has already been chosen.".to_string()));
        }
        if index >= turn.candidates().len() {
            return Err(LobbyError::InvalidEvent(format!("There is no word number {}.", index)));
        }
        self.start_drawing(index);
        Ok(())
    }

    fn start_drawing(&mut self, index: usize) {
        self.cancel_timer();
        self.generation += 1;

        let drawing_time = self.config.drawing_time();
        let reveals = match self.turn.as_mut().and_then(|turn| {
            turn.choose(index, drawing_time)?;
            turn.hints().map(|hints| hints.reveal_budget())
        }) {
            Some(reveals) => reveals,
            None => return,
        };

        self.registry.reset_last_scores();
        for entry in self.registry.iter_mut() {
            if entry.state() == PlayerState::Standby {
                entry.set_state(PlayerState::Guessing);
            }
        }
        debug!(reveals, "word chosen");

        self.broadcast_players(Audience::All);
        self.broadcast_hints(Audience::All);

        let mut schedule: Vec<(Duration, TimerEvent)> = (1..=reveals as u32)
            .map(|i| (drawing_time * i / (reveals as u32 + 1), TimerEvent::RevealHint))
            .collect();
        schedule.push((drawing_time, TimerEvent::TurnEnd));
        self.spawn_timer(schedule);
    }

    /// Ends the running turn and starts the next one, or ends the game.
    fn end_turn(&mut self) {
        let turn = match self.turn.take() {
            Some(turn) => turn,
            None => return,
        };
        self.cancel_timer();
        self.previous_word = turn.word().map(str::to_string);
        debug!(word = ?self.previous_word, guessed = turn.correct_guessers(), "turn ended");
        self.begin_turn();
    }

    fn end_turn_if_nobody_guessing(&mut self) {
        if !self.is_drawing() {
            return;
        }
        let guessing = self
            .registry
            .iter()
            .any(|p| p.is_connected() && p.state() == PlayerState::Guessing);
        if !guessing {
            self.end_turn();
        }
    }

    fn game_over(&mut self) {
        self.cancel_timer();
        self.generation += 1;
        self.state = LobbyState::GameOver;
        self.turn = None;
        self.apply_desired_states();
        info!(round = self.round, "game over");

        let previous_word = self.previous_word.clone();
        let delivery = broadcast::broadcast_with(&self.registry, Audience::All, |entry| {
            Some(ServerEvent::GameOver(Box::new(GameOverEvent {
                ready: self.ready_for(entry),
                previous_word: previous_word.clone(),
            })))
        });
        self.failed.extend(delivery.failed);
    }

    /// Back to `Unstarted`: scores, rounds and the drawing are gone.
    fn reset_game(&mut self) {
        self.cancel_timer();
        self.generation += 1;
        self.state = LobbyState::Unstarted;
        self.round = 0;
        self.turn = None;
        self.last_drawer = None;
        self.previous_word = None;
        self.registry.reset_scores();
        self.apply_desired_states();
    }

    /// Manually resets the lobby. Every player receives a fresh `ready`.
    pub fn restart(&mut self, caller: PlayerId) -> Result<(), LobbyError> {
        if self.owner != Some(caller) {
            return Err(LobbyError::NotLobbyOwner);
        }
        self.reset_game();
        info!("lobby restarted");
        let delivery = broadcast::broadcast_with(&self.registry, Audience::All, |entry| {
            Some(ServerEvent::Ready(Box::new(self.ready_for(entry))))
        });
        self.failed.extend(delivery.failed);
        self.flush_failures();
        Ok(())
    }

    /// Outside of a turn everybody is either waiting or spectating, as they
    /// wish.
    fn apply_desired_states(&mut self) {
        for entry in self.registry.iter_mut() {
            let state = match entry.desired() {
                Participation::Player => PlayerState::Standby,
                Participation::Spectator => PlayerState::Spectating,
            };
            entry.set_state(state);
        }
    }

    fn spawn_timer(&mut self, schedule: Vec<(Duration, TimerEvent)>) {
        let lobby = self.me.clone();
        self.timer = Some(TurnTimer::spawn(self.generation, schedule, move |generation, event| {
            match lobby.upgrade() {
                Some(state) => state.lock().on_timer(generation, event),
                None => false,
            }
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    /// Applies a timer event. Events of an outdated generation are ignored.
    /// Returns whether the timer should keep running.
    pub fn on_timer(&mut self, generation: u64, event: TimerEvent) -> bool {
        if generation != self.generation || self.state != LobbyState::Ongoing {
            debug!(generation, current = self.generation, ?event, "ignoring stale timer");
            return false;
        }
        let keep_running = match event {
            TimerEvent::WordChoiceTimeout => {
                if self.phase() == Some(TurnPhase::AwaitingWordChoice) {
                    debug!("word choice timed out");
                    self.start_drawing(0);
                }
                false
            }
            TimerEvent::RevealHint => {
                let revealed = self
                    .turn
                    .as_mut()
                    .and_then(|turn| turn.hints_mut())
                    .map_or(false, |hints| hints.reveal_random());
                if revealed {
                    self.broadcast_hints(Audience::GuessersOnly);
                }
                true
            }
            TimerEvent::TurnEnd => {
                self.end_turn();
                false
            }
        };
        self.flush_failures();
        keep_running
    }

    fn message(&mut self, caller: PlayerId, text: &str) -> Result<(), LobbyError> {
        let content = text.trim();
        if content.is_empty() {
            return Ok(());
        }
        let entry = self.registry.get(caller).ok_or(LobbyError::UnknownPlayer)?;
        let state = entry.state();
        let outgoing = OutgoingMessage {
            author: entry.name().to_string(),
            author_id: caller,
            content: content.to_string(),
        };

        if !self.is_drawing() {
            self.broadcast(&ServerEvent::Message(outgoing), Audience::All);
            return Ok(());
        }
        if state != PlayerState::Guessing {
            self.broadcast(&ServerEvent::NonGuessingPlayerMessage(outgoing), Audience::NonGuessing);
            return Ok(());
        }

        let (correct, close) = match &self.turn {
            Some(turn) => (turn.is_correct(content), turn.is_close(content)),
            None => (false, false),
        };
        if correct {
            self.correct_guess(caller);
        } else {
            if close {
                self.send_to(caller, &ServerEvent::CloseGuess(content.to_string()));
            }
            self.broadcast(&ServerEvent::Message(outgoing), Audience::All);
        }
        Ok(())
    }

    fn correct_guess(&mut self, guesser: PlayerId) {
        let still_guessing = self
            .registry
            .iter()
            .filter(|p| p.state() == PlayerState::Guessing)
            .count();
        let drawing_time = self.config.drawing_time();
        let (drawer, context) = match self.turn.as_mut() {
            Some(turn) => {
                let already_guessed = turn.correct_guessers();
                let context = GuessContext {
                    number_of_guessers: still_guessing + already_guessed,
                    players_already_guessed: turn.record_correct_guess(),
                    time_left: turn.time_left(),
                    drawing_time,
                };
                (turn.drawer(), context)
            }
            None => return,
        };

        let guesser_points = self.config.guesser_reward.reward_points_to_guesser(&context);
        let drawer_points = self.config.drawer_reward.reward_points_to_drawer(&context);
        self.registry.award(guesser, guesser_points);
        self.registry.award(drawer, drawer_points);
        if let Some(entry) = self.registry.get_mut(guesser) {
            entry.set_state(PlayerState::Standby);
        }
        info!(player = %guesser, points = guesser_points, "correct guess");

        self.broadcast(&ServerEvent::CorrectGuess(guesser), Audience::All);
        self.broadcast_players(Audience::All);
        self.broadcast_hints(Audience::Single(guesser));
        self.end_turn_if_nobody_guessing();
    }

    fn rename(&mut self, caller: PlayerId, name: &str) -> Result<(), LobbyError> {
        let name = sanitize_name(name)
            .ok_or_else(|| LobbyError::InvalidEvent("The name must not be empty.".to_string()))?;
        let entry = self.registry.get_mut(caller).ok_or(LobbyError::UnknownPlayer)?;
        debug!(player = %caller, from = %entry.name(), to = %name, "renamed");
        entry.set_name(name.clone());
        let event = ServerEvent::NameChange(NameChangeEvent {
            player_id: caller,
            player_name: name,
        });
        self.broadcast(&event, Audience::All);
        Ok(())
    }

    /// The running turn, if `caller` is its drawer.
    fn drawer_turn(&mut self, caller: PlayerId) -> Result<&mut Turn, LobbyError> {
        match self.turn.as_mut() {
            Some(turn) if turn.drawer() == caller => Ok(turn),
            _ => Err(LobbyError::NotYourTurn),
        }
    }

    fn draw(&mut self, caller: PlayerId, instruction: DrawingInstruction) -> Result<(), LobbyError> {
        let turn = self.drawer_turn(caller)?;
        if turn.phase() != TurnPhase::Drawing {
            return Err(LobbyError::InvalidEvent("Choose a word first.".to_string()));
        }
        turn.push_instruction(instruction);
        let event = match instruction {
            DrawingInstruction::Line(line) => ServerEvent::Line(line),
            DrawingInstruction::Fill(fill) => ServerEvent::Fill(fill),
        };
        self.broadcast(&event, Audience::AllExcept(caller));
        Ok(())
    }

    fn clear_drawing(&mut self, caller: PlayerId) -> Result<(), LobbyError> {
        let turn = self.drawer_turn(caller)?;
        if turn.phase() != TurnPhase::Drawing {
            return Err(LobbyError::InvalidEvent("Choose a word first.".to_string()));
        }
        turn.clear_drawing();
        self.broadcast(&ServerEvent::ClearDrawingBoard, Audience::AllExcept(caller));
        Ok(())
    }

    fn undo(&mut self, caller: PlayerId) -> Result<(), LobbyError> {
        let turn = self.drawer_turn(caller)?;
        if !turn.undo() {
            return Ok(());
        }
        let drawing = turn.drawing().to_vec();
        self.broadcast(&ServerEvent::Drawing(drawing), Audience::All);
        Ok(())
    }

    fn request_drawing(&mut self, caller: PlayerId) -> Result<(), LobbyError> {
        let drawing = self
            .turn
            .as_ref()
            .map(|turn| turn.drawing().to_vec())
            .unwrap_or_default();
        self.send_to(caller, &ServerEvent::Drawing(drawing));
        Ok(())
    }

    fn kick_vote(&mut self, voter: PlayerId, target: PlayerId) -> Result<(), LobbyError> {
        let vote = self.kick_votes.cast_vote(
            &self.registry,
            self.config.settings.enable_votekick,
            voter,
            target,
        )?;
        debug!(target = %target, votes = vote.vote_count, required = vote.required_vote_count, "kick vote");
        let succeeded = vote.succeeded();
        self.broadcast(&ServerEvent::KickVote(vote), Audience::All);
        if succeeded {
            self.kick(target);
        }
        Ok(())
    }

    /// Removes a player for good and closes their connection.
    fn kick(&mut self, target: PlayerId) {
        self.send_to(
            target,
            &ServerEvent::SystemMessage("You have been kicked from the lobby.".to_string()),
        );
        if let Some(entry) = self.registry.remove(target) {
            info!(player = %target, name = %entry.name(), "player kicked");
        }
        self.failed.retain(|id| *id != target);
        self.player_removed(target);
        self.broadcast_players(Audience::All);
        self.end_turn_if_nobody_guessing();
    }

    /// Cleans up after a player left the registry. A removed drawer ends
    /// the running turn.
    fn player_removed(&mut self, player_id: PlayerId) {
        self.kick_votes.discard_target(player_id);
        self.kick_votes.forget_voter(player_id);
        if self.owner == Some(player_id) {
            self.hand_over_ownership();
        }
        if self.drawer() == Some(player_id) {
            info!(player = %player_id, "drawer left the lobby, ending turn");
            self.broadcast(&ServerEvent::DrawerKicked, Audience::All);
            self.end_turn();
        }
    }

    fn hand_over_ownership(&mut self) {
        self.owner = self
            .registry
            .iter()
            .find(|p| p.is_connected())
            .map(PlayerEntry::id);
        let owner = self
            .owner
            .and_then(|id| self.registry.get(id))
            .map(|entry| OwnerChangeEvent {
                player_id: entry.id(),
                player_name: entry.name().to_string(),
            });
        if let Some(owner) = owner {
            info!(player = %owner.player_id, "lobby owner changed");
            self.broadcast(&ServerEvent::OwnerChange(owner), Audience::All);
        }
    }

    fn toggle_spectate(&mut self, caller: PlayerId) -> Result<(), LobbyError> {
        let ongoing = self.state == LobbyState::Ongoing;
        let entry = self.registry.get_mut(caller).ok_or(LobbyError::UnknownPlayer)?;
        let desired = match entry.desired() {
            Participation::Player => Participation::Spectator,
            Participation::Spectator => Participation::Player,
        };
        entry.set_desired(desired);

        if ongoing {
            let text = match desired {
                Participation::Spectator => "You will be spectating from the next turn on.",
                Participation::Player => "You will be playing from the next turn on.",
            };
            self.send_to(caller, &ServerEvent::SystemMessage(text.to_string()));
        } else {
            entry.set_state(match desired {
                Participation::Player => PlayerState::Standby,
                Participation::Spectator => PlayerState::Spectating,
            });
            self.broadcast_players(Audience::All);
        }
        Ok(())
    }

    /// Replaces the editable settings. Only the owner may do this. Lowering
    /// the player limit never removes anybody.
    pub fn update_settings(&mut self, caller: PlayerId, settings: LobbySettings) -> Result<(), LobbyError> {
        if self.owner != Some(caller) {
            return Err(LobbyError::NotLobbyOwner);
        }
        settings.validate()?;
        self.registry
            .set_limits(settings.max_players, settings.clients_per_ip_limit);
        self.config.settings = settings.clone();
        info!(?settings, "lobby settings changed");
        self.broadcast(&ServerEvent::LobbySettingsChanged(settings), Audience::All);
        self.flush_failures();
        Ok(())
    }

    /// Tells everybody the lobby is closing and drops all players.
    pub fn shutdown(&mut self) {
        self.cancel_timer();
        self.generation += 1;
        self.broadcast(&ServerEvent::Shutdown, Audience::All);
        self.failed.clear();
        self.turn = None;
        self.owner = None;
        self.kick_votes.clear();
        let players = self.registry.clear();
        info!(players = players.len(), "lobby shut down");
    }

    fn broadcast(&mut self, event: &ServerEvent, audience: Audience) {
        let delivery = broadcast::broadcast(&self.registry, event, audience);
        self.failed.extend(delivery.failed);
    }

    fn send_to(&mut self, player_id: PlayerId, event: &ServerEvent) {
        self.broadcast(event, Audience::Single(player_id));
    }

    fn broadcast_players(&mut self, audience: Audience) {
        let event = ServerEvent::UpdatePlayers(self.registry.snapshot());
        self.broadcast(&event, audience);
    }

    fn broadcast_hints(&mut self, audience: Audience) {
        let hints = match self.turn.as_ref().and_then(|turn| turn.hints()) {
            Some(hints) => hints,
            None => return,
        };
        let delivery = broadcast::broadcast_word_hints(&self.registry, hints, audience);
        self.failed.extend(delivery.failed);
    }

    fn send_ready(&mut self, player_id: PlayerId) {
        let ready = match self.registry.get(player_id) {
            Some(entry) => self.ready_for(entry),
            None => return,
        };
        self.send_to(player_id, &ServerEvent::Ready(Box::new(ready)));
    }

    /// Full snapshot of the lobby as seen by `entry`.
    fn ready_for(&self, entry: &PlayerEntry) -> Ready {
        let word_hints = match self.turn.as_ref().and_then(|turn| turn.hints()) {
            Some(hints) if knows_word(entry) => hints.full(),
            Some(hints) => hints.partial(),
            None => Vec::new(),
        };
        Ready {
            player_id: entry.id(),
            player_name: entry.name().to_string(),
            allow_drawing: entry.desired() == Participation::Player,
            votekick_enabled: self.config.settings.enable_votekick,
            game_state: self.state,
            owner_id: self.owner,
            round: self.round,
            rounds: self.config.settings.rounds,
            round_end_time: self.turn.as_ref().map_or(0, |turn| turn.round_end_time()),
            drawing_time_setting: self.config.settings.drawing_time,
            word_hints,
            players: self.registry.snapshot(),
            current_drawing: self
                .turn
                .as_ref()
                .map(|turn| turn.drawing().to_vec())
                .unwrap_or_default(),
        }
    }

    /// Disconnects every player whose connection failed during the current
    /// operation and tells the others. Repeats until a round of sends goes
    /// through without new failures.
    fn flush_failures(&mut self) {
        while !self.failed.is_empty() {
            let failed = std::mem::take(&mut self.failed);
            let now = Instant::now();
            let mut changed = false;
            for player_id in failed {
                if let Ok(true) = self.registry.disconnect(player_id, now) {
                    warn!(player = %player_id, "connection failed, player disconnected");
                    changed = true;
                }
            }
            if changed {
                self.player_left();
            }
        }
    }

    fn is_drawing(&self) -> bool {
        self.state == LobbyState::Ongoing && self.phase() == Some(TurnPhase::Drawing)
    }

    pub fn lobby_state(&self) -> LobbyState {
        self.state
    }

    pub fn phase(&self) -> Option<TurnPhase> {
        self.turn.as_ref().map(Turn::phase)
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn players(&self) -> Vec<Player> {
        self.registry.snapshot()
    }

    pub fn owner(&self) -> Option<PlayerId> {
        self.owner
    }

    pub fn drawer(&self) -> Option<PlayerId> {
        self.turn.as_ref().map(Turn::drawer)
    }

    pub fn settings(&self) -> LobbySettings {
        self.config.settings.clone()
    }

    pub fn turn_generation(&self) -> u64 {
        self.generation
    }

    pub fn kick_votes_against(&self, target: PlayerId) -> usize {
        self.kick_votes.votes_against(target)
    }
}
