use std::thread;
use std::time::{Duration, Instant};

use scribble_session_common::gamestate_common::*;
use scribble_session_common::messages_common::{ClientEvent, ServerEvent};
use scribble_session_common::settings_common::LobbySettings;
use scribble_session_server::config::LobbyConfig;
use scribble_session_server::connection::{Connection, MemoryChannel, MemoryReceiver};
use scribble_session_server::error::LobbyError;
use scribble_session_server::lobbystate::Lobby;
use scribble_session_server::timer::TimerEvent;
use scribble_session_server::turn::TurnPhase;
use scribble_session_server::words::WordSource;

/// Always offers the same words, in order.
struct FixedWords(Vec<String>);

impl WordSource for FixedWords {
    fn candidates(&mut self, count: usize, _custom_words: &[String], _custom_words_chance: u8) -> Vec<String> {
        self.0.iter().take(count).cloned().collect()
    }
}

struct Client {
    id: PlayerId,
    rx: MemoryReceiver,
}

impl Client {
    fn events(&self) -> Vec<ServerEvent> {
        self.rx.events()
    }

    fn send(&self, lobby: &Lobby, event: ClientEvent) -> Result<(), LobbyError> {
        lobby.handle_event(self.id, event)
    }
}

fn config() -> LobbyConfig {
    let mut config = LobbyConfig::default();
    config.settings.clients_per_ip_limit = 24;
    config.settings.drawing_time = 60;
    config.reconnect_grace = Duration::ZERO;
    config
}

fn lobby(config: LobbyConfig) -> Lobby {
    let words = FixedWords(vec!["apple".to_string(), "banana".to_string(), "cherry".to_string()]);
    Lobby::new(config, Box::new(words)).unwrap()
}

fn join(lobby: &Lobby, name: &str) -> Client {
    let (channel, rx) = MemoryChannel::bounded(256);
    let player = lobby.join(name, "127.0.0.1", Connection::new(channel)).unwrap();
    Client { id: player.id, rx }
}

fn join_all(lobby: &Lobby, count: usize) -> Vec<Client> {
    let clients: Vec<Client> = (0..count).map(|i| join(lobby, &format!("player{}", i))).collect();
    for client in clients.iter() {
        client.events();
    }
    clients
}

/// Starts the game and lets the first drawer pick "apple".
fn start_with_apple(lobby: &Lobby, clients: &[Client]) {
    clients[0].send(lobby, ClientEvent::Start).unwrap();
    clients[0].send(lobby, ClientEvent::ChooseWord(0)).unwrap();
    for client in clients {
        client.events();
    }
}

fn player(lobby: &Lobby, id: PlayerId) -> Player {
    lobby.players().into_iter().find(|p| p.id == id).unwrap()
}

fn hints(events: &[ServerEvent]) -> Vec<Vec<WordHint>> {
    events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::UpdateWordhint(hints) => Some(hints.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn join_sends_ready_and_updates_others() {
    let lobby = lobby(config());
    let a = join(&lobby, "anna");
    let events = a.events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServerEvent::Ready(ready) => {
            assert_eq!(ready.player_id, a.id);
            assert_eq!(ready.owner_id, Some(a.id));
            assert_eq!(ready.game_state, LobbyState::Unstarted);
            assert_eq!(ready.round_end_time, 0);
        }
        other => panic!("expected ready, got {:?}", other),
    }

    let b = join(&lobby, "  bert  ");
    assert!(matches!(b.events()[0], ServerEvent::Ready(_)));
    match a.events().as_slice() {
        [ServerEvent::UpdatePlayers(players)] => {
            assert_eq!(players.len(), 2);
            assert_eq!(players[1].name, "bert");
        }
        other => panic!("expected update-players, got {:?}", other),
    }
}

#[test]
fn start_needs_owner_and_two_players() {
    let lobby = lobby(config());
    let a = join(&lobby, "anna");
    a.events();

    assert_eq!(a.send(&lobby, ClientEvent::Start), Err(LobbyError::NotEnoughPlayers));
    assert!(matches!(a.events().as_slice(), [ServerEvent::SystemMessage(_)]));

    let b = join(&lobby, "bert");
    b.events();
    assert_eq!(b.send(&lobby, ClientEvent::Start), Err(LobbyError::NotLobbyOwner));
    assert_eq!(lobby.lobby_state(), LobbyState::Unstarted);
}

#[test]
fn start_offers_words_to_first_drawer() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 2);
    clients[0].send(&lobby, ClientEvent::Start).unwrap();

    assert_eq!(lobby.lobby_state(), LobbyState::Ongoing);
    assert_eq!(lobby.phase(), Some(TurnPhase::AwaitingWordChoice));
    assert_eq!(lobby.drawer(), Some(clients[0].id));
    assert_eq!(lobby.round(), 1);

    let events = clients[0].events();
    assert!(matches!(&events[0], ServerEvent::NextTurn(next) if next.round == 1 && next.previous_word.is_none()));
    assert_eq!(
        events[1],
        ServerEvent::YourTurn(vec!["apple".to_string(), "banana".to_string(), "cherry".to_string()])
    );
    let events = clients[1].events();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ServerEvent::NextTurn(_)));
}

#[test]
fn choose_word_from_non_drawer_is_rejected() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 2);
    clients[0].send(&lobby, ClientEvent::Start).unwrap();
    clients[1].events();

    assert_eq!(
        clients[1].send(&lobby, ClientEvent::ChooseWord(0)),
        Err(LobbyError::NotYourTurn)
    );
    assert_eq!(lobby.phase(), Some(TurnPhase::AwaitingWordChoice));
    assert_eq!(
        clients[1].events(),
        vec![ServerEvent::SystemMessage(LobbyError::NotYourTurn.to_string())]
    );
}

#[test]
fn case_only_difference_is_a_correct_guess() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 3);
    start_with_apple(&lobby, &clients);

    clients[1].send(&lobby, ClientEvent::Message("appl".to_string())).unwrap();
    let events = clients[1].events();
    assert_eq!(events[0], ServerEvent::CloseGuess("appl".to_string()));
    assert!(matches!(&events[1], ServerEvent::Message(message) if message.content == "appl"));
    assert!(!events.iter().any(|e| matches!(e, ServerEvent::CorrectGuess(_))));
    assert_eq!(player(&lobby, clients[1].id).score, 0);

    clients[1].send(&lobby, ClientEvent::Message("Apple".to_string())).unwrap();
    let events = clients[2].events();
    assert!(events.contains(&ServerEvent::CorrectGuess(clients[1].id)));
    assert!(!events
        .iter()
        .any(|e| matches!(e, ServerEvent::Message(message) if message.content == "Apple")));

    let guesser = player(&lobby, clients[1].id);
    let drawer = player(&lobby, clients[0].id);
    assert!(guesser.score > 0);
    assert!(drawer.score > 0);
    assert_eq!(guesser.state, PlayerState::Standby);
    // somebody is still guessing
    assert_eq!(lobby.phase(), Some(TurnPhase::Drawing));
    assert_eq!(lobby.drawer(), Some(clients[0].id));
}

#[test]
fn guessers_never_see_unrevealed_characters() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 3);
    clients[0].send(&lobby, ClientEvent::Start).unwrap();
    clients[0].send(&lobby, ClientEvent::ChooseWord(0)).unwrap();

    lobby.on_timer(lobby.turn_generation(), TimerEvent::RevealHint);
    lobby.on_timer(lobby.turn_generation(), TimerEvent::RevealHint);

    for guesser in &clients[1..] {
        let sent = hints(&guesser.events());
        assert_eq!(sent.len(), 3);
        for (revealed_so_far, hints) in sent.iter().enumerate() {
            assert_eq!(hints.len(), 5);
            let shown: Vec<char> = hints.iter().filter_map(|h| h.character).collect();
            assert_eq!(shown.len(), revealed_so_far);
            assert!(shown.iter().all(|c| "apple".contains(*c)));
            assert!(hints.iter().all(|h| h.underline));
        }
    }

    let drawer_hints = hints(&clients[0].events());
    assert_eq!(drawer_hints.len(), 1);
    let word: String = drawer_hints[0].iter().filter_map(|h| h.character).collect();
    assert_eq!(word, "apple");
}

#[test]
fn stale_timer_does_not_advance_the_turn() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 2);
    start_with_apple(&lobby, &clients);
    let generation = lobby.turn_generation();

    clients[1].send(&lobby, ClientEvent::Message("apple".to_string())).unwrap();
    assert_eq!(lobby.drawer(), Some(clients[1].id));
    assert_eq!(lobby.round(), 1);
    let current = lobby.turn_generation();
    assert_ne!(current, generation);

    assert!(!lobby.on_timer(generation, TimerEvent::TurnEnd));
    assert_eq!(lobby.drawer(), Some(clients[1].id));
    assert_eq!(lobby.phase(), Some(TurnPhase::AwaitingWordChoice));
    assert_eq!(lobby.round(), 1);
    assert_eq!(lobby.turn_generation(), current);

    clients[1].send(&lobby, ClientEvent::ChooseWord(0)).unwrap();
    clients[0].send(&lobby, ClientEvent::Message("apple".to_string())).unwrap();
    assert_eq!(lobby.drawer(), Some(clients[0].id));
    assert_eq!(lobby.round(), 2);
}

#[test]
fn turn_ends_when_timer_fires() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 2);
    start_with_apple(&lobby, &clients);

    assert!(!lobby.on_timer(lobby.turn_generation(), TimerEvent::TurnEnd));
    assert_eq!(lobby.drawer(), Some(clients[1].id));
    let events = clients[0].events();
    assert!(matches!(
        &events[0],
        ServerEvent::NextTurn(next) if next.previous_word.as_deref() == Some("apple")
    ));
}

#[test]
fn word_choice_timeout_picks_first_word() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 2);
    clients[0].send(&lobby, ClientEvent::Start).unwrap();

    lobby.on_timer(lobby.turn_generation(), TimerEvent::WordChoiceTimeout);
    assert_eq!(lobby.phase(), Some(TurnPhase::Drawing));
    clients[1].events();
    clients[1].send(&lobby, ClientEvent::Message("apple".to_string())).unwrap();
    assert!(clients[1]
        .events()
        .contains(&ServerEvent::CorrectGuess(clients[1].id)));
}

#[test]
fn last_round_ends_the_game_and_start_restarts() {
    let mut config = config();
    config.settings.rounds = 1;
    let lobby = lobby(config);
    let clients = join_all(&lobby, 2);
    start_with_apple(&lobby, &clients);

    clients[1].send(&lobby, ClientEvent::Message("apple".to_string())).unwrap();
    clients[1].send(&lobby, ClientEvent::ChooseWord(1)).unwrap();
    clients[0].send(&lobby, ClientEvent::Message("banana".to_string())).unwrap();

    assert_eq!(lobby.lobby_state(), LobbyState::GameOver);
    assert_eq!(lobby.phase(), None);
    for client in clients.iter() {
        let events = client.events();
        match events.last() {
            Some(ServerEvent::GameOver(game_over)) => {
                assert_eq!(game_over.previous_word.as_deref(), Some("banana"));
                assert_eq!(game_over.ready.game_state, LobbyState::GameOver);
                assert_eq!(game_over.ready.player_id, client.id);
            }
            other => panic!("expected game-over, got {:?}", other),
        }
    }

    clients[0].send(&lobby, ClientEvent::Start).unwrap();
    assert_eq!(lobby.lobby_state(), LobbyState::Ongoing);
    assert_eq!(lobby.round(), 1);
    assert!(lobby.players().iter().all(|p| p.score == 0));
}

#[test]
fn kick_vote_quorum_and_late_vote() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 5);
    let target = clients[0].id;

    clients[1].send(&lobby, ClientEvent::KickVote(target)).unwrap();
    let expected = KickVote {
        player_id: target,
        player_name: "player0".to_string(),
        vote_count: 1,
        required_vote_count: 2,
    };
    assert_eq!(clients[3].events(), vec![ServerEvent::KickVote(expected)]);
    assert_eq!(
        clients[1].send(&lobby, ClientEvent::KickVote(target)),
        Err(LobbyError::AlreadyVoted)
    );

    clients[2].send(&lobby, ClientEvent::KickVote(target)).unwrap();
    assert!(lobby.players().iter().all(|p| p.id != target));
    assert_eq!(lobby.kick_votes_against(target), 0);
    assert!(clients[0].rx.is_closed());

    let events = clients[3].events();
    assert!(events.iter().any(|e| matches!(e, ServerEvent::KickVote(vote) if vote.succeeded())));
    assert!(events.contains(&ServerEvent::OwnerChange(OwnerChangeEvent {
        player_id: clients[1].id,
        player_name: "player1".to_string(),
    })));
    assert_eq!(lobby.owner(), Some(clients[1].id));

    assert_eq!(
        clients[3].send(&lobby, ClientEvent::KickVote(target)),
        Err(LobbyError::UnknownPlayer)
    );
}

#[test]
fn self_vote_and_disabled_votekick() {
    let mut config = config();
    config.settings.enable_votekick = false;
    let lobby = lobby(config);
    let clients = join_all(&lobby, 3);

    assert_eq!(
        clients[0].send(&lobby, ClientEvent::KickVote(clients[1].id)),
        Err(LobbyError::VotekickDisabled)
    );

    let mut settings = lobby.settings();
    settings.enable_votekick = true;
    lobby.update_settings(clients[0].id, settings).unwrap();
    assert_eq!(
        clients[0].send(&lobby, ClientEvent::KickVote(clients[0].id)),
        Err(LobbyError::SelfVote)
    );
}

#[test]
fn kicking_the_drawer_ends_the_turn() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 4);
    start_with_apple(&lobby, &clients);

    clients[1].send(&lobby, ClientEvent::KickVote(clients[0].id)).unwrap();
    clients[2].send(&lobby, ClientEvent::KickVote(clients[0].id)).unwrap();

    let events = clients[1].events();
    assert!(events.contains(&ServerEvent::DrawerKicked));
    assert!(events.iter().any(|e| matches!(e, ServerEvent::YourTurn(_))));
    assert_eq!(lobby.drawer(), Some(clients[1].id));
    assert_eq!(lobby.phase(), Some(TurnPhase::AwaitingWordChoice));
}

#[test]
fn reconnect_keeps_identity_and_score() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 3);
    start_with_apple(&lobby, &clients);
    clients[1].send(&lobby, ClientEvent::Message("apple".to_string())).unwrap();
    let before = player(&lobby, clients[1].id);
    assert!(before.score > 0);

    lobby.disconnect(clients[1].id).unwrap();
    assert!(!player(&lobby, clients[1].id).connected);

    let (channel, rx) = MemoryChannel::bounded(64);
    let after = lobby
        .reconnect(clients[1].id, "127.0.0.1", Connection::new(channel))
        .unwrap();
    assert_eq!(after, before);
    match rx.events().first() {
        Some(ServerEvent::Ready(ready)) => {
            assert_eq!(ready.player_id, clients[1].id);
            assert_eq!(ready.game_state, LobbyState::Ongoing);
            // already guessed, so the whole word is known
            let word: String = ready.word_hints.iter().filter_map(|h| h.character).collect();
            assert_eq!(word, "apple");
            assert!(ready.round_end_time > 0);
        }
        other => panic!("expected ready, got {:?}", other),
    }

    assert_eq!(
        lobby
            .reconnect(PlayerId::new_v4(), "127.0.0.1", Connection::new(MemoryChannel::bounded(1).0))
            .unwrap_err(),
        LobbyError::UnknownPlayer
    );
}

#[test]
fn full_lobby_evicts_oldest_disconnected_player() {
    let mut config = config();
    config.settings.max_players = 3;
    let lobby = lobby(config);
    let clients = join_all(&lobby, 3);

    let (channel, _rx) = MemoryChannel::bounded(8);
    assert_eq!(
        lobby.join("dora", "127.0.0.1", Connection::new(channel)).unwrap_err(),
        LobbyError::LobbyFull
    );

    lobby.disconnect(clients[2].id).unwrap();
    thread::sleep(Duration::from_millis(5));
    lobby.disconnect(clients[1].id).unwrap();

    let dora = join(&lobby, "dora");
    let ids: Vec<PlayerId> = lobby.players().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![clients[0].id, clients[1].id, dora.id]);
}

#[test]
fn evicting_the_drawer_ends_the_turn() {
    let mut config = config();
    config.settings.max_players = 3;
    let lobby = lobby(config);
    let clients = join_all(&lobby, 3);
    start_with_apple(&lobby, &clients);

    lobby.disconnect(clients[0].id).unwrap();
    assert_eq!(lobby.phase(), Some(TurnPhase::Drawing));
    clients[1].events();

    let dora = join(&lobby, "dora");
    let ids: Vec<PlayerId> = lobby.players().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![clients[1].id, clients[2].id, dora.id]);
    assert_eq!(lobby.drawer(), Some(clients[1].id));
    assert_eq!(lobby.phase(), Some(TurnPhase::AwaitingWordChoice));
    assert_eq!(lobby.owner(), Some(clients[1].id));

    let events = clients[1].events();
    assert!(events.contains(&ServerEvent::DrawerKicked));
    assert!(events.iter().any(|e| matches!(e, ServerEvent::YourTurn(_))));
}

#[test]
fn failed_send_disconnects_player() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 3);
    clients[2].rx.hang_up();

    clients[0].send(&lobby, ClientEvent::Message("hello".to_string())).unwrap();

    assert!(!player(&lobby, clients[2].id).connected);
    let events = clients[1].events();
    assert!(matches!(&events[0], ServerEvent::Message(message) if message.content == "hello"));
    match &events[1] {
        ServerEvent::UpdatePlayers(players) => {
            assert!(!players.iter().find(|p| p.id == clients[2].id).unwrap().connected);
        }
        other => panic!("expected update-players, got {:?}", other),
    }
}

#[test]
fn players_who_guessed_only_talk_to_non_guessing_players() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 3);
    start_with_apple(&lobby, &clients);
    clients[1].send(&lobby, ClientEvent::Message("apple".to_string())).unwrap();
    for client in clients.iter() {
        client.events();
    }

    clients[1].send(&lobby, ClientEvent::Message("too easy".to_string())).unwrap();
    let expected = ServerEvent::NonGuessingPlayerMessage(OutgoingMessage {
        author: "player1".to_string(),
        author_id: clients[1].id,
        content: "too easy".to_string(),
    });
    assert_eq!(clients[0].events(), vec![expected.clone()]);
    assert_eq!(clients[1].events(), vec![expected]);
    assert!(clients[2].events().is_empty());

    clients[2].send(&lobby, ClientEvent::Message("   ".to_string())).unwrap();
    assert!(clients[0].events().is_empty());
}

#[test]
fn drawing_is_relayed_and_undone() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 2);
    start_with_apple(&lobby, &clients);
    let line = LineData {
        from_x: 0.0,
        from_y: 0.0,
        to_x: 10.0,
        to_y: 10.0,
        color: RgbColor { r: 0, g: 0, b: 255 },
        line_width: 2.0,
    };

    clients[0].send(&lobby, ClientEvent::Line(line)).unwrap();
    assert!(clients[0].events().is_empty());
    assert_eq!(clients[1].events(), vec![ServerEvent::Line(line)]);

    assert_eq!(
        clients[1].send(&lobby, ClientEvent::Line(line)),
        Err(LobbyError::NotYourTurn)
    );
    assert_eq!(clients[1].send(&lobby, ClientEvent::Undo), Err(LobbyError::NotYourTurn));
    clients[1].events();

    clients[1].send(&lobby, ClientEvent::RequestDrawing).unwrap();
    assert_eq!(
        clients[1].events(),
        vec![ServerEvent::Drawing(vec![DrawingInstruction::Line(line)])]
    );

    clients[0].send(&lobby, ClientEvent::Undo).unwrap();
    assert_eq!(clients[1].events(), vec![ServerEvent::Drawing(vec![])]);
    clients[0].send(&lobby, ClientEvent::Undo).unwrap();
    assert!(clients[1].events().is_empty());
}

#[test]
fn malformed_frame_is_reported_to_sender_only() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 2);

    let result = lobby.handle_frame(clients[0].id, br#"{"type":"no-such-event"}"#);
    assert!(matches!(result, Err(LobbyError::InvalidEvent(_))));
    assert!(matches!(clients[0].events().as_slice(), [ServerEvent::SystemMessage(_)]));
    assert!(clients[1].events().is_empty());

    let frame = serde_json::json!({"type": "name-change", "data": "ernie"}).to_string();
    lobby.handle_frame(clients[1].id, frame.as_bytes()).unwrap();
    assert_eq!(
        clients[0].events(),
        vec![ServerEvent::NameChange(NameChangeEvent {
            player_id: clients[1].id,
            player_name: "ernie".to_string(),
        })]
    );
}

#[test]
fn spectators_do_not_count_as_players() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 2);

    clients[1].send(&lobby, ClientEvent::ToggleSpectate).unwrap();
    assert_eq!(player(&lobby, clients[1].id).state, PlayerState::Spectating);
    assert_eq!(clients[0].send(&lobby, ClientEvent::Start), Err(LobbyError::NotEnoughPlayers));

    clients[1].send(&lobby, ClientEvent::ToggleSpectate).unwrap();
    clients[0].send(&lobby, ClientEvent::Start).unwrap();

    // while a game runs the switch waits for the next turn
    clients[1].send(&lobby, ClientEvent::ToggleSpectate).unwrap();
    assert_eq!(player(&lobby, clients[1].id).state, PlayerState::Standby);
    clients[0].send(&lobby, ClientEvent::ChooseWord(0)).unwrap();
    assert_eq!(player(&lobby, clients[1].id).state, PlayerState::Guessing);
}

#[test]
fn settings_are_owner_only_and_validated() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 2);
    let mut settings = LobbySettings::default();
    settings.rounds = 7;

    assert_eq!(
        lobby.update_settings(clients[1].id, settings.clone()),
        Err(LobbyError::NotLobbyOwner)
    );
    let mut invalid = settings.clone();
    invalid.drawing_time = 5;
    assert!(matches!(
        lobby.update_settings(clients[0].id, invalid),
        Err(LobbyError::InvalidSettings(_))
    ));

    lobby.update_settings(clients[0].id, settings.clone()).unwrap();
    assert_eq!(lobby.settings().rounds, 7);
    assert_eq!(clients[1].events(), vec![ServerEvent::LobbySettingsChanged(settings)]);
}

#[test]
fn shutdown_closes_every_connection() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 3);
    lobby.shutdown();

    for client in clients.iter() {
        assert_eq!(client.events(), vec![ServerEvent::Shutdown]);
        assert!(client.rx.is_closed());
    }
    assert!(lobby.players().is_empty());
}

/// Polls `condition` until it holds or a few seconds have passed.
fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn word_choice_timer_thread_picks_first_word() {
    let mut config = config();
    config.word_choice_time = Duration::from_millis(20);
    let lobby = lobby(config);
    let clients = join_all(&lobby, 2);
    clients[0].send(&lobby, ClientEvent::Start).unwrap();

    assert!(wait_for(|| lobby.phase() == Some(TurnPhase::Drawing)));
    assert_eq!(lobby.drawer(), Some(clients[0].id));
    let seen = hints(&clients[1].events());
    assert_eq!(seen.last().map(Vec::len), Some(5));
    clients[1].send(&lobby, ClientEvent::Message("apple".to_string())).unwrap();
    assert_eq!(lobby.drawer(), Some(clients[1].id));
}

#[test]
fn chosen_word_cancels_running_timer() {
    let mut config = config();
    config.word_choice_time = Duration::from_millis(100);
    let lobby = lobby(config);
    let clients = join_all(&lobby, 2);
    start_with_apple(&lobby, &clients);
    let generation = lobby.turn_generation();

    thread::sleep(Duration::from_millis(300));
    assert_eq!(lobby.turn_generation(), generation);
    assert_eq!(lobby.phase(), Some(TurnPhase::Drawing));

    // the guess ends the turn, the next word choice is left to the timer
    clients[1].send(&lobby, ClientEvent::Message("apple".to_string())).unwrap();
    assert_eq!(lobby.drawer(), Some(clients[1].id));
    assert_eq!(lobby.turn_generation(), generation + 1);
    assert!(wait_for(|| lobby.phase() == Some(TurnPhase::Drawing)));
    thread::sleep(Duration::from_millis(300));
    assert_eq!(lobby.turn_generation(), generation + 2);
    assert_eq!(lobby.round(), 1);

    clients[0].send(&lobby, ClientEvent::Message("apple".to_string())).unwrap();
    assert_eq!(lobby.round(), 2);
    assert_eq!(lobby.drawer(), Some(clients[0].id));
}

#[test]
fn concurrent_events_keep_the_lobby_consistent() {
    let lobby = lobby(config());
    let clients = join_all(&lobby, 6);
    start_with_apple(&lobby, &clients);

    let chatters: Vec<_> = clients[1..]
        .iter()
        .map(|client| {
            let lobby = lobby.clone();
            let id = client.id;
            thread::spawn(move || {
                for i in 0..20 {
                    lobby
                        .handle_event(id, ClientEvent::Message(format!("hello {}", i)))
                        .unwrap();
                }
            })
        })
        .collect();
    for chatter in chatters {
        chatter.join().unwrap();
    }

    for client in clients.iter() {
        let events = client.events();
        for author in clients[1..].iter() {
            let contents: Vec<String> = events
                .iter()
                .filter_map(|e| match e {
                    ServerEvent::Message(m) if m.author_id == author.id => Some(m.content.clone()),
                    _ => None,
                })
                .collect();
            let expected: Vec<String> = (0..20).map(|i| format!("hello {}", i)).collect();
            assert_eq!(contents, expected);
        }
    }

    let guessers: Vec<_> = clients[1..]
        .iter()
        .map(|client| {
            let lobby = lobby.clone();
            let id = client.id;
            thread::spawn(move || {
                lobby
                    .handle_event(id, ClientEvent::Message("apple".to_string()))
                    .unwrap();
            })
        })
        .collect();
    for guesser in guessers {
        guesser.join().unwrap();
    }

    assert_eq!(lobby.drawer(), Some(clients[1].id));
    assert_eq!(lobby.phase(), Some(TurnPhase::AwaitingWordChoice));
    assert_eq!(lobby.round(), 1);
    for client in clients[1..].iter() {
        assert!(player(&lobby, client.id).score > 0);
        assert!(player(&lobby, client.id).connected);
    }
}
