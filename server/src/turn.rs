use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use scribble_session_common::gamestate_common::{DrawingInstruction, PlayerId};

use crate::registry::PlayerRegistry;
use crate::wordhints::WordHints;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// a drawer has been picked and is choosing a word
    AwaitingWordChoice,
    /// the word is chosen and the countdown is running
    Drawing,
}

/// One drawer's turn.
#[derive(Debug)]
pub struct Turn {
    drawer: PlayerId,
    phase: TurnPhase,
    candidates: Vec<String>,
    word: Option<String>,
    hints: Option<WordHints>,
    drawing: Vec<DrawingInstruction>,
    ends_at: Option<(Instant, SystemTime)>,
    correct_guessers: usize,
}

impl Turn {
    pub fn new(drawer: PlayerId, candidates: Vec<String>) -> Self {
        Turn {
            drawer,
            phase: TurnPhase::AwaitingWordChoice,
            candidates,
            word: None,
            hints: None,
            drawing: Vec::new(),
            ends_at: None,
            correct_guessers: 0,
        }
    }

    pub fn drawer(&self) -> PlayerId {
        self.drawer
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn word(&self) -> Option<&str> {
        self.word.as_deref()
    }

    pub fn hints(&self) -> Option<&WordHints> {
        self.hints.as_ref()
    }

    pub fn hints_mut(&mut self) -> Option<&mut WordHints> {
        self.hints.as_mut()
    }

    pub fn drawing(&self) -> &[DrawingInstruction] {
        &self.drawing
    }

    pub fn correct_guessers(&self) -> usize {
        self.correct_guessers
    }

    /// Picks one of the offered words and starts the countdown. Returns the
    /// chosen word, or `None` if `index` is out of range.
    pub fn choose(&mut self, index: usize, drawing_time: Duration) -> Option<&str> {
        let word = self.candidates.get(index)?.clone();
        self.hints = Some(WordHints::new(&word));
        self.word = Some(word);
        self.phase = TurnPhase::Drawing;
        self.ends_at = Some((Instant::now() + drawing_time, SystemTime::now() + drawing_time));
        self.word.as_deref()
    }

    /// Whether `guess` is the word, ignoring case and surrounding whitespace.
    pub fn is_correct(&self, guess: &str) -> bool {
        match &self.word {
            Some(word) => normalize(word) == normalize(guess),
            None => false,
        }
    }

    /// Whether `guess` misses the word by a single edit.
    pub fn is_close(&self, guess: &str) -> bool {
        match &self.word {
            Some(word) => edit_distance::edit_distance(&normalize(word), &normalize(guess)) == 1,
            None => false,
        }
    }

    pub fn record_correct_guess(&mut self) -> usize {
        self.correct_guessers += 1;
        self.correct_guessers
    }

    pub fn time_left(&self) -> Duration {
        match self.ends_at {
            Some((ends_at, _)) => ends_at.saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// End of the countdown as unix time in milliseconds, 0 while no
    /// countdown is running.
    pub fn round_end_time(&self) -> i64 {
        self.ends_at
            .and_then(|(_, ends_at)| ends_at.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |since_epoch| since_epoch.as_millis() as i64)
    }

    pub fn push_instruction(&mut self, instruction: DrawingInstruction) {
        self.drawing.push(instruction);
    }

    /// Removes the last instruction. Returns false if there was none.
    pub fn undo(&mut self) -> bool {
        self.drawing.pop().is_some()
    }

    pub fn clear_drawing(&mut self) {
        self.drawing.clear();
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Picks the drawer following the player with join ordinal `previous`.
///
/// Only connected players that want to play are considered, in join order.
/// The boolean is true when the order wrapped around, i.e. a new round
/// begins.
pub fn next_drawer(registry: &PlayerRegistry, previous: Option<u64>) -> Option<(PlayerId, u64, bool)> {
    let eligible: Vec<_> = registry.iter().filter(|p| p.is_participant()).collect();
    let first = eligible.first()?;
    let previous = match previous {
        Some(previous) => previous,
        None => return Some((first.id(), first.ordinal(), false)),
    };
    match eligible.iter().find(|p| p.ordinal() > previous) {
        Some(next) => Some((next.id(), next.ordinal(), false)),
        None => Some((first.id(), first.ordinal(), true)),
    }
}
