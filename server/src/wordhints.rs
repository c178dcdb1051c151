use rand::Rng;
use scribble_session_common::gamestate_common::WordHint;

/// The secret word of a turn and which of its characters have been revealed
/// to guessers so far.
#[derive(Debug, Clone)]
pub struct WordHints {
    chars: Vec<char>,
    revealed: Vec<bool>,
}

fn is_guessable(c: char) -> bool {
    c.is_alphanumeric()
}

impl WordHints {
    pub fn new(word: &str) -> Self {
        let chars: Vec<char> = word.chars().collect();
        let revealed = chars.iter().map(|c| !is_guessable(*c)).collect();
        WordHints { chars, revealed }
    }

    /// Hints for players allowed to know the word.
    pub fn full(&self) -> Vec<WordHint> {
        self.chars
            .iter()
            .map(|c| WordHint {
                character: Some(*c),
                underline: is_guessable(*c),
            })
            .collect()
    }

    /// Hints for guessers: unrevealed characters are blanks.
    pub fn partial(&self) -> Vec<WordHint> {
        self.chars
            .iter()
            .zip(self.revealed.iter())
            .map(|(c, revealed)| WordHint {
                character: if *revealed { Some(*c) } else { None },
                underline: is_guessable(*c),
            })
            .collect()
    }

    /// Number of letters that may be revealed over the course of a turn.
    pub fn reveal_budget(&self) -> usize {
        self.chars.iter().filter(|c| is_guessable(**c)).count() / 3
    }

    pub fn hidden_count(&self) -> usize {
        self.revealed.iter().filter(|r| !**r).count()
    }

    /// Reveals one random hidden character. Returns false if everything is
    /// revealed already.
    pub fn reveal_random(&mut self) -> bool {
        let hidden: Vec<usize> = self
            .revealed
            .iter()
            .enumerate()
            .filter(|(_, r)| !**r)
            .map(|(i, _)| i)
            .collect();
        if hidden.is_empty() {
            return false;
        }
        let index = hidden[rand::thread_rng().gen_range(0, hidden.len())];
        self.revealed[index] = true;
        true
    }
}
