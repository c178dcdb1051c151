use rand::Rng;

/// Supplies the words a drawer may choose from.
pub trait WordSource: Send {
    /// Returns up to `count` distinct candidates. Each candidate is taken from
    /// `custom_words` with a probability of `custom_words_chance` percent.
    fn candidates(&mut self, count: usize, custom_words: &[String], custom_words_chance: u8) -> Vec<String>;
}

/// Words drawn at random from a fixed list. Words that were offered once are
/// not offered again until the list runs dry.
pub struct WordList {
    all: Vec<String>,
    remaining: Vec<String>,
}

impl WordList {
    pub fn new(words: Vec<String>) -> Self {
        let words: Vec<String> = words
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        WordList {
            remaining: words.clone(),
            all: words,
        }
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Gets a random word from the list and removes it, refilling the list
    /// once every word has been used.
    fn take_random(&mut self) -> Option<String> {
        if self.remaining.is_empty() {
            self.remaining = self.all.clone();
        }
        if self.remaining.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0, self.remaining.len());
        Some(self.remaining.remove(index))
    }
}

impl WordSource for WordList {
    fn candidates(&mut self, count: usize, custom_words: &[String], custom_words_chance: u8) -> Vec<String> {
        let mut rng = rand::thread_rng();
        let mut candidates: Vec<String> = Vec::with_capacity(count);
        let mut attempts = 0;
        while candidates.len() < count && attempts < count * 4 {
            attempts += 1;
            let use_custom = !custom_words.is_empty() && rng.gen_range(0u8, 100) < custom_words_chance;
            let word = if use_custom {
                Some(custom_words[rng.gen_range(0, custom_words.len())].clone())
            } else {
                self.take_random()
            };
            match word {
                Some(word) if !candidates.contains(&word) => candidates.push(word),
                Some(_) => {}
                None => break,
            }
        }
        candidates
    }
}
