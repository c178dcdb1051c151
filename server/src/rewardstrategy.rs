use std::time::Duration;

/// Everything a reward strategy may base its points on. Built once per
/// correct guess.
#[derive(Debug, Clone, Copy)]
pub struct GuessContext {
    /// guessers of the current turn, the ones that already guessed included
    pub number_of_guessers: usize,
    /// correct guesses so far, the one being rewarded included
    pub players_already_guessed: usize,
    pub time_left: Duration,
    pub drawing_time: Duration,
}

impl GuessContext {
    fn time_ratio(&self) -> f64 {
        if self.drawing_time.is_zero() {
            return 0.0;
        }
        (self.time_left.as_secs_f64() / self.drawing_time.as_secs_f64()).clamp(0.0, 1.0)
    }

    fn guessers(&self) -> i64 {
        self.number_of_guessers.max(1) as i64
    }
}

pub trait RewardStrategyGuesser: Send + Sync {
    fn reward_points_to_guesser(&self, guess: &GuessContext) -> i64;
}

pub trait RewardStrategyDrawer: Send + Sync {
    fn reward_points_to_drawer(&self, guess: &GuessContext) -> i64;
}

pub struct EqualRewardStrategy {
    pub full_reward: i64,
}

/// The faster the guess, the more points.
pub struct TimeBasedRewardStrategy {
    pub full_reward: i64,
}

pub struct LinearlyDecreasingRewardStrategy {
    pub full_reward: i64,
}

impl RewardStrategyGuesser for EqualRewardStrategy {
    fn reward_points_to_guesser(&self, _guess: &GuessContext) -> i64 {
        self.full_reward
    }
}

impl RewardStrategyDrawer for EqualRewardStrategy {
    fn reward_points_to_drawer(&self, guess: &GuessContext) -> i64 {
        self.full_reward / guess.guessers()
    }
}

impl RewardStrategyGuesser for TimeBasedRewardStrategy {
    fn reward_points_to_guesser(&self, guess: &GuessContext) -> i64 {
        (guess.time_ratio() * self.full_reward as f64) as i64
    }
}

impl RewardStrategyDrawer for TimeBasedRewardStrategy {
    fn reward_points_to_drawer(&self, guess: &GuessContext) -> i64 {
        (guess.time_ratio() * (self.full_reward as f64 / guess.guessers() as f64)) as i64
    }
}

impl RewardStrategyGuesser for LinearlyDecreasingRewardStrategy {
    fn reward_points_to_guesser(&self, guess: &GuessContext) -> i64 {
        let points_for_last_guesser = self.full_reward / guess.guessers();
        let position = guess.players_already_guessed.saturating_sub(1) as i64;
        (self.full_reward - points_for_last_guesser * position).max(points_for_last_guesser)
    }
}
