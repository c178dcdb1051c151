use std::time::Duration;

use scribble_session_common::settings_common::LobbySettings;

use crate::error::LobbyError;
use crate::rewardstrategy::{
    EqualRewardStrategy, RewardStrategyDrawer, RewardStrategyGuesser, TimeBasedRewardStrategy,
};

pub const DEFAULT_RECONNECT_GRACE: Duration = Duration::from_secs(30);
pub const DEFAULT_WORD_CHOICE_COUNT: usize = 3;
pub const DEFAULT_WORD_CHOICE_TIME: Duration = Duration::from_secs(30);
/// Longest display name a player may pick.
pub const MAX_NAME_LENGTH: usize = 30;

static REWARD_STRATEGY_GUESSER: TimeBasedRewardStrategy = TimeBasedRewardStrategy { full_reward: 200 };
static REWARD_STRATEGY_DRAWER: EqualRewardStrategy = EqualRewardStrategy { full_reward: 100 };

/// Server side configuration of a lobby. Only `settings` can be changed
/// while the lobby is open.
#[derive(Clone)]
pub struct LobbyConfig {
    pub settings: LobbySettings,
    /// time a disconnected player keeps their slot before it may be given
    /// to somebody else
    pub reconnect_grace: Duration,
    pub custom_words: Vec<String>,
    /// number of words the drawer may choose from
    pub word_choice_count: usize,
    /// time the drawer has to pick a word before the first one is taken
    pub word_choice_time: Duration,
    pub guesser_reward: &'static dyn RewardStrategyGuesser,
    pub drawer_reward: &'static dyn RewardStrategyDrawer,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        LobbyConfig {
            settings: LobbySettings::default(),
            reconnect_grace: DEFAULT_RECONNECT_GRACE,
            custom_words: Vec::new(),
            word_choice_count: DEFAULT_WORD_CHOICE_COUNT,
            word_choice_time: DEFAULT_WORD_CHOICE_TIME,
            guesser_reward: &REWARD_STRATEGY_GUESSER,
            drawer_reward: &REWARD_STRATEGY_DRAWER,
        }
    }
}

impl LobbyConfig {
    pub fn validate(&self) -> Result<(), LobbyError> {
        Ok(self.settings.validate()?)
    }

    pub fn drawing_time(&self) -> Duration {
        Duration::from_secs(u64::from(self.settings.drawing_time))
    }
}
