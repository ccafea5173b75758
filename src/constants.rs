//! Configuration constants for the quiz room system
//!
//! This module contains the fixed limits and timing parameters used
//! throughout the orchestrator. Timings are expressed in whole seconds
//! because that is the granularity of the wire contract.

/// Room and session lifecycle constants
pub mod room {
    /// Maximum number of players allowed in a single room
    pub const MAX_PLAYER_COUNT: usize = 1000;
    /// A session untouched for longer than this is eligible for reaping
    pub const MAX_IDLE_SECS: u64 = 3600;
    /// Interval at which the embedding host should run the idle sweep
    pub const SWEEP_INTERVAL_SECS: u64 = 600;
    /// Minimum length of a room code
    pub const MIN_CODE_LENGTH: usize = 1;
    /// Maximum length of a room code
    pub const MAX_CODE_LENGTH: usize = 16;
    /// Length of generated room codes
    pub const RANDOM_CODE_LENGTH: usize = 6;
}

/// Quiz flow and timing constants
pub mod quiz {
    /// Number of questions drawn for a random quiz
    pub const QUESTION_COUNT: usize = 10;
    /// Number of answer options on every question
    pub const OPTION_COUNT: usize = 4;
    /// Time players have to answer once a question is broadcast
    pub const TIME_LIMIT_SECS: u64 = 30;
    /// Grace period added to the hard timeout so in-flight submissions land
    pub const TIMEOUT_GRACE_SECS: u64 = 2;
    /// Pause between a quiz/question transition and the next broadcast
    pub const LEAD_IN_SECS: u64 = 2;
    /// Pause after a question resolves before advancing
    pub const REVEAL_DELAY_SECS: u64 = 3;
}

/// Scoring constants
pub mod scoring {
    /// Base points for a correct answer on an easy question
    pub const EASY_BASE_POINTS: u64 = 100;
    /// Base points for a correct answer on a medium question
    pub const MEDIUM_BASE_POINTS: u64 = 150;
    /// Base points for a correct answer on a hard question
    pub const HARD_BASE_POINTS: u64 = 200;
    /// Maximum speed bonus, awarded for an instant correct answer
    pub const SPEED_BONUS_CAP: u64 = 50;
    /// Final score divisor when converting a score into an XP grant
    pub const XP_PER_SCORE_DIVISOR: u64 = 10;
}

/// Player name constants
pub mod player_name {
    /// Minimum length of a display name
    pub const MIN_LENGTH: usize = 1;
    /// Maximum length of a display name
    pub const MAX_LENGTH: usize = 30;
}

/// Question content constants
pub mod question_text {
    /// Maximum length of question text
    pub const MAX_LENGTH: usize = 300;
    /// Maximum length of a single answer option
    pub const MAX_OPTION_LENGTH: usize = 200;
    /// Maximum length of a category label
    pub const MAX_CATEGORY_LENGTH: usize = 50;
}
