//! Wire-level commands and events
//!
//! This module defines the typed boundary of the orchestrator: the
//! commands a connection may send in and the events the rooms emit back
//! out. Payloads are validated here, before any session is touched, so a
//! malformed command can never cause a partial mutation. Field and
//! variant names serialize in camelCase; they are part of the contract
//! with clients.

use std::time::Duration;

use garde::Validate;
use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{
    constants,
    question::{Difficulty, Question, QuizId},
    room_id::RoomId,
    roster::{ConnectionId, UserId},
    services::Achievement,
    session::RoomState,
};

/// Validates a player display name
///
/// Rejects names that are blank after trimming and names that fail the
/// content filter.
fn validate_player_name(value: &str) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("name must not be blank"));
    }
    if value.is_inappropriate() {
        return Err(garde::Error::new("name is not allowed"));
    }
    Ok(())
}

/// Commands accepted from connections
///
/// The implicit fourth command, disconnect, has no payload and is
/// delivered by the transport through
/// [`RoomRegistry::disconnect`](crate::registry::RoomRegistry::disconnect).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    /// Join a room, creating it if it does not exist yet
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        /// The room to join
        #[garde(skip)]
        room_id: RoomId,
        /// Display name for this player
        #[garde(length(min = constants::player_name::MIN_LENGTH, max = constants::player_name::MAX_LENGTH), custom(|v, _| validate_player_name(v)))]
        player_name: String,
        /// Optional persistent identity for XP and achievements
        #[garde(skip)]
        user_id: Option<UserId>,
    },
    /// Start the quiz (host only)
    #[serde(rename_all = "camelCase")]
    StartQuiz {
        /// The room to start
        #[garde(skip)]
        room_id: RoomId,
        /// A custom quiz to play instead of a random draw
        #[garde(skip)]
        quiz_id: Option<QuizId>,
    },
    /// Submit an answer for the current question
    #[serde(rename_all = "camelCase")]
    SubmitAnswer {
        /// The room the answer belongs to
        #[garde(skip)]
        room_id: RoomId,
        /// Index of the selected option
        #[garde(range(max = 3))]
        answer_index: usize,
        /// Whole seconds left on the client's countdown at submission
        #[garde(skip)]
        time_remaining: u64,
    },
}

impl Command {
    /// Returns the room this command addresses
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::JoinRoom { room_id, .. }
            | Self::StartQuiz { room_id, .. }
            | Self::SubmitAnswer { room_id, .. } => room_id,
        }
    }
}

/// The public view of a question, with the correct answer withheld
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    /// The question text
    pub text: String,
    /// The four answer options
    pub options: Vec<String>,
    /// Topic label
    pub category: String,
    /// Difficulty tier
    pub difficulty: Difficulty,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            text: question.text.clone(),
            options: question.options.clone(),
            category: question.category.clone(),
            difficulty: question.difficulty,
        }
    }
}

/// One row of a player-list snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    /// The player's connection id
    pub id: ConnectionId,
    /// Display name
    pub name: String,
    /// Cumulative score in the current or most recent quiz
    pub score: u64,
    /// Whether this player is the current host
    pub is_host: bool,
}

/// One row of the final results, in rank order
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    /// The player's connection id
    pub id: ConnectionId,
    /// Display name
    pub name: String,
    /// Final score
    pub score: u64,
    /// Persistent identity, if the player was logged in
    pub user_id: Option<UserId>,
}

/// Events emitted to room members
///
/// Every state-visible mutation emits exactly one event to every
/// connection in the room, except the private per-recipient events
/// (`answerResult`, `levelUp`, `achievementUnlocked`, `error`), which are
/// addressed to a single connection.
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Event {
    /// Acknowledges a join, directed to the joiner
    #[serde(rename_all = "camelCase")]
    JoinedRoom {
        /// The room that was joined
        room_id: RoomId,
        /// Whether the joiner is the host
        is_host: bool,
        /// Current lifecycle state of the room
        state: RoomState,
    },
    /// A freshly recomputed player-list snapshot
    #[serde(rename_all = "camelCase")]
    PlayerList {
        /// All players in join order
        players: Vec<PlayerEntry>,
        /// The current host's connection id
        host_id: ConnectionId,
    },
    /// The quiz has started
    #[serde(rename_all = "camelCase")]
    QuizStarted {
        /// Number of questions in the quiz
        total_questions: usize,
    },
    /// A new question is open for answers
    #[serde(rename_all = "camelCase")]
    NewQuestion {
        /// 1-based position of this question
        question_number: usize,
        /// Number of questions in the quiz
        total_questions: usize,
        /// The question, with the correct answer withheld
        question: QuestionView,
        /// Time players have to answer
        #[serde_as(as = "serde_with::DurationSeconds<u64>")]
        time_limit: Duration,
    },
    /// Private reveal of a player's own answer outcome
    #[serde(rename_all = "camelCase")]
    AnswerResult {
        /// Whether the selected option was correct
        is_correct: bool,
        /// Points awarded for this answer
        points: u64,
        /// Index of the correct option
        correct_answer: usize,
        /// Explanation text, if the question carries one
        explanation: Option<String>,
    },
    /// The quiz has ended and results are final
    #[serde(rename_all = "camelCase")]
    QuizEnded {
        /// Final standings, best first, ties in join order
        results: Vec<ResultEntry>,
        /// The top entry, if anyone played
        winner: Option<ResultEntry>,
    },
    /// Private notice that the profile service leveled this player up
    #[serde(rename_all = "camelCase")]
    LevelUp {
        /// The level just reached
        new_level: u32,
    },
    /// Private notice that an achievement was unlocked
    #[serde(rename_all = "camelCase")]
    AchievementUnlocked {
        /// The achievement that unlocked
        achievement: Achievement,
    },
    /// Private rejection of a command, no state was mutated
    Error {
        /// Human-readable description of what was wrong
        message: String,
    },
}

impl Event {
    /// Converts the event to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never
    /// happen with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}
