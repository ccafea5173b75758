//! External collaborator contracts
//!
//! The orchestrator reaches outside itself in four places: drawing
//! questions, granting XP, unlocking achievements, and archiving final
//! results. Each is a trait so embedders can wire real backends while the
//! core stays free of I/O; every implementation is expected to return
//! promptly (enqueue-and-return, not block), because it is invoked inside
//! a room's critical section.
//!
//! Failures here are never fatal to a room: question-source outages fall
//! back to the built-in sample set, and end-of-quiz side effects are
//! logged and skipped.

use serde::Serialize;
use thiserror::Error;
use web_time::SystemTime;

use crate::{
    events::ResultEntry,
    question::{Question, QuizId, sample_set},
    room_id::RoomId,
    roster::UserId,
};

/// Errors returned by the question source
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceError {
    /// The source could not be reached; callers degrade to the sample set
    #[error("question source unavailable")]
    Unavailable,
    /// The requested custom quiz does not exist
    #[error("quiz not found")]
    NotFound,
}

/// Errors returned by the profile, achievement, and archive services
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceError {
    /// The service could not be reached; the side effect is skipped
    #[error("service unavailable")]
    Unavailable,
}

/// Supplier of question snapshots for quiz starts
pub trait QuestionSource {
    /// Draws `count` random questions
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unavailable`] if the source cannot be
    /// reached.
    fn fetch_random(&mut self, count: usize) -> Result<Vec<Question>, SourceError>;

    /// Fetches the questions of a specific custom quiz
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotFound`] for an unknown quiz id, or
    /// [`SourceError::Unavailable`] if the source cannot be reached.
    fn fetch_custom(&mut self, quiz_id: &QuizId) -> Result<Vec<Question>, SourceError>;
}

/// Outcome of an XP grant, as reported by the profile service
///
/// The service owns the leveling math (`floor(sqrt(total_xp / 100)) + 1`);
/// the orchestrator only needs to know whether the grant crossed a level
/// boundary so it can notify the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpAward {
    /// The user's level after the grant
    pub new_level: u32,
    /// Whether the grant raised the level
    pub leveled_up: bool,
}

/// The external profile/XP progression service
pub trait ProfileService {
    /// Grants XP to a user and reports the resulting level
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the service cannot be reached; the
    /// grant is then skipped and logged.
    fn award_xp(&mut self, user: &UserId, amount: u64) -> Result<XpAward, ServiceError>;
}

/// Achievements the orchestrator can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    /// Completed a quiz for the first time
    FirstQuiz,
    /// Held the top score of a quiz with a nonzero winning score
    TopScore,
}

/// The external achievement service
pub trait AchievementService {
    /// Awards an achievement if the user does not already hold it
    ///
    /// Idempotent: re-awarding an already-unlocked achievement returns
    /// `false` and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the service cannot be reached.
    fn check_and_award(
        &mut self,
        user: &UserId,
        achievement: Achievement,
    ) -> Result<bool, ServiceError>;
}

/// Fire-and-forget archive for final quiz results
pub trait ResultArchive {
    /// Records the final results of a completed quiz
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on failure; the in-room result event has
    /// already been published and is unaffected.
    fn record_result(
        &mut self,
        room_id: &RoomId,
        results: &[ResultEntry],
        completed_at: SystemTime,
    ) -> Result<(), ServiceError>;
}

/// A question source backed by the built-in sample set
///
/// Useful for tests and for embedders that want offline play.
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleQuestions;

impl QuestionSource for SampleQuestions {
    fn fetch_random(&mut self, count: usize) -> Result<Vec<Question>, SourceError> {
        let mut questions = sample_set();
        fastrand::shuffle(&mut questions);
        questions.truncate(count);
        Ok(questions)
    }

    fn fetch_custom(&mut self, _quiz_id: &QuizId) -> Result<Vec<Question>, SourceError> {
        Err(SourceError::NotFound)
    }
}

/// No-op implementations of the end-of-quiz collaborators
///
/// For embedders and tests that run anonymous-only play: XP grants report
/// no level change, achievements never unlock, and archival succeeds
/// silently.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullServices;

impl ProfileService for NullServices {
    fn award_xp(&mut self, _user: &UserId, _amount: u64) -> Result<XpAward, ServiceError> {
        Ok(XpAward {
            new_level: 1,
            leveled_up: false,
        })
    }
}

impl AchievementService for NullServices {
    fn check_and_award(
        &mut self,
        _user: &UserId,
        _achievement: Achievement,
    ) -> Result<bool, ServiceError> {
        Ok(false)
    }
}

impl ResultArchive for NullServices {
    fn record_result(
        &mut self,
        _room_id: &RoomId,
        _results: &[ResultEntry],
        _completed_at: SystemTime,
    ) -> Result<(), ServiceError> {
        Ok(())
    }
}
