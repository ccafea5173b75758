//! Question snapshots and the built-in fallback set
//!
//! Questions are captured as an immutable snapshot when a quiz starts and
//! never mutated afterwards. This module defines the question data model,
//! its validation rules, and the fixed in-memory sample set used when the
//! external question source is unreachable.

use std::fmt::Display;

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::constants;

/// Difficulty tier of a question
///
/// The tier determines the base points awarded for a correct answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Easiest tier, lowest base points
    Easy,
    /// Middle tier
    Medium,
    /// Hardest tier, highest base points
    Hard,
}

impl Difficulty {
    /// Returns the base points for a correct answer at this tier
    pub fn base_points(self) -> u64 {
        match self {
            Self::Easy => constants::scoring::EASY_BASE_POINTS,
            Self::Medium => constants::scoring::MEDIUM_BASE_POINTS,
            Self::Hard => constants::scoring::HARD_BASE_POINTS,
        }
    }
}

/// An opaque identifier for a custom quiz held by the question source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizId(String);

impl QuizId {
    /// Wraps a raw quiz identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for QuizId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A single quiz question
///
/// Exactly four answer options, one of which is correct. The optional
/// explanation is revealed privately to a player along with their answer
/// result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Question {
    /// The question text shown to players
    #[garde(length(min = 1, max = constants::question_text::MAX_LENGTH))]
    pub text: String,
    /// The four answer options, in display order
    #[garde(length(min = constants::quiz::OPTION_COUNT, max = constants::quiz::OPTION_COUNT), inner(length(max = constants::question_text::MAX_OPTION_LENGTH)))]
    pub options: Vec<String>,
    /// Index of the correct option
    #[garde(range(max = 3))]
    pub correct_index: usize,
    /// Difficulty tier, feeding the scoring base
    #[garde(skip)]
    pub difficulty: Difficulty,
    /// Topic label shown alongside the question
    #[garde(length(max = constants::question_text::MAX_CATEGORY_LENGTH))]
    pub category: String,
    /// Optional explanation revealed with the answer result
    #[garde(skip)]
    pub explanation: Option<String>,
}

/// Returns the fixed in-memory fallback question set
///
/// Used when the external question source is unavailable so that a quiz
/// start never fails for infrastructure reasons.
pub fn sample_set() -> Vec<Question> {
    fn q(
        text: &str,
        options: [&str; 4],
        correct_index: usize,
        difficulty: Difficulty,
        category: &str,
    ) -> Question {
        Question {
            text: text.to_owned(),
            options: options.iter().map(|o| (*o).to_owned()).collect(),
            correct_index,
            difficulty,
            category: category.to_owned(),
            explanation: None,
        }
    }

    vec![
        q(
            "What is the capital of France?",
            ["London", "Berlin", "Paris", "Madrid"],
            2,
            Difficulty::Easy,
            "Geography",
        ),
        q(
            "Which planet is known as the Red Planet?",
            ["Venus", "Mars", "Jupiter", "Saturn"],
            1,
            Difficulty::Easy,
            "Science",
        ),
        q(
            "What is 2 + 2?",
            ["3", "4", "5", "6"],
            1,
            Difficulty::Easy,
            "Math",
        ),
        q(
            "Who painted the Mona Lisa?",
            ["Van Gogh", "Picasso", "Da Vinci", "Monet"],
            2,
            Difficulty::Medium,
            "Art",
        ),
        q(
            "What is the largest ocean on Earth?",
            ["Atlantic", "Indian", "Arctic", "Pacific"],
            3,
            Difficulty::Easy,
            "Geography",
        ),
        q(
            "Which programming language is known for web development?",
            ["Python", "JavaScript", "C++", "Java"],
            1,
            Difficulty::Medium,
            "Technology",
        ),
        q(
            "What year did World War II end?",
            ["1944", "1945", "1946", "1947"],
            1,
            Difficulty::Medium,
            "History",
        ),
        q(
            "Which element has the chemical symbol 'O'?",
            ["Gold", "Silver", "Oxygen", "Iron"],
            2,
            Difficulty::Easy,
            "Science",
        ),
        q(
            "What is the fastest land animal?",
            ["Lion", "Cheetah", "Leopard", "Tiger"],
            1,
            Difficulty::Easy,
            "Animals",
        ),
        q(
            "Which country is home to the kangaroo?",
            ["New Zealand", "Australia", "South Africa", "Brazil"],
            1,
            Difficulty::Easy,
            "Geography",
        ),
    ]
}
