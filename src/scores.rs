//! Answer records and scoring
//!
//! This module owns the per-question answer bookkeeping and the cumulative
//! score board for one session. Points for a correct answer are the
//! difficulty tier's base plus a speed bonus proportional to the fraction
//! of the time limit still remaining; wrong and timed-out answers are
//! worth nothing.

use std::{cmp::Reverse, collections::HashMap};

use itertools::Itertools;
use serde::Serialize;

use crate::{constants, question::Question, roster::ConnectionId};

/// The recorded outcome of one player's answer to one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    /// The selected option index; `None` means the player never answered
    pub selected: Option<usize>,
    /// Whether the selection was correct
    pub is_correct: bool,
    /// Points awarded for this answer
    pub points: u64,
    /// Whole seconds left on the clock at submission
    pub time_remaining: u64,
}

impl AnswerRecord {
    /// The record written for a player who let the time limit lapse
    pub fn timed_out() -> Self {
        Self {
            selected: None,
            is_correct: false,
            points: 0,
            time_remaining: 0,
        }
    }
}

/// Scores a submitted answer against a question
///
/// A correct answer earns the difficulty tier's base points plus
/// `floor(time_remaining / time_limit * speed_bonus_cap)`; anything else
/// earns zero. `time_remaining` is clamped to the time limit so a client
/// reporting a nonsense clock cannot inflate the bonus.
///
/// # Examples
///
/// ```rust
/// use quizroom::question::sample_set;
/// use quizroom::scores::score_answer;
///
/// // easy question, instant correct answer: 100 base + 50 bonus
/// let questions = sample_set();
/// let question = &questions[0];
/// let record = score_answer(question, question.correct_index, 30);
/// assert_eq!(record.points, 150);
/// ```
pub fn score_answer(question: &Question, selected: usize, time_remaining: u64) -> AnswerRecord {
    let time_remaining = time_remaining.min(constants::quiz::TIME_LIMIT_SECS);
    let is_correct = selected == question.correct_index;
    let points = if is_correct {
        question.difficulty.base_points()
            + (time_remaining * constants::scoring::SPEED_BONUS_CAP)
                / constants::quiz::TIME_LIMIT_SECS
    } else {
        0
    };
    AnswerRecord {
        selected: Some(selected),
        is_correct,
        points,
        time_remaining,
    }
}

/// Cumulative scores for one session
///
/// Totals are reset to zero for the current roster when a quiz starts and
/// only ever grow while it runs.
#[derive(Debug, Default, Clone)]
pub struct ScoreBoard {
    totals: HashMap<ConnectionId, u64>,
}

impl ScoreBoard {
    /// Resets the board to zero for the given players
    ///
    /// Scores of players no longer present are discarded.
    pub fn reset(&mut self, players: impl Iterator<Item = ConnectionId>) {
        self.totals = players.map(|id| (id, 0)).collect();
    }

    /// Adds points to a player's total
    pub fn award(&mut self, id: ConnectionId, points: u64) {
        *self.totals.entry(id).or_default() += points;
    }

    /// Returns a player's current total
    pub fn total(&self, id: ConnectionId) -> u64 {
        self.totals.get(&id).copied().unwrap_or(0)
    }

    /// Ranks the given players by score, best first
    ///
    /// `join_order` supplies both the population and the tie-break: the
    /// sort is stable, so players with equal scores stay in join order.
    pub fn standings(&self, join_order: &[ConnectionId]) -> Vec<(ConnectionId, u64)> {
        join_order
            .iter()
            .map(|id| (*id, self.total(*id)))
            .sorted_by_key(|(_, score)| Reverse(*score))
            .collect()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::question::Difficulty;

    fn question(difficulty: Difficulty) -> Question {
        Question {
            text: "Q?".to_owned(),
            options: vec![
                "a".to_owned(),
                "b".to_owned(),
                "c".to_owned(),
                "d".to_owned(),
            ],
            correct_index: 1,
            difficulty,
            category: "Test".to_owned(),
            explanation: None,
        }
    }

    #[test]
    fn test_easy_correct_with_full_time() {
        let record = score_answer(&question(Difficulty::Easy), 1, 30);
        assert!(record.is_correct);
        assert_eq!(record.points, 150);
    }

    #[test]
    fn test_medium_correct_with_no_time_left() {
        let record = score_answer(&question(Difficulty::Medium), 1, 0);
        assert!(record.is_correct);
        assert_eq!(record.points, 150);
    }

    #[test]
    fn test_hard_correct_with_half_time() {
        let record = score_answer(&question(Difficulty::Hard), 1, 15);
        assert_eq!(record.points, 200 + 25);
    }

    #[test]
    fn test_incorrect_scores_zero_regardless_of_time() {
        let record = score_answer(&question(Difficulty::Hard), 0, 30);
        assert!(!record.is_correct);
        assert_eq!(record.points, 0);
    }

    #[test]
    fn test_speed_bonus_floors() {
        // 29/30 * 50 = 48.33..., floored to 48
        let record = score_answer(&question(Difficulty::Easy), 1, 29);
        assert_eq!(record.points, 100 + 48);
    }

    #[test]
    fn test_reported_time_is_clamped() {
        let record = score_answer(&question(Difficulty::Easy), 1, 10_000);
        assert_eq!(record.points, 150);
        assert_eq!(record.time_remaining, 30);
    }

    #[test]
    fn test_timed_out_record() {
        let record = AnswerRecord::timed_out();
        assert_eq!(record.selected, None);
        assert!(!record.is_correct);
        assert_eq!(record.points, 0);
    }

    #[test]
    fn test_reset_discards_departed_players() {
        let mut board = ScoreBoard::default();
        let gone = ConnectionId::new();
        let kept = ConnectionId::new();
        board.award(gone, 100);
        board.award(kept, 100);

        board.reset([kept].into_iter());
        assert_eq!(board.total(gone), 0);
        assert_eq!(board.total(kept), 0);
    }

    #[test]
    fn test_standings_break_ties_by_join_order() {
        let mut board = ScoreBoard::default();
        let first = ConnectionId::new();
        let second = ConnectionId::new();
        let third = ConnectionId::new();
        let join_order = [first, second, third];
        board.reset(join_order.into_iter());

        board.award(first, 100);
        board.award(second, 250);
        board.award(third, 100);

        let standings = board.standings(&join_order);
        assert_eq!(standings, vec![(second, 250), (first, 100), (third, 100)]);
    }
}
