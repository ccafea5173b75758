//! Per-room session state machine
//!
//! This module contains the session struct and logic for one room's quiz
//! run: the player roster, the `Waiting → Playing → Ended` lifecycle, the
//! question windows with their racing completion paths, answer collection
//! and scoring, and the end-of-quiz calls to the external collaborators.
//!
//! A session never sleeps or blocks. Timed transitions are armed through a
//! caller-supplied schedule callback and delivered back as
//! [`AlarmMessage`]s; every alarm carries the [`TimerSlot`] token it was
//! armed with, so a timer made obsolete by a faster completion path
//! recognizes it is stale and no-ops.

use std::{collections::HashMap, time::Duration};

use serde::Serialize;
use thiserror::Error;
use web_time::SystemTime;

use crate::{
    constants,
    events::{Event, PlayerEntry, QuestionView, ResultEntry},
    question::{Question, QuizId},
    room_id::RoomId,
    roster::{self, ConnectionId, Player, Roster, UserId},
    scheduler::{AlarmMessage, TimerSlot},
    scores::{AnswerRecord, ScoreBoard, score_answer},
    services::{
        Achievement, AchievementService, ProfileService, QuestionSource, ResultArchive,
        SourceError,
    },
    tunnel::Tunnel,
};

/// The externally visible lifecycle state of a room
///
/// Transitions only ever run `Waiting → Playing → Ended`; `Ended` is
/// terminal, and a room that wants to play again gets a brand-new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    /// Accepting joins, waiting for the host to start
    Waiting,
    /// Questions in progress
    Playing,
    /// Results published; terminal
    Ended,
}

/// Where the current question is in its window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuestionPhase {
    /// Between the previous transition and the question broadcast
    LeadIn,
    /// Broadcast and accepting answers
    Open,
    /// Resolved, waiting out the reveal delay before advancing
    Reveal,
}

/// Runtime state of a quiz in progress
#[derive(Debug)]
struct ActiveQuiz {
    /// Immutable question snapshot taken at start
    questions: Vec<Question>,
    /// Index of the current question
    current: usize,
    /// Phase of the current question's window
    phase: QuestionPhase,
    /// Answers recorded for the current question, one per player at most
    answers: HashMap<ConnectionId, AnswerRecord>,
}

/// Internal lifecycle state with its per-state payload
#[derive(Debug)]
enum State {
    Waiting,
    Playing(Box<ActiveQuiz>),
    Ended,
}

/// Errors that can occur when operating on a session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The addressed room has no live session
    #[error("room not found")]
    UnknownRoom,
    /// Somebody other than the host tried a host-only operation
    #[error("only the host can start the quiz")]
    NotHost,
    /// The operation is not legal in the session's current state
    #[error("operation is not allowed in the current state")]
    InvalidState,
    /// The requested custom quiz does not exist
    #[error("quiz not found")]
    QuizNotFound,
    /// The drawn question set was empty
    #[error("the quiz has no questions")]
    EmptyQuestionSet,
    /// The sender is not a player in this room
    #[error("not a player in this room")]
    NotInRoom,
    /// The roster rejected the player
    #[error(transparent)]
    Roster(#[from] roster::Error),
}

/// The state and state machine for one room's quiz run
#[derive(Debug)]
pub struct Session {
    /// The room this session belongs to
    room_id: RoomId,
    /// The connection currently authorized to start the quiz
    host: ConnectionId,
    /// Players in join order
    roster: Roster,
    /// Lifecycle state
    state: State,
    /// Cumulative scores for the running (or last) quiz
    scores: ScoreBoard,
    /// Timestamp of the last player-visible mutation, for idle reaping
    last_activity: SystemTime,
    /// The single cancellable timer slot for this session
    timer: TimerSlot,
}

impl Session {
    /// Creates a new session in the `Waiting` state
    ///
    /// The creator becomes the host but is not yet a player; their
    /// [`Session::join`] follows immediately in the normal flow.
    pub fn new(room_id: RoomId, host: ConnectionId) -> Self {
        Self {
            room_id,
            host,
            roster: Roster::default(),
            state: State::Waiting,
            scores: ScoreBoard::default(),
            last_activity: SystemTime::now(),
            timer: TimerSlot::default(),
        }
    }

    /// Returns the room this session belongs to
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Returns the current host's connection id
    pub fn host(&self) -> ConnectionId {
        self.host
    }

    /// Returns the externally visible lifecycle state
    pub fn state(&self) -> RoomState {
        match self.state {
            State::Waiting => RoomState::Waiting,
            State::Playing(_) => RoomState::Playing,
            State::Ended => RoomState::Ended,
        }
    }

    /// Returns the players in join order
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Returns the current question index, if a quiz is running
    pub fn current_question(&self) -> Option<usize> {
        match &self.state {
            State::Playing(quiz) => Some(quiz.current),
            _ => None,
        }
    }

    /// Returns how many answers are recorded for the current question
    pub fn answered_count(&self) -> usize {
        match &self.state {
            State::Playing(quiz) => quiz.answers.len(),
            _ => 0,
        }
    }

    /// Returns a player's cumulative score
    pub fn score(&self, connection: ConnectionId) -> u64 {
        self.scores.total(connection)
    }

    /// Checks whether this session has been untouched for too long
    pub fn is_idle(&self, max_idle: Duration) -> bool {
        self.last_activity
            .elapsed()
            .map_or(false, |idle| idle > max_idle)
    }

    /// Moves `last_activity` into the past, for reap tests
    #[cfg(test)]
    pub(crate) fn backdate(&mut self, by: Duration) {
        self.last_activity = self
            .last_activity
            .checked_sub(by)
            .unwrap_or(SystemTime::UNIX_EPOCH);
    }

    /// Adds a connection to the room as a player
    ///
    /// Re-joining a room the connection is already in does not duplicate
    /// the player; it just re-sends the acknowledgement and a fresh player
    /// list. Joins are accepted in every lifecycle state — a late joiner
    /// to a running quiz simply has no recorded answers yet.
    ///
    /// # Arguments
    ///
    /// * `connection` - The joining connection
    /// * `name` - Display name, already validated at the boundary
    /// * `user` - Optional persistent identity
    /// * `tunnel_finder` - Function to find tunnels for connections
    ///
    /// # Errors
    ///
    /// Returns an error if the room is full.
    pub fn join<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection: ConnectionId,
        name: String,
        user: Option<UserId>,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        if !self.roster.contains(connection) {
            self.roster.add(Player {
                connection,
                name,
                user,
            })?;
        }
        self.last_activity = SystemTime::now();

        self.roster.send_to(
            connection,
            &Event::JoinedRoom {
                room_id: self.room_id.clone(),
                is_host: connection == self.host,
                state: self.state(),
            },
            &tunnel_finder,
        );
        self.broadcast_player_list(&tunnel_finder);
        Ok(())
    }

    /// Starts the quiz
    ///
    /// Captures an immutable question snapshot — a custom quiz when
    /// `quiz_id` is given, otherwise a random draw — resets all scores to
    /// zero, announces the start, and arms the lead-in timer for the first
    /// question. A source outage degrades to the built-in sample set so
    /// the start never fails for infrastructure reasons.
    ///
    /// # Arguments
    ///
    /// * `requester` - The connection asking to start
    /// * `quiz_id` - Optional custom quiz to play
    /// * `source` - The question source collaborator
    /// * `schedule` - Callback to arm timers with
    /// * `tunnel_finder` - Function to find tunnels for connections
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotHost`] if the requester is not the host,
    /// [`Error::InvalidState`] unless the session is `Waiting`,
    /// [`Error::QuizNotFound`] for an unknown custom quiz, or
    /// [`Error::EmptyQuestionSet`] if the draw came back empty. None of
    /// these mutate the session.
    pub fn start<Q, T, F, S>(
        &mut self,
        requester: ConnectionId,
        quiz_id: Option<&QuizId>,
        source: &mut Q,
        mut schedule: S,
        tunnel_finder: F,
    ) -> Result<(), Error>
    where
        Q: QuestionSource,
        T: Tunnel,
        F: Fn(ConnectionId) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    {
        if requester != self.host {
            return Err(Error::NotHost);
        }
        if !matches!(self.state, State::Waiting) {
            return Err(Error::InvalidState);
        }

        let questions = self.draw_questions(quiz_id, source)?;
        if questions.is_empty() {
            return Err(Error::EmptyQuestionSet);
        }

        self.last_activity = SystemTime::now();
        self.scores.reset(self.roster.iter().map(|p| p.connection));
        let total_questions = questions.len();
        self.state = State::Playing(Box::new(ActiveQuiz {
            questions,
            current: 0,
            phase: QuestionPhase::LeadIn,
            answers: HashMap::new(),
        }));

        self.roster
            .announce(&Event::QuizStarted { total_questions }, &tunnel_finder);
        self.timer.arm(
            &mut schedule,
            |token| AlarmMessage::ShowQuestion { token },
            Duration::from_secs(constants::quiz::LEAD_IN_SECS),
        );
        Ok(())
    }

    /// Draws the question snapshot for a quiz start
    fn draw_questions<Q: QuestionSource>(
        &self,
        quiz_id: Option<&QuizId>,
        source: &mut Q,
    ) -> Result<Vec<Question>, Error> {
        let drawn = match quiz_id {
            Some(id) => source.fetch_custom(id),
            None => source.fetch_random(constants::quiz::QUESTION_COUNT),
        };
        match drawn {
            Ok(questions) => Ok(questions),
            Err(SourceError::NotFound) => Err(Error::QuizNotFound),
            Err(SourceError::Unavailable) => {
                tracing::warn!(
                    room = %self.room_id,
                    "question source unavailable, using built-in sample set"
                );
                let mut fallback = crate::question::sample_set();
                fastrand::shuffle(&mut fallback);
                fallback.truncate(constants::quiz::QUESTION_COUNT);
                Ok(fallback)
            }
        }
    }

    /// Records a player's answer for the open question
    ///
    /// The first submission per player per question wins: anything after
    /// it — including submissions landing after the timeout already wrote
    /// a timed-out record for the player — is ignored without error or
    /// mutation. A recorded answer is scored, added to the player's total,
    /// and privately revealed to them; when it was the last outstanding
    /// answer, the fast path closes the question ahead of the hard
    /// timeout.
    ///
    /// # Arguments
    ///
    /// * `connection` - The answering connection
    /// * `answer_index` - Selected option, already bounds-checked
    /// * `time_remaining` - Whole seconds left on the client's clock
    /// * `schedule` - Callback to arm timers with
    /// * `tunnel_finder` - Function to find tunnels for connections
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if no question is open and
    /// [`Error::NotInRoom`] if the connection is not a player.
    pub fn submit_answer<T, F, S>(
        &mut self,
        connection: ConnectionId,
        answer_index: usize,
        time_remaining: u64,
        mut schedule: S,
        tunnel_finder: F,
    ) -> Result<(), Error>
    where
        T: Tunnel,
        F: Fn(ConnectionId) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    {
        if !self.roster.contains(connection) {
            return Err(Error::NotInRoom);
        }
        let State::Playing(quiz) = &mut self.state else {
            return Err(Error::InvalidState);
        };
        if quiz.answers.contains_key(&connection) {
            // at-most-one answer per player per question
            return Ok(());
        }
        if quiz.phase != QuestionPhase::Open {
            return Err(Error::InvalidState);
        }
        let Some(question) = quiz.questions.get(quiz.current) else {
            return Err(Error::InvalidState);
        };

        self.last_activity = SystemTime::now();
        let record = score_answer(question, answer_index, time_remaining);
        self.scores.award(connection, record.points);
        self.roster.send_to(
            connection,
            &Event::AnswerResult {
                is_correct: record.is_correct,
                points: record.points,
                correct_answer: question.correct_index,
                explanation: question.explanation.clone(),
            },
            &tunnel_finder,
        );
        quiz.answers.insert(connection, record);

        if quiz.answers.len() >= self.roster.len() {
            Self::finish_question(quiz, &mut self.timer, &mut schedule);
        }
        Ok(())
    }

    /// Removes a player from the room
    ///
    /// Drops any answer they held for the open question (so the
    /// all-answered denominator shrinks consistently), reassigns the host
    /// role to the next-joined remaining player when the host left, and
    /// immediately re-evaluates the fast-path condition against the
    /// shrunken roster — the remaining players' answers may now complete
    /// the question.
    ///
    /// # Returns
    ///
    /// `true` if the roster is now empty and the session should be
    /// removed from the registry.
    pub fn leave<T, F, S>(
        &mut self,
        connection: ConnectionId,
        mut schedule: S,
        tunnel_finder: F,
    ) -> bool
    where
        T: Tunnel,
        F: Fn(ConnectionId) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    {
        if self.roster.remove(connection).is_none() {
            return self.roster.is_empty();
        }
        self.last_activity = SystemTime::now();

        if let State::Playing(quiz) = &mut self.state {
            quiz.answers.remove(&connection);
        }

        if self.roster.is_empty() {
            self.timer.cancel();
            return true;
        }

        if connection == self.host {
            if let Some(next) = self.roster.first() {
                self.host = next.connection;
            }
        }

        if let State::Playing(quiz) = &mut self.state {
            if quiz.phase == QuestionPhase::Open && quiz.answers.len() >= self.roster.len() {
                Self::finish_question(quiz, &mut self.timer, &mut schedule);
            }
        }

        self.broadcast_player_list(&tunnel_finder);
        false
    }

    /// Handles a fired timer for this session
    ///
    /// Alarms whose token no longer matches the timer slot are stale —
    /// left over from a question that already resolved another way — and
    /// no-op.
    ///
    /// # Arguments
    ///
    /// * `alarm` - The alarm that fired
    /// * `services` - End-of-quiz collaborators, used when the quiz ends
    /// * `schedule` - Callback to arm follow-up timers with
    /// * `tunnel_finder` - Function to find tunnels for connections
    pub fn receive_alarm<P, T, F, S>(
        &mut self,
        alarm: AlarmMessage,
        services: &mut P,
        mut schedule: S,
        tunnel_finder: F,
    ) where
        P: ProfileService + AchievementService + ResultArchive,
        T: Tunnel,
        F: Fn(ConnectionId) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    {
        if !self.timer.accepts(alarm.token()) {
            return;
        }
        match alarm {
            AlarmMessage::ShowQuestion { .. } => self.show_question(&mut schedule, &tunnel_finder),
            AlarmMessage::TimeUp { .. } => self.question_time_up(&mut schedule),
            AlarmMessage::Advance { .. } => self.advance(services, &mut schedule, &tunnel_finder),
        }
    }

    /// Broadcasts the current question and opens it for answers
    ///
    /// The answer map is cleared here, exactly when the question goes out,
    /// and the hard timeout is armed.
    fn show_question<T, F, S>(&mut self, schedule: &mut S, tunnel_finder: &F)
    where
        T: Tunnel,
        F: Fn(ConnectionId) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    {
        let event = {
            let State::Playing(quiz) = &mut self.state else {
                return;
            };
            if quiz.phase != QuestionPhase::LeadIn {
                return;
            }
            let Some(question) = quiz.questions.get(quiz.current) else {
                return;
            };
            quiz.phase = QuestionPhase::Open;
            quiz.answers.clear();
            Event::NewQuestion {
                question_number: quiz.current + 1,
                total_questions: quiz.questions.len(),
                question: QuestionView::from(question),
                time_limit: Duration::from_secs(constants::quiz::TIME_LIMIT_SECS),
            }
        };

        self.last_activity = SystemTime::now();
        self.roster.announce(&event, tunnel_finder);
        self.timer.arm(
            schedule,
            |token| AlarmMessage::TimeUp { token },
            Duration::from_secs(
                constants::quiz::TIME_LIMIT_SECS + constants::quiz::TIMEOUT_GRACE_SECS,
            ),
        );
    }

    /// Slow path: the hard time limit elapsed
    ///
    /// Every player without an answer is recorded as timed out (no
    /// selection, zero points), then the question closes.
    fn question_time_up<S: FnMut(AlarmMessage, Duration)>(&mut self, schedule: &mut S) {
        let State::Playing(quiz) = &mut self.state else {
            return;
        };
        if quiz.phase != QuestionPhase::Open {
            return;
        }
        for player in self.roster.iter() {
            quiz.answers
                .entry(player.connection)
                .or_insert_with(AnswerRecord::timed_out);
        }
        self.last_activity = SystemTime::now();
        Self::finish_question(quiz, &mut self.timer, schedule);
    }

    /// Closes the current question and arms the reveal delay
    ///
    /// Re-arming the slot here is what stales a still-outstanding hard
    /// timeout when the fast path won the race.
    fn finish_question<S: FnMut(AlarmMessage, Duration)>(
        quiz: &mut ActiveQuiz,
        timer: &mut TimerSlot,
        schedule: &mut S,
    ) {
        quiz.phase = QuestionPhase::Reveal;
        timer.arm(
            schedule,
            |token| AlarmMessage::Advance { token },
            Duration::from_secs(constants::quiz::REVEAL_DELAY_SECS),
        );
    }

    /// Moves past a resolved question
    ///
    /// The index advances by exactly one; past the last question the quiz
    /// ends, otherwise the next question's lead-in timer is armed.
    fn advance<P, T, F, S>(&mut self, services: &mut P, schedule: &mut S, tunnel_finder: &F)
    where
        P: ProfileService + AchievementService + ResultArchive,
        T: Tunnel,
        F: Fn(ConnectionId) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    {
        let finished = {
            let State::Playing(quiz) = &mut self.state else {
                return;
            };
            if quiz.phase != QuestionPhase::Reveal {
                return;
            }
            quiz.current += 1;
            if quiz.current >= quiz.questions.len() {
                true
            } else {
                quiz.phase = QuestionPhase::LeadIn;
                false
            }
        };

        self.last_activity = SystemTime::now();
        if finished {
            self.finish_quiz(services, tunnel_finder);
        } else {
            self.timer.arm(
                schedule,
                |token| AlarmMessage::ShowQuestion { token },
                Duration::from_secs(constants::quiz::LEAD_IN_SECS),
            );
        }
    }

    /// Ends the quiz: publishes results, then runs the collaborator side
    /// effects
    ///
    /// The `quizEnded` event goes out first; XP grants, achievement checks
    /// and archival happen after it and are individually skippable — a
    /// collaborator failure is logged and never disturbs the published
    /// result.
    fn finish_quiz<P, T, F>(&mut self, services: &mut P, tunnel_finder: &F)
    where
        P: ProfileService + AchievementService + ResultArchive,
        T: Tunnel,
        F: Fn(ConnectionId) -> Option<T>,
    {
        self.state = State::Ended;
        self.timer.cancel();

        let join_order: Vec<ConnectionId> = self.roster.iter().map(|p| p.connection).collect();
        let results: Vec<ResultEntry> = self
            .scores
            .standings(&join_order)
            .into_iter()
            .filter_map(|(id, score)| {
                let player = self.roster.get(id)?;
                Some(ResultEntry {
                    id,
                    name: player.name.clone(),
                    score,
                    user_id: player.user.clone(),
                })
            })
            .collect();
        let winner = results.first().cloned();

        self.roster.announce(
            &Event::QuizEnded {
                results: results.clone(),
                winner,
            },
            tunnel_finder,
        );

        let winning_score = results.first().map_or(0, |entry| entry.score);
        for entry in &results {
            let Some(user) = &entry.user_id else {
                continue;
            };

            match services.award_xp(
                user,
                entry.score / constants::scoring::XP_PER_SCORE_DIVISOR,
            ) {
                Ok(award) if award.leveled_up => {
                    self.roster.send_to(
                        entry.id,
                        &Event::LevelUp {
                            new_level: award.new_level,
                        },
                        tunnel_finder,
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(room = %self.room_id, user = %user, error = %err, "skipping XP grant");
                }
            }

            let mut triggers = vec![Achievement::FirstQuiz];
            if entry.score == winning_score && winning_score > 0 {
                triggers.push(Achievement::TopScore);
            }
            for achievement in triggers {
                match services.check_and_award(user, achievement) {
                    Ok(true) => {
                        self.roster.send_to(
                            entry.id,
                            &Event::AchievementUnlocked { achievement },
                            tunnel_finder,
                        );
                    }
                    Ok(false) => {}
                    Err(err) => {
                        tracing::warn!(room = %self.room_id, user = %user, error = %err, "skipping achievement check");
                    }
                }
            }
        }

        if let Err(err) = services.record_result(&self.room_id, &results, SystemTime::now()) {
            tracing::warn!(room = %self.room_id, error = %err, "failed to archive quiz result");
        }
    }

    /// Recomputes and broadcasts the player-list snapshot
    ///
    /// Always rebuilt whole rather than patched, so clients cannot drift.
    fn broadcast_player_list<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(&self, tunnel_finder: &F) {
        let players = self
            .roster
            .iter()
            .map(|player| PlayerEntry {
                id: player.connection,
                name: player.name.clone(),
                score: self.scores.total(player.connection),
                is_host: player.connection == self.host,
            })
            .collect();
        self.roster.announce(
            &Event::PlayerList {
                players,
                host_id: self.host,
            },
            tunnel_finder,
        );
    }
}
