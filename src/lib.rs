//! # Quizroom Orchestrator Library
//!
//! This library provides the core logic for a real-time multiplayer quiz
//! service: room and session lifecycle, the quiz state machine, question
//! timing with racing completion paths, answer collection and scoring,
//! and fan-out of state changes to every connection in a room.
//!
//! The crate is transport- and runtime-agnostic. The embedding host owns
//! the sockets and the clock: it feeds typed [`events::Command`]s and
//! disconnects into a [`registry::RoomRegistry`], implements
//! [`tunnel::Tunnel`] for its connections, schedules the
//! `(AlarmMessage, delay)` pairs handed to it, and delivers fired alarms
//! back. All entry points take `&mut` receivers, so driving a registry
//! from a single-threaded event loop gives per-room serialization for
//! free. External concerns — question banks, XP profiles, achievements,
//! result archival — sit behind the traits in [`services`].

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod constants;

pub mod events;
pub mod question;
pub mod registry;
pub mod room_id;
pub mod roster;
pub mod scheduler;
pub mod scores;
pub mod services;
pub mod session;
pub mod tunnel;
