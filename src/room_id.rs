//! Room code generation and management
//!
//! This module provides the opaque keys that identify rooms. Codes are
//! case-normalized on parse so that players typing `abc123` and `ABC123`
//! land in the same room, and a generator is provided for hosts that want
//! the system to pick a shareable code for them.

use std::{fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

use crate::constants;

/// Errors that can occur when parsing a room code
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The code contained no characters
    #[error("room code must not be empty")]
    Empty,
    /// The code exceeded the maximum length
    #[error("room code is too long")]
    TooLong,
    /// The code contained a character outside `[A-Za-z0-9]`
    #[error("room code may only contain letters and digits")]
    InvalidCharacter,
}

/// A unique identifier for a room
///
/// Room codes are short alphanumeric strings, normalized to ASCII
/// uppercase so they can be shared verbally or on a screen without case
/// ambiguity. A `RoomId` can only be constructed through parsing or
/// [`RoomId::random`], so every instance is guaranteed normalized.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct RoomId(String);

impl RoomId {
    /// Generates a new random room code
    ///
    /// The code is a fixed-length uppercase alphanumeric string, long
    /// enough that accidental collisions between concurrently running
    /// rooms are unlikely.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quizroom::room_id::RoomId;
    ///
    /// let id = RoomId::random();
    /// assert_eq!(id.as_str().len(), 6);
    /// ```
    pub fn random() -> Self {
        let code: String = (0..constants::room::RANDOM_CODE_LENGTH)
            .map(|_| fastrand::alphanumeric().to_ascii_uppercase())
            .collect();
        Self(code)
    }

    /// Returns the normalized code as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RoomId {
    /// Formats the room code in its normalized (uppercase) form
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoomId {
    type Err = Error;

    /// Parses and normalizes a room code
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the code is empty, too long, or contains
    /// characters other than ASCII letters and digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < constants::room::MIN_CODE_LENGTH {
            return Err(Error::Empty);
        }
        if s.len() > constants::room::MAX_CODE_LENGTH {
            return Err(Error::TooLong);
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidCharacter);
        }
        Ok(Self(s.to_ascii_uppercase()))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let lower = RoomId::from_str("abc123").unwrap();
        let upper = RoomId::from_str("ABC123").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.as_str(), "ABC123");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(RoomId::from_str(""), Err(Error::Empty));
    }

    #[test]
    fn test_parse_rejects_too_long() {
        let code = "A".repeat(constants::room::MAX_CODE_LENGTH + 1);
        assert_eq!(RoomId::from_str(&code), Err(Error::TooLong));
    }

    #[test]
    fn test_parse_rejects_invalid_characters() {
        assert_eq!(RoomId::from_str("ABC 123"), Err(Error::InvalidCharacter));
        assert_eq!(RoomId::from_str("ABC-12"), Err(Error::InvalidCharacter));
    }

    #[test]
    fn test_random_is_normalized() {
        for _ in 0..100 {
            let id = RoomId::random();
            assert_eq!(id.as_str().len(), constants::room::RANDOM_CODE_LENGTH);
            assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
            assert_eq!(id.as_str(), id.as_str().to_ascii_uppercase());
        }
    }

    #[test]
    fn test_serde_round_trip() {
        let id = RoomId::from_str("quiz42").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"QUIZ42\"");

        let back: RoomId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_deserialize_rejects_malformed() {
        let result: Result<RoomId, _> = serde_json::from_str("\"no spaces\"");
        assert!(result.is_err());
    }
}
