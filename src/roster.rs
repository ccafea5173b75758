//! Player roster and event fan-out
//!
//! This module tracks the players of one room in join order and carries
//! the broadcast side of the orchestrator: fanning an event out to every
//! connected player, or addressing a single connection. Join order is
//! load-bearing — it decides host succession and final-result tie-breaks —
//! so the roster is an ordered set, not a plain map.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use crate::{constants, events::Event, tunnel::Tunnel};

/// A unique identifier for one transport connection
///
/// Connection ids are ephemeral: they live exactly as long as the
/// underlying socket. A player reconnecting gets a fresh id and counts as
/// a new player.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a new random connection id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    /// Creates a new random connection id (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    /// Parses a connection id from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A persistent user identity owned by the external profile service
///
/// Present only for logged-in players; anonymous play carries no user id.
/// The orchestrator treats it as an opaque key it hands back to the
/// profile and achievement collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a raw user identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One player in a room
///
/// Host status is not stored here; it is derived by comparing the
/// connection id against the session's current host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// The transport connection this player is attached to
    pub connection: ConnectionId,
    /// Display name chosen at join time
    pub name: String,
    /// Optional link to a persistent user profile
    pub user: Option<UserId>,
}

/// Errors that can occur when managing the roster
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The room has reached the maximum number of allowed players
    #[error("maximum number of players reached")]
    MaximumPlayers,
}

/// The ordered set of players in one room
///
/// Keyed by connection id, ordered by join time.
#[derive(Debug, Default, Clone)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    /// Adds a player at the end of the join order
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaximumPlayers`] if the room is full. Callers are
    /// expected to check [`Roster::contains`] first; adding an already
    /// present connection would duplicate it.
    pub fn add(&mut self, player: Player) -> Result<(), Error> {
        if self.players.len() >= constants::room::MAX_PLAYER_COUNT {
            return Err(Error::MaximumPlayers);
        }
        debug_assert!(!self.contains(player.connection));
        self.players.push(player);
        Ok(())
    }

    /// Removes a player, preserving the join order of the rest
    ///
    /// # Returns
    ///
    /// The removed player, or `None` if the connection was not a member.
    pub fn remove(&mut self, connection: ConnectionId) -> Option<Player> {
        let index = self
            .players
            .iter()
            .position(|p| p.connection == connection)?;
        Some(self.players.remove(index))
    }

    /// Checks whether a connection is a member of this roster
    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.players.iter().any(|p| p.connection == connection)
    }

    /// Gets a player by connection id
    pub fn get(&self, connection: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.connection == connection)
    }

    /// Returns the earliest-joined player still in the room
    pub fn first(&self) -> Option<&Player> {
        self.players.first()
    }

    /// Iterates over players in join order
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    /// Returns the number of players in the room
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Checks whether the room has no players
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Broadcasts an event to every player with a live tunnel
    ///
    /// Exactly one copy per connection; players whose tunnel has gone away
    /// are skipped silently.
    ///
    /// # Arguments
    ///
    /// * `event` - The event to fan out
    /// * `tunnel_finder` - Function to retrieve the tunnel for a connection
    pub fn announce<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &self,
        event: &Event,
        tunnel_finder: F,
    ) {
        for player in &self.players {
            if let Some(tunnel) = tunnel_finder(player.connection) {
                tunnel.send(event);
            }
        }
    }

    /// Sends an event to a single connection
    ///
    /// Used for directed traffic: join acknowledgements, private answer
    /// reveals, error replies, and level-up/achievement notices.
    ///
    /// # Arguments
    ///
    /// * `connection` - The connection to address
    /// * `event` - The event to send
    /// * `tunnel_finder` - Function to retrieve the tunnel for a connection
    pub fn send_to<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &self,
        connection: ConnectionId,
        event: &Event,
        tunnel_finder: F,
    ) {
        if let Some(tunnel) = tunnel_finder(connection) {
            tunnel.send(event);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn player(name: &str) -> Player {
        Player {
            connection: ConnectionId::new(),
            name: name.to_owned(),
            user: None,
        }
    }

    #[derive(Debug, Clone, Default)]
    struct MockTunnel {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl Tunnel for MockTunnel {
        fn send(&self, event: &Event) {
            self.events.lock().unwrap().push(event.clone());
        }

        fn close(self) {}
    }

    #[test]
    fn test_add_preserves_join_order() {
        let mut roster = Roster::default();
        let first = player("first");
        let second = player("second");
        roster.add(first.clone()).unwrap();
        roster.add(second.clone()).unwrap();

        let names: Vec<_> = roster.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(roster.first(), Some(&first));
    }

    #[test]
    fn test_remove_keeps_order_of_rest() {
        let mut roster = Roster::default();
        let a = player("a");
        let b = player("b");
        let c = player("c");
        roster.add(a.clone()).unwrap();
        roster.add(b.clone()).unwrap();
        roster.add(c.clone()).unwrap();

        assert_eq!(roster.remove(b.connection), Some(b));
        let names: Vec<_> = roster.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
        assert!(!roster.contains(ConnectionId::new()));
    }

    #[test]
    fn test_remove_unknown_is_none() {
        let mut roster = Roster::default();
        assert_eq!(roster.remove(ConnectionId::new()), None);
    }

    #[test]
    fn test_announce_reaches_only_live_tunnels() {
        let mut roster = Roster::default();
        let connected = player("connected");
        let ghost = player("ghost");
        roster.add(connected.clone()).unwrap();
        roster.add(ghost.clone()).unwrap();

        let tunnel = MockTunnel::default();
        let finder = {
            let tunnel = tunnel.clone();
            let connected_id = connected.connection;
            move |id: ConnectionId| (id == connected_id).then(|| tunnel.clone())
        };

        roster.announce(
            &Event::QuizStarted {
                total_questions: 10,
            },
            finder,
        );

        assert_eq!(tunnel.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_send_to_addresses_one_connection() {
        let roster = Roster::default();
        let tunnel = MockTunnel::default();
        let target = ConnectionId::new();
        let finder = {
            let tunnel = tunnel.clone();
            move |id: ConnectionId| (id == target).then(|| tunnel.clone())
        };

        roster.send_to(
            target,
            &Event::QuizStarted { total_questions: 3 },
            &finder,
        );
        roster.send_to(
            ConnectionId::new(),
            &Event::QuizStarted { total_questions: 3 },
            &finder,
        );

        assert_eq!(tunnel.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_connection_id_round_trip() {
        let id = ConnectionId::new();
        let parsed = ConnectionId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }
}
