//! Room registry: session ownership, routing, and reaping
//!
//! The registry is the single mutation entry point for every room. It is
//! an explicitly owned value — no ambient singleton — so tests and
//! embedders can run any number of independent instances. Because every
//! command, fired timer, disconnect, and idle sweep goes through
//! `&mut RoomRegistry` on the host's single-threaded dispatcher,
//! mutations on one room can never interleave, and two concurrent first
//! joins to the same unknown room cannot create two sessions.

use std::{collections::HashMap, time::Duration};

use garde::Validate;

use crate::{
    events::{Command, Event},
    room_id::RoomId,
    roster::ConnectionId,
    scheduler::AlarmMessage,
    services::{AchievementService, ProfileService, QuestionSource, ResultArchive},
    session::{self, Session},
    tunnel::Tunnel,
};

/// Maps room ids to their live sessions
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Session>,
}

impl RoomRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the session for a room, creating a fresh `Waiting` one if the
    /// room id is unknown
    ///
    /// The creator becomes the new session's host. A room re-created
    /// after removal shares nothing with its predecessor.
    pub fn get_or_create(&mut self, room_id: &RoomId, creator: ConnectionId) -> &mut Session {
        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| Session::new(room_id.clone(), creator))
    }

    /// Gets the live session for a room, if any
    pub fn get(&self, room_id: &RoomId) -> Option<&Session> {
        self.rooms.get(room_id)
    }

    /// Gets the live session for a room mutably, if any
    pub fn get_mut(&mut self, room_id: &RoomId) -> Option<&mut Session> {
        self.rooms.get_mut(room_id)
    }

    /// Removes a room's session
    pub fn remove(&mut self, room_id: &RoomId) -> Option<Session> {
        self.rooms.remove(room_id)
    }

    /// Returns the number of live sessions
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Checks whether no sessions are live
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Handles one inbound command from a connection
    ///
    /// The payload is validated before any session is touched; a
    /// validation failure or a session error is answered with an `error`
    /// event to the originating connection only, and mutates nothing.
    ///
    /// # Arguments
    ///
    /// * `connection` - The connection the command came from
    /// * `command` - The command to apply
    /// * `source` - Question source, used by `startQuiz`
    /// * `schedule` - Callback to arm timers with; alarms must come back
    ///   through [`RoomRegistry::deliver_alarm`] for the same room
    /// * `tunnel_finder` - Function to find tunnels for connections
    pub fn apply<Q, T, F, S>(
        &mut self,
        connection: ConnectionId,
        command: Command,
        source: &mut Q,
        schedule: S,
        tunnel_finder: F,
    ) where
        Q: QuestionSource,
        T: Tunnel,
        F: Fn(ConnectionId) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    {
        if let Err(report) = command.validate() {
            Self::reject(connection, report.to_string(), &tunnel_finder);
            return;
        }

        let result = match command {
            Command::JoinRoom {
                room_id,
                player_name,
                user_id,
            } => self
                .get_or_create(&room_id, connection)
                .join(connection, player_name, user_id, &tunnel_finder),
            Command::StartQuiz { room_id, quiz_id } => match self.get_mut(&room_id) {
                Some(room) => room.start(
                    connection,
                    quiz_id.as_ref(),
                    source,
                    schedule,
                    &tunnel_finder,
                ),
                None => Err(session::Error::UnknownRoom),
            },
            Command::SubmitAnswer {
                room_id,
                answer_index,
                time_remaining,
            } => match self.get_mut(&room_id) {
                Some(room) => room.submit_answer(
                    connection,
                    answer_index,
                    time_remaining,
                    schedule,
                    &tunnel_finder,
                ),
                None => Err(session::Error::UnknownRoom),
            },
        };

        if let Err(err) = result {
            Self::reject(connection, err.to_string(), &tunnel_finder);
        }
    }

    /// Delivers a fired timer back to its room
    ///
    /// Alarms for rooms that no longer exist are dropped; staleness within
    /// a live room is the session's token check.
    pub fn deliver_alarm<P, T, F, S>(
        &mut self,
        room_id: &RoomId,
        alarm: AlarmMessage,
        services: &mut P,
        schedule: S,
        tunnel_finder: F,
    ) where
        P: ProfileService + AchievementService + ResultArchive,
        T: Tunnel,
        F: Fn(ConnectionId) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.receive_alarm(alarm, services, schedule, tunnel_finder);
        }
    }

    /// Handles a connection dropping out of a room
    ///
    /// The session is removed immediately — regardless of the idle
    /// threshold — when its last player leaves.
    pub fn disconnect<T, F, S>(
        &mut self,
        room_id: &RoomId,
        connection: ConnectionId,
        schedule: S,
        tunnel_finder: F,
    ) where
        T: Tunnel,
        F: Fn(ConnectionId) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        if room.leave(connection, schedule, tunnel_finder) {
            self.rooms.remove(room_id);
            tracing::debug!(room = %room_id, "removed empty room");
        }
    }

    /// Removes every session idle past the threshold
    ///
    /// The embedding host runs this on a fixed interval, independent of
    /// room traffic; it shares the registry's exclusive borrow, so it can
    /// never race an in-flight mutation on the same room.
    ///
    /// # Returns
    ///
    /// The room ids that were reaped.
    pub fn sweep(&mut self, max_idle: Duration) -> Vec<RoomId> {
        let expired: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.is_idle(max_idle))
            .map(|(id, _)| id.clone())
            .collect();
        for room_id in &expired {
            self.rooms.remove(room_id);
            tracing::debug!(room = %room_id, "reaped idle room");
        }
        expired
    }

    /// Sends an `error` event to the originating connection only
    fn reject<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        connection: ConnectionId,
        message: String,
        tunnel_finder: &F,
    ) {
        if let Some(tunnel) = tunnel_finder(connection) {
            tunnel.send(&Event::Error { message });
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::{
        str::FromStr,
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::{services::SampleQuestions, session::RoomState};

    #[derive(Debug, Clone, Default)]
    struct MockTunnel {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl MockTunnel {
        fn drain(&self) -> Vec<Event> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl Tunnel for MockTunnel {
        fn send(&self, event: &Event) {
            self.events.lock().unwrap().push(event.clone());
        }

        fn close(self) {}
    }

    type Tunnels = HashMap<ConnectionId, MockTunnel>;

    fn finder(tunnels: &Tunnels) -> impl Fn(ConnectionId) -> Option<MockTunnel> + '_ {
        move |id| tunnels.get(&id).cloned()
    }

    fn room_id(code: &str) -> RoomId {
        RoomId::from_str(code).unwrap()
    }

    fn join(name: &str) -> Command {
        Command::JoinRoom {
            room_id: room_id("ABC123"),
            player_name: name.to_owned(),
            user_id: None,
        }
    }

    #[test]
    fn test_join_creates_room_lazily() {
        let mut registry = RoomRegistry::new();
        let host = ConnectionId::new();
        let mut tunnels = Tunnels::new();
        tunnels.insert(host, MockTunnel::default());

        registry.apply(
            host,
            join("Hana"),
            &mut SampleQuestions,
            |_, _| {},
            finder(&tunnels),
        );

        assert_eq!(registry.len(), 1);
        let room = registry.get(&room_id("abc123")).unwrap();
        assert_eq!(room.host(), host);
        assert_eq!(room.state(), RoomState::Waiting);
        assert_eq!(room.room_id(), &room_id("ABC123"));

        registry.remove(&room_id("ABC123"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_second_join_lands_in_same_room() {
        let mut registry = RoomRegistry::new();
        let host = ConnectionId::new();
        let player = ConnectionId::new();
        let mut tunnels = Tunnels::new();
        tunnels.insert(host, MockTunnel::default());
        tunnels.insert(player, MockTunnel::default());

        registry.apply(host, join("Hana"), &mut SampleQuestions, |_, _| {}, finder(&tunnels));
        registry.apply(player, join("Piet"), &mut SampleQuestions, |_, _| {}, finder(&tunnels));

        assert_eq!(registry.len(), 1);
        let room = registry.get(&room_id("ABC123")).unwrap();
        assert_eq!(room.roster().len(), 2);
        assert_eq!(room.host(), host);
    }

    #[test]
    fn test_invalid_command_rejected_to_origin_only() {
        let mut registry = RoomRegistry::new();
        let host = ConnectionId::new();
        let stranger = ConnectionId::new();
        let mut tunnels = Tunnels::new();
        tunnels.insert(host, MockTunnel::default());
        tunnels.insert(stranger, MockTunnel::default());

        registry.apply(host, join("Hana"), &mut SampleQuestions, |_, _| {}, finder(&tunnels));
        tunnels[&host].drain();

        registry.apply(
            stranger,
            join("   "),
            &mut SampleQuestions,
            |_, _| {},
            finder(&tunnels),
        );

        // nothing was created or mutated for the blank name
        assert_eq!(registry.get(&room_id("ABC123")).unwrap().roster().len(), 1);
        assert!(matches!(
            tunnels[&stranger].drain().as_slice(),
            [Event::Error { .. }]
        ));
        assert!(tunnels[&host].drain().is_empty());
    }

    #[test]
    fn test_command_for_unknown_room_is_an_error() {
        let mut registry = RoomRegistry::new();
        let host = ConnectionId::new();
        let mut tunnels = Tunnels::new();
        tunnels.insert(host, MockTunnel::default());

        registry.apply(
            host,
            Command::StartQuiz {
                room_id: room_id("NOROOM"),
                quiz_id: None,
            },
            &mut SampleQuestions,
            |_, _| {},
            finder(&tunnels),
        );

        assert!(registry.is_empty());
        assert!(matches!(
            tunnels[&host].drain().as_slice(),
            [Event::Error { .. }]
        ));
    }

    #[test]
    fn test_start_then_alarm_round_trip() {
        let mut registry = RoomRegistry::new();
        let host = ConnectionId::new();
        let mut tunnels = Tunnels::new();
        tunnels.insert(host, MockTunnel::default());
        let mut scheduled = Vec::new();

        registry.apply(host, join("Hana"), &mut SampleQuestions, |_, _| {}, finder(&tunnels));
        registry.apply(
            host,
            Command::StartQuiz {
                room_id: room_id("ABC123"),
                quiz_id: None,
            },
            &mut SampleQuestions,
            |alarm, delay| scheduled.push((alarm, delay)),
            finder(&tunnels),
        );

        let (show, _) = scheduled.remove(0);
        registry.deliver_alarm(
            &room_id("ABC123"),
            show,
            &mut crate::services::NullServices,
            |alarm, delay| scheduled.push((alarm, delay)),
            finder(&tunnels),
        );

        let room = registry.get(&room_id("ABC123")).unwrap();
        assert_eq!(room.current_question(), Some(0));
        assert!(
            tunnels[&host]
                .drain()
                .iter()
                .any(|e| matches!(e, Event::NewQuestion { .. }))
        );
    }

    #[test]
    fn test_alarm_for_vanished_room_is_dropped() {
        let mut registry = RoomRegistry::new();
        let tunnels = Tunnels::new();
        let mut scheduled = Vec::new();

        // arm a throwaway slot just to get a well-formed alarm
        let mut slot = crate::scheduler::TimerSlot::default();
        let mut armed = Vec::new();
        slot.arm(
            &mut |alarm, _| armed.push(alarm),
            |token| AlarmMessage::Advance { token },
            Duration::from_secs(3),
        );

        registry.deliver_alarm(
            &room_id("GONE"),
            armed.pop().unwrap(),
            &mut crate::services::NullServices,
            |alarm, delay| scheduled.push((alarm, delay)),
            finder(&tunnels),
        );
        assert!(scheduled.is_empty());
    }

    #[test]
    fn test_disconnect_of_last_player_removes_room() {
        let mut registry = RoomRegistry::new();
        let host = ConnectionId::new();
        let mut tunnels = Tunnels::new();
        tunnels.insert(host, MockTunnel::default());

        registry.apply(host, join("Hana"), &mut SampleQuestions, |_, _| {}, finder(&tunnels));
        assert_eq!(registry.len(), 1);

        registry.disconnect(&room_id("ABC123"), host, |_, _| {}, finder(&tunnels));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rejoining_after_removal_gets_a_fresh_session() {
        let mut registry = RoomRegistry::new();
        let host = ConnectionId::new();
        let rejoiner = ConnectionId::new();
        let mut tunnels = Tunnels::new();
        tunnels.insert(host, MockTunnel::default());
        tunnels.insert(rejoiner, MockTunnel::default());
        let mut scheduled = Vec::new();

        registry.apply(host, join("Hana"), &mut SampleQuestions, |_, _| {}, finder(&tunnels));
        registry.apply(
            host,
            Command::StartQuiz {
                room_id: room_id("ABC123"),
                quiz_id: None,
            },
            &mut SampleQuestions,
            |alarm, delay| scheduled.push((alarm, delay)),
            finder(&tunnels),
        );
        registry.disconnect(&room_id("ABC123"), host, |_, _| {}, finder(&tunnels));

        registry.apply(rejoiner, join("Piet"), &mut SampleQuestions, |_, _| {}, finder(&tunnels));
        let room = registry.get(&room_id("ABC123")).unwrap();
        assert_eq!(room.state(), RoomState::Waiting);
        assert_eq!(room.host(), rejoiner);
        assert_eq!(room.score(rejoiner), 0);
        assert_eq!(room.current_question(), None);
    }

    #[test]
    fn test_sweep_reaps_only_idle_rooms() {
        let mut registry = RoomRegistry::new();
        let host = ConnectionId::new();
        let other = ConnectionId::new();
        let mut tunnels = Tunnels::new();
        tunnels.insert(host, MockTunnel::default());
        tunnels.insert(other, MockTunnel::default());

        registry.apply(host, join("Hana"), &mut SampleQuestions, |_, _| {}, finder(&tunnels));
        registry.apply(
            other,
            Command::JoinRoom {
                room_id: room_id("OTHER1"),
                player_name: "Piet".to_owned(),
                user_id: None,
            },
            &mut SampleQuestions,
            |_, _| {},
            finder(&tunnels),
        );

        registry
            .get_mut(&room_id("ABC123"))
            .unwrap()
            .backdate(Duration::from_secs(7200));

        let reaped = registry.sweep(Duration::from_secs(3600));
        assert_eq!(reaped, vec![room_id("ABC123")]);
        assert!(registry.get(&room_id("ABC123")).is_none());
        assert!(registry.get(&room_id("OTHER1")).is_some());
    }
}
