//! Question timing and stale-timer protection
//!
//! Each session has exactly one logical timer slot. Arming a new timer
//! bumps a generation counter and tags the scheduled alarm with it; when
//! an alarm fires, the session only acts if the alarm's token still
//! matches the slot. A timer left over from a previous question (or from a
//! fast path that beat a hard timeout) therefore recognizes it is stale
//! and no-ops, which is what guarantees exactly one completion path per
//! question.
//!
//! The orchestrator never sleeps itself: it hands `(AlarmMessage, delay)`
//! pairs to a caller-supplied schedule callback and expects the host to
//! deliver the alarm back after the delay.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A generation tag identifying one arming of a session's timer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerToken(u64);

/// Alarm messages for timed transitions of a session
///
/// Each variant carries the token it was armed with so that the session
/// can reject stale firings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Broadcast the current question and open it for answers
    ShowQuestion {
        /// Token this alarm was armed with
        token: TimerToken,
    },
    /// The hard time limit for the open question has elapsed
    TimeUp {
        /// Token this alarm was armed with
        token: TimerToken,
    },
    /// The reveal delay has elapsed; move to the next question or end
    Advance {
        /// Token this alarm was armed with
        token: TimerToken,
    },
}

impl AlarmMessage {
    /// Returns the token this alarm was armed with
    pub fn token(self) -> TimerToken {
        match self {
            Self::ShowQuestion { token } | Self::TimeUp { token } | Self::Advance { token } => {
                token
            }
        }
    }
}

/// A session's single cancellable timer slot
///
/// Only the most recently armed alarm is live; everything armed earlier is
/// stale by construction.
#[derive(Debug, Default, Clone)]
pub struct TimerSlot {
    generation: u64,
}

impl TimerSlot {
    /// Arms a new timer, invalidating any outstanding one
    ///
    /// # Arguments
    ///
    /// * `schedule` - The caller-supplied schedule callback
    /// * `make` - Constructor for the alarm variant to arm
    /// * `delay` - How long the host should wait before delivering it
    pub fn arm<S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        schedule: &mut S,
        make: impl FnOnce(TimerToken) -> AlarmMessage,
        delay: Duration,
    ) {
        self.generation += 1;
        schedule(make(TimerToken(self.generation)), delay);
    }

    /// Checks whether a fired alarm is still the live one
    pub fn accepts(&self, token: TimerToken) -> bool {
        token == TimerToken(self.generation)
    }

    /// Invalidates any outstanding timer without arming a new one
    pub fn cancel(&mut self) {
        self.generation += 1;
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_arm_schedules_with_fresh_token() {
        let mut slot = TimerSlot::default();
        let mut scheduled = Vec::new();
        slot.arm(
            &mut |alarm, delay| scheduled.push((alarm, delay)),
            |token| AlarmMessage::TimeUp { token },
            Duration::from_secs(30),
        );

        let (alarm, delay) = scheduled.pop().unwrap();
        assert_eq!(delay, Duration::from_secs(30));
        assert!(slot.accepts(alarm.token()));
    }

    #[test]
    fn test_rearming_stales_the_previous_alarm() {
        let mut slot = TimerSlot::default();
        let mut scheduled = Vec::new();
        let mut schedule = |alarm, delay| scheduled.push((alarm, delay));

        slot.arm(
            &mut schedule,
            |token| AlarmMessage::TimeUp { token },
            Duration::from_secs(32),
        );
        slot.arm(
            &mut schedule,
            |token| AlarmMessage::Advance { token },
            Duration::from_secs(3),
        );

        let (stale, _) = scheduled[0];
        let (live, _) = scheduled[1];
        assert!(!slot.accepts(stale.token()));
        assert!(slot.accepts(live.token()));
    }

    #[test]
    fn test_cancel_invalidates_without_scheduling() {
        let mut slot = TimerSlot::default();
        let mut scheduled = Vec::new();
        slot.arm(
            &mut |alarm, delay| scheduled.push((alarm, delay)),
            |token| AlarmMessage::ShowQuestion { token },
            Duration::from_secs(2),
        );
        let (alarm, _) = scheduled.pop().unwrap();

        slot.cancel();
        assert!(!slot.accepts(alarm.token()));
        assert!(scheduled.is_empty());
    }
}
