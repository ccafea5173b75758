//! Communication tunnel abstraction
//!
//! This module defines the trait for delivering events from the
//! orchestrator to connected clients. The tunnel abstraction keeps the
//! core transport-agnostic: the embedding host can back it with
//! WebSockets, Server-Sent Events, or an in-memory channel in tests.

use crate::events::Event;

/// Trait for sending events through a communication tunnel
///
/// The orchestrator never holds tunnels itself; every operation receives a
/// finder closure mapping a connection id to its live tunnel, so a
/// disconnected client simply stops receiving events without the session
/// needing to know.
pub trait Tunnel {
    /// Sends an event to the client
    ///
    /// # Arguments
    ///
    /// * `event` - The event to deliver
    fn send(&self, event: &Event);

    /// Closes the communication tunnel
    ///
    /// Called when the client's connection is no longer needed.
    fn close(self);
}
