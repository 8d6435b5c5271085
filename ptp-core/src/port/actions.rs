//! Actions a [`super::Port`] asks its caller to perform: send bytes, or
//! reschedule a timer. Grounded in the teacher's `PortAction`/
//! `TimestampContext` split (`port/actions.rs`), trimmed to what this crate's
//! simpler (non-TLV, single-port) model needs.

use arrayvec::ArrayVec;

use super::timers::TimerId;

/// Largest message this crate ever builds (Announce, 64 octets).
pub const MAX_MESSAGE_LEN: usize = 64;

/// A fully-encoded outbound message, ready for the transport collaborator.
pub type OutgoingMessage = ArrayVec<u8, MAX_MESSAGE_LEN>;

/// Identifies which pending exchange a just-sent event message belongs to,
/// so its transmit timestamp can be routed back to the right piece of state
/// once the transport reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampContext {
    Sync { sequence_id: u16 },
    DelayReq { sequence_id: u16 },
    PDelayReq { sequence_id: u16 },
    PDelayResp { sequence_id: u16 },
}

/// An action the port asks its caller (`PtpInstance`, ultimately the
/// orchestrator) to perform.
#[derive(Debug)]
#[must_use]
pub enum PortAction {
    /// Send a time-critical message on the event socket/multicast group.
    /// The caller must capture its transmit timestamp and report it back
    /// via `Port::handle_send_timestamp`.
    SendEvent {
        message: OutgoingMessage,
        link_local: bool,
        context: TimestampContext,
    },
    /// Send a non-time-critical message on the general socket/group.
    SendGeneral {
        message: OutgoingMessage,
        link_local: bool,
    },
    /// (Re)start a named timer for `interval_seconds`.
    ResetTimer {
        id: TimerId,
        interval_seconds: f64,
    },
    /// Stop a named timer.
    StopTimer { id: TimerId },
}

/// Small fixed-capacity collection of actions returned by a single dispatch
/// call; no single handler in this protocol needs more than a handful.
pub type PortActions = ArrayVec<PortAction, 4>;
