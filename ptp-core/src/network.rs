//! The transport collaborator interface (§6 of the specification).
//!
//! The core knows only that there is a source of readable event/general
//! datagrams and a sink for outbound ones; it has no opinion on UDP vs.
//! Ethernet framing, multicast group membership, or how timestamps are
//! captured. `ptp-core-linux` provides the concrete implementation over
//! IPv4 multicast UDP sockets opened via the `timestamped-socket` crate.

use crate::time::TimeInternal;

/// A received datagram and, for event messages, its receive timestamp.
#[derive(Debug, Clone)]
pub struct ReceivedPacket<'a> {
    pub data: &'a [u8],
    /// Present for event messages (Sync, Delay_Req, PDelay_Req, PDelay_Resp);
    /// `None` for general messages, where no timestamp is required.
    pub timestamp: Option<TimeInternal>,
}

/// Abstraction over the transport used to exchange PTP messages with peers.
///
/// Implementations are expected to have already joined the relevant
/// multicast groups (224.0.1.129 for general/event traffic, 224.0.0.107 for
/// peer-delay traffic) on ports 319 (event) and 320 (general).
pub trait Transport {
    type Error: core::fmt::Debug;

    /// Block (up to some implementation-defined short timeout) until either
    /// readable data is available or the timeout elapses. Returns `true` if
    /// data is ready to `recv`.
    fn poll_readable(&mut self, timeout: core::time::Duration) -> Result<bool, Self::Error>;

    /// Receive one datagram into `buf`, returning the number of bytes
    /// written and, if this is an event-port datagram, its RX timestamp.
    fn recv(&mut self, buf: &mut [u8]) -> Result<(usize, Option<TimeInternal>), Self::Error>;

    /// Send a time-critical (event class) message and report its TX
    /// timestamp.
    fn send_event(&mut self, buf: &[u8], link_local: bool) -> Result<TimeInternal, Self::Error>;

    /// Send a non-time-critical (general class) message.
    fn send_general(&mut self, buf: &[u8], link_local: bool) -> Result<(), Self::Error>;
}
