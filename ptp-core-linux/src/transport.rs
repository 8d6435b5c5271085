//! UDP/IPv4 multicast transport, grounded in `statime-linux::socket`'s use of
//! `timestamped_socket` for the event/general sockets and multicast groups.

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    time::{Duration, Instant},
};

use clock_steering::Timestamp;
use ptp_core::{network::Transport, time::TimeInternal};
use timestamped_socket::{
    interface::InterfaceName,
    socket::{open_interface_udp4, InterfaceTimestampMode, Open, Socket},
};

const IPV4_PRIMARY_MULTICAST: Ipv4Addr = Ipv4Addr::new(224, 0, 1, 129);
const IPV4_PDELAY_MULTICAST: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 107);

const EVENT_PORT: u16 = 319;
const GENERAL_PORT: u16 = 320;

/// `Socket` exposes readiness polling per-fd with no primitive to wait on
/// both at once, so `poll_readable` alternates short polls across the event
/// and general sockets until one is ready or `timeout` elapses.
const POLL_SLICE: Duration = Duration::from_millis(5);

/// The two multicast-joined UDP sockets a port needs: one time-critical
/// (event, port 319) and one best-effort (general, port 320).
pub struct LinuxTransport {
    event: Socket<SocketAddrV4, Open>,
    general: Socket<SocketAddrV4, Open>,
}

impl LinuxTransport {
    pub fn open(interface: InterfaceName, timestamping: InterfaceTimestampMode, bind_phc: Option<u32>) -> std::io::Result<Self> {
        let event = open_interface_udp4(interface, EVENT_PORT, timestamping, bind_phc)?;
        event.join_multicast(SocketAddrV4::new(IPV4_PRIMARY_MULTICAST, 0), interface)?;
        event.join_multicast(SocketAddrV4::new(IPV4_PDELAY_MULTICAST, 0), interface)?;

        let general = open_interface_udp4(interface, GENERAL_PORT, InterfaceTimestampMode::None, None)?;
        general.join_multicast(SocketAddrV4::new(IPV4_PRIMARY_MULTICAST, 0), interface)?;
        general.join_multicast(SocketAddrV4::new(IPV4_PDELAY_MULTICAST, 0), interface)?;

        Ok(Self { event, general })
    }
}

fn target_address(link_local: bool) -> SocketAddrV4 {
    // `link_local` distinguishes the peer-delay multicast group (used by
    // PDelay_*) from the primary group (used by everything else),
    // `spec.md` §6's two multicast groups.
    if link_local {
        SocketAddrV4::new(IPV4_PDELAY_MULTICAST, EVENT_PORT)
    } else {
        SocketAddrV4::new(IPV4_PRIMARY_MULTICAST, EVENT_PORT)
    }
}

fn to_time_internal(ts: Timestamp) -> TimeInternal {
    TimeInternal::new(ts.seconds as i32, ts.nanos as i32)
}

impl Transport for LinuxTransport {
    type Error = std::io::Error;

    fn poll_readable(&mut self, timeout: Duration) -> Result<bool, Self::Error> {
        // `recv` below reads from both the event and general sockets, so
        // readiness has to cover both too: general-only traffic (Announce,
        // Follow_Up, Delay_Resp, PDelay_Resp_Follow_Up on port 320) must not
        // be starved just because the event socket stays quiet.
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            if self.event.poll_readable(remaining.min(POLL_SLICE))? {
                return Ok(true);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            if self.general.poll_readable(remaining.min(POLL_SLICE))? {
                return Ok(true);
            }
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<(usize, Option<TimeInternal>), Self::Error> {
        if let Some(result) = self.event.try_recv(buf)? {
            return Ok((result.bytes_read, result.timestamp.map(to_time_internal)));
        }
        let result = self.general.try_recv(buf)?;
        Ok((result.map(|r| r.bytes_read).unwrap_or(0), None))
    }

    fn send_event(&mut self, buf: &[u8], link_local: bool) -> Result<TimeInternal, Self::Error> {
        let timestamp = self
            .event
            .send_to(buf, target_address(link_local))?
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "no transmit timestamp available"))?;
        Ok(to_time_internal(timestamp))
    }

    fn send_general(&mut self, buf: &[u8], link_local: bool) -> Result<(), Self::Error> {
        let ip = if link_local { IPV4_PDELAY_MULTICAST } else { IPV4_PRIMARY_MULTICAST };
        self.general.send_to(buf, SocketAddrV4::new(ip, GENERAL_PORT))?;
        Ok(())
    }
}
