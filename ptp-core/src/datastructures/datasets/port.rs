use crate::{datastructures::common::PortIdentity, port::PortState, time::TimeInternal};

/// Which path-delay measurement mode a port uses; a port uses exactly one at
/// a time (`spec.md` §6, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayMechanism {
    /// End-to-end: slave-initiated Delay_Req/Delay_Resp against the master.
    E2E,
    /// Peer-to-peer: PDelay_Req/Resp/Follow_Up against the adjacent link
    /// partner, independent of which clock is master.
    P2P,
    /// No path-delay measurement is performed; `meanPathDelay` stays zero.
    Disabled,
}

/// The port configuration data set (`spec.md` §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortDS {
    pub port_identity: PortIdentity,
    pub port_state: PortState,
    pub log_min_delay_req_interval: i8,
    pub peer_mean_path_delay: TimeInternal,
    pub log_announce_interval: i8,
    pub announce_receipt_timeout: u8,
    pub log_sync_interval: i8,
    pub delay_mechanism: DelayMechanism,
    pub log_min_pdelay_req_interval: i8,
    pub version_number: u8,
}

impl PortDS {
    pub fn new(port_identity: PortIdentity, delay_mechanism: DelayMechanism) -> Self {
        Self {
            port_identity,
            port_state: PortState::Initializing,
            log_min_delay_req_interval: 0,
            peer_mean_path_delay: TimeInternal::ZERO,
            log_announce_interval: 1,
            announce_receipt_timeout: 6,
            log_sync_interval: 0,
            delay_mechanism,
            log_min_pdelay_req_interval: 0,
            version_number: 2,
        }
    }
}
