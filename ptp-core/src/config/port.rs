use crate::{datastructures::datasets::DelayMechanism, servo::ServoConfig, time::TimeInternal};

/// Per-port configuration (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfig {
    pub log_announce_interval: i8,
    pub log_sync_interval: i8,
    pub log_min_delay_req_interval: i8,
    pub log_min_pdelay_req_interval: i8,
    pub announce_receipt_timeout: u8,
    pub delay_mechanism: DelayMechanism,
    pub max_foreign_records: u16,
    pub servo: ServoConfig,
    pub inbound_latency: TimeInternal,
    pub outbound_latency: TimeInternal,
    /// Whether outbound Sync/PDelay_Req carry their origin timestamp in a
    /// trailing Follow_Up/PDelay_Resp_Follow_Up rather than embedded
    /// on-wire. Recovered from `ptpd`'s `TWO_STEP_FLAG` configuration item,
    /// which `spec.md`'s distillation omits but the port state machine
    /// (`spec.md` §4.5) requires to decide between the two Sync paths.
    pub two_step: bool,
    /// Announce-interval multiples a port may wait in UNCALIBRATED/SLAVE for
    /// the next Sync before giving up on the current parent (`spec.md` §2's
    /// "sync receipt timeout"; `ptpd`'s equivalent is a fixed constant, kept
    /// here as a config knob since nothing in `spec.md` §6 forbids it).
    pub sync_receipt_timeout: u8,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            log_announce_interval: 1,
            log_sync_interval: 0,
            log_min_delay_req_interval: 0,
            log_min_pdelay_req_interval: 0,
            announce_receipt_timeout: 6,
            delay_mechanism: DelayMechanism::E2E,
            max_foreign_records: 5,
            servo: ServoConfig::default(),
            inbound_latency: TimeInternal::ZERO,
            outbound_latency: TimeInternal::ZERO,
            two_step: true,
            sync_receipt_timeout: 3,
        }
    }
}
