//! A snapshot of the instance's data sets for external observation.
//!
//! This is deliberately not the IEEE 1588 management protocol (out of scope,
//! `spec.md` §1): it is a read-only copy of the four data sets plus the
//! servo's internal state, meant to be serialized by a consumer such as
//! `ptp-core-linux::observer` without that consumer needing to depend on, or
//! poll the internals of, `Port`/`PtpInstance` directly.

use crate::{
    datastructures::{
        common::{ClockIdentity, ClockQuality, PortIdentity},
        datasets::DelayMechanism,
    },
    port::PortState,
    time::TimeInternal,
    PtpInstance,
};

/// A point-in-time copy of everything an operator would want to inspect
/// about a running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub clock_identity: ClockIdentity,
    pub clock_quality: ClockQuality,
    pub priority_1: u8,
    pub priority_2: u8,
    pub domain_number: u8,
    pub slave_only: bool,

    pub port_identity: PortIdentity,
    pub port_state: PortState,
    pub delay_mechanism: DelayMechanism,

    pub parent_port_identity: PortIdentity,
    pub grandmaster_identity: ClockIdentity,
    pub grandmaster_clock_quality: ClockQuality,

    pub steps_removed: u16,
    pub offset_from_master: TimeInternal,
    pub mean_path_delay: TimeInternal,

    /// The servo's accumulated frequency correction, in ppb
    /// (`spec.md` §4.6, GLOSSARY's "observed drift").
    pub observed_drift_ppb: i32,
}

impl Snapshot {
    pub fn capture(instance: &PtpInstance) -> Self {
        let default_ds = instance.default_ds();
        let parent_ds = instance.parent_ds();
        let current_ds = instance.current_ds();
        let port_ds = instance.port_ds();

        Self {
            clock_identity: default_ds.clock_identity,
            clock_quality: default_ds.clock_quality,
            priority_1: default_ds.priority_1,
            priority_2: default_ds.priority_2,
            domain_number: default_ds.domain_number,
            slave_only: default_ds.slave_only,

            port_identity: port_ds.port_identity,
            port_state: port_ds.port_state,
            delay_mechanism: port_ds.delay_mechanism,

            parent_port_identity: parent_ds.parent_port_identity,
            grandmaster_identity: parent_ds.grandmaster_identity,
            grandmaster_clock_quality: parent_ds.grandmaster_clock_quality,

            steps_removed: current_ds.steps_removed,
            offset_from_master: current_ds.offset_from_master,
            mean_path_delay: current_ds.mean_path_delay,

            observed_drift_ppb: instance.port().servo().observed_drift(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InstanceConfig, PortConfig};
    use crate::datastructures::common::ClockQuality;

    #[test]
    fn snapshot_reflects_a_freshly_created_instance() {
        let instance_config = InstanceConfig {
            clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
            clock_quality: ClockQuality {
                clock_class: 248,
                clock_accuracy: 0xFE,
                offset_scaled_log_variance: 0xFFFF,
            },
            priority_1: 128,
            priority_2: 128,
            domain_number: 0,
            slave_only: false,
        };
        let instance = PtpInstance::new(instance_config, PortConfig::default(), 3.0);
        let snapshot = Snapshot::capture(&instance);

        assert_eq!(snapshot.clock_identity, instance_config.clock_identity);
        assert_eq!(snapshot.port_state, PortState::Initializing);
        assert_eq!(snapshot.steps_removed, 0);
        assert_eq!(snapshot.observed_drift_ppb, 0);
    }
}
