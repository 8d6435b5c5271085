//! State-decision algorithm, IEEE 1588 figure 26 (`spec.md` §4.4).

use core::cmp::Ordering;

use super::dataset_comparison::{compare, ComparisonRecord};
use crate::{
    bmc::foreign_master::ForeignMasterRecord,
    datastructures::{common::TimeSource, datasets::DefaultDS},
    port::PortState,
};

/// The side effect BMC wants applied to the clock's data sets, returned
/// alongside the new port state so that applying it stays the caller's
/// responsibility (`spec.md` §9's note on nested-conditional dispatch).
#[derive(Debug, Clone, Copy)]
pub enum BmcAction {
    /// M1 (table 13): the local clock becomes the grandmaster.
    M1,
    /// S1 (table 16): synchronize the parent/grandmaster/time-properties
    /// data sets to the winning foreign master.
    S1(ForeignMasterRecord),
    /// No foreign records are qualified and the port is already LISTENING:
    /// remain LISTENING without touching any data set.
    RemainListening,
    /// The defensive tie branch ("MB: Is this the return code below
    /// correct?", `spec.md` §9): treated as an algorithmic fault.
    Fault,
}

/// Apply M1 (table 13): zero stepsRemoved/offsets, copy own identity and
/// quality into the parent/grandmaster fields.
pub fn apply_m1(default_ds: &DefaultDS) -> crate::datastructures::datasets::ParentDS {
    crate::datastructures::datasets::ParentDS::new_self_parent(default_ds)
}

/// Apply S1 (table 16): increment stepsRemoved, adopt the sender as parent,
/// copy grandmaster fields and time-properties bits from the Announce.
pub fn apply_s1(
    record: &ForeignMasterRecord,
) -> (
    crate::datastructures::datasets::ParentDS,
    crate::datastructures::datasets::TimePropertiesDS,
) {
    use crate::datastructures::datasets::{ParentDS, TimePropertiesDS};

    let announce = &record.announce;
    let header = &record.header;

    let parent_ds = ParentDS {
        parent_port_identity: header.source_port_identity,
        grandmaster_identity: announce.grandmaster_identity,
        grandmaster_clock_quality: announce.grandmaster_clock_quality,
        grandmaster_priority_1: announce.grandmaster_priority_1,
        grandmaster_priority_2: announce.grandmaster_priority_2,
        observed_parent_offset_scaled_log_variance: 0xFFFF,
        observed_parent_clock_phase_change_rate: 0,
    };

    let time_properties_ds = TimePropertiesDS {
        current_utc_offset: announce.current_utc_offset,
        current_utc_offset_valid: header.flags.current_utc_offset_valid,
        leap59: header.flags.leap59,
        leap61: header.flags.leap61,
        time_traceable: header.flags.time_traceable,
        frequency_traceable: header.flags.frequency_traceable,
        ptp_timescale: header.flags.ptp_timescale,
        time_source: announce.time_source,
    };

    (parent_ds, time_properties_ds)
}

/// `timeSource` written into the time-properties/grandmaster fields by M1.
pub const M1_TIME_SOURCE: TimeSource = TimeSource::InternalOscillator;

/// Decide the next port state given the current best qualified foreign
/// record (if any) and the local clock's own data (`spec.md` §4.4).
///
/// `current_state` and `parent_port_identity` are needed for the
/// "no foreign records, already LISTENING" short-circuit and the topology
/// tie-break inside [`compare`], respectively.
pub fn decide(
    best: Option<&ForeignMasterRecord>,
    default_ds: &DefaultDS,
    current_state: PortState,
    parent_port_identity: crate::datastructures::common::PortIdentity,
) -> (PortState, BmcAction) {
    if default_ds.slave_only {
        return match best {
            Some(record) => (PortState::Slave, BmcAction::S1(*record)),
            // slaveOnly with nothing to slave to yet: stay put.
            None => (current_state, BmcAction::RemainListening),
        };
    }

    let Some(best) = best else {
        if current_state == PortState::Listening {
            return (PortState::Listening, BmcAction::RemainListening);
        }
        // ptpd's `bmc()` wrapper applies M1 and keeps MASTER outright when
        // the foreign-master table is empty; we apply the same rule to any
        // other state reaching here with nothing to compare against, since
        // normal port-state transitions route an empty table through
        // LISTENING first (table in `spec.md` §4.5).
        return (PortState::Master, BmcAction::M1);
    };

    let own = ComparisonRecord::from_own_data(default_ds);
    let foreign = ComparisonRecord::from_announce(best.header.source_port_identity, &best.announce);

    let ordering = compare(&own, &foreign, parent_port_identity);
    let own_is_master_class = default_ds.clock_quality.clock_class < 128;

    match (ordering, own_is_master_class) {
        (Ordering::Less, _) => (PortState::Master, BmcAction::M1),
        (Ordering::Greater, true) => (PortState::Passive, BmcAction::S1(*best)),
        (Ordering::Greater, false) => (PortState::Slave, BmcAction::S1(*best)),
        (Ordering::Equal, _) => (PortState::Faulty, BmcAction::Fault),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::{
        common::{ClockIdentity, ClockQuality, PortIdentity, TimeSource, WireTimestamp},
        messages::{AnnounceMessage, Header, MessageType},
    };

    fn default_ds(clock_class: u8, slave_only: bool) -> DefaultDS {
        DefaultDS::new_ordinary_clock(
            ClockIdentity([0xAA; 8]),
            ClockQuality {
                clock_class,
                clock_accuracy: 0x21,
                offset_scaled_log_variance: 0xFFFF,
            },
            128,
            128,
            0,
            slave_only,
        )
    }

    fn record_with_class(clock_class: u8) -> ForeignMasterRecord {
        let header = Header {
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([0xBB; 8]),
                port_number: 1,
            },
            ..Header::new(MessageType::Announce, 64, 0)
        };
        let announce = AnnounceMessage {
            origin_timestamp: WireTimestamp::default(),
            current_utc_offset: 37,
            grandmaster_priority_1: 128,
            grandmaster_clock_quality: ClockQuality {
                clock_class,
                clock_accuracy: 0x21,
                offset_scaled_log_variance: 0xFFFF,
            },
            grandmaster_priority_2: 128,
            grandmaster_identity: ClockIdentity([0xBB; 8]),
            steps_removed: 0,
            time_source: TimeSource::Gps,
        };
        ForeignMasterRecord {
            source_port_identity: header.source_port_identity,
            header,
            announce,
            announce_count: 2,
        }
    }

    fn own_port() -> PortIdentity {
        PortIdentity {
            clock_identity: ClockIdentity([0xAA; 8]),
            port_number: 1,
        }
    }

    #[test]
    fn slave_only_never_returns_master() {
        let ds = default_ds(6, true);
        let record = record_with_class(248);
        let (state, _) = decide(Some(&record), &ds, PortState::Listening, own_port());
        assert_eq!(state, PortState::Slave);
    }

    #[test]
    fn no_foreign_records_in_listening_remains_listening() {
        let ds = default_ds(6, false);
        let (state, _) = decide(None, &ds, PortState::Listening, own_port());
        assert_eq!(state, PortState::Listening);
    }

    #[test]
    fn s5_master_election_when_own_clock_class_beats_candidate() {
        let ds = default_ds(6, false);
        let record = record_with_class(248);
        let (state, action) = decide(Some(&record), &ds, PortState::Listening, own_port());
        assert_eq!(state, PortState::Master);
        assert!(matches!(action, BmcAction::M1));
    }

    #[test]
    fn own_master_class_but_worse_becomes_passive_not_slave() {
        let ds = default_ds(100, false);
        let record = record_with_class(6);
        let (state, _) = decide(Some(&record), &ds, PortState::Listening, own_port());
        assert_eq!(state, PortState::Passive);
    }

    #[test]
    fn own_non_master_class_and_worse_becomes_slave() {
        let ds = default_ds(200, false);
        let record = record_with_class(6);
        let (state, _) = decide(Some(&record), &ds, PortState::Listening, own_port());
        assert_eq!(state, PortState::Slave);
    }
}
