//! Data-set comparison, IEEE 1588 figures 27-28 (`spec.md` §4.4).

use core::cmp::Ordering;

use crate::datastructures::{
    common::{ClockIdentity, ClockQuality, PortIdentity},
    datasets::DefaultDS,
    messages::AnnounceMessage,
};

/// The pieces of an Announce (or the local default data set, pretending it
/// emitted one) that the comparison algorithm needs. Building this once per
/// side keeps `compare` itself a pure function over plain data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonRecord {
    pub grandmaster_priority_1: u8,
    pub grandmaster_identity: ClockIdentity,
    pub grandmaster_clock_quality: ClockQuality,
    pub grandmaster_priority_2: u8,
    pub steps_removed: u16,
    pub sender: PortIdentity,
}

impl ComparisonRecord {
    pub fn from_announce(header_source: PortIdentity, announce: &AnnounceMessage) -> Self {
        Self {
            grandmaster_priority_1: announce.grandmaster_priority_1,
            grandmaster_identity: announce.grandmaster_identity,
            grandmaster_clock_quality: announce.grandmaster_clock_quality,
            grandmaster_priority_2: announce.grandmaster_priority_2,
            steps_removed: announce.steps_removed,
            sender: header_source,
        }
    }

    /// The record the local clock would emit about itself, as if it were a
    /// foreign master: `stepsRemoved = 0`, sender = own port identity.
    pub fn from_own_data(default_ds: &DefaultDS) -> Self {
        Self {
            grandmaster_priority_1: default_ds.priority_1,
            grandmaster_identity: default_ds.clock_identity,
            grandmaster_clock_quality: default_ds.clock_quality,
            grandmaster_priority_2: default_ds.priority_2,
            steps_removed: 0,
            sender: PortIdentity {
                clock_identity: default_ds.clock_identity,
                port_number: 0,
            },
        }
    }
}

/// Compare two qualified records. `Ordering::Less` means `a` is better than
/// `b` (so `a` "sorts first", matching the common convention that the best
/// candidate is the minimum).
///
/// `parent_port_identity` is the current parent, needed only for the
/// defensive sender-equals-receiver tie case in figure 28; pass the local
/// port's own identity before a parent has ever been established.
pub fn compare(
    a: &ComparisonRecord,
    b: &ComparisonRecord,
    parent_port_identity: PortIdentity,
) -> Ordering {
    if a.grandmaster_identity == b.grandmaster_identity {
        compare_same_grandmaster(a, b, parent_port_identity)
    } else {
        compare_different_grandmaster(a, b)
    }
}

/// Figure 27: different grandmasters, lexicographic comparison.
fn compare_different_grandmaster(a: &ComparisonRecord, b: &ComparisonRecord) -> Ordering {
    a.grandmaster_priority_1
        .cmp(&b.grandmaster_priority_1)
        .then_with(|| {
            a.grandmaster_clock_quality
                .clock_class
                .cmp(&b.grandmaster_clock_quality.clock_class)
        })
        .then_with(|| {
            a.grandmaster_clock_quality
                .clock_accuracy
                .cmp(&b.grandmaster_clock_quality.clock_accuracy)
        })
        .then_with(|| {
            a.grandmaster_clock_quality
                .offset_scaled_log_variance
                .cmp(&b.grandmaster_clock_quality.offset_scaled_log_variance)
        })
        .then_with(|| a.grandmaster_priority_2.cmp(&b.grandmaster_priority_2))
        .then_with(|| a.grandmaster_identity.cmp(&b.grandmaster_identity))
}

/// Figure 28: same grandmaster, steps-removed and topology tie-break.
///
/// `ptpd`'s `bmcDataSetComparison` returns its "sender == receiver" error
/// case as 0 (equal); this is the "MB: Is this the return code below
/// correct?" branch flagged in `spec.md` §9. We preserve that behaviour
/// verbatim rather than extend it.
fn compare_same_grandmaster(
    a: &ComparisonRecord,
    b: &ComparisonRecord,
    parent_port_identity: PortIdentity,
) -> Ordering {
    let steps_diff = a.steps_removed as i32 - b.steps_removed as i32;

    match steps_diff {
        2..=i32::MAX => Ordering::Greater,
        i32::MIN..=-2 => Ordering::Less,
        1 => {
            if a.sender == parent_port_identity {
                Ordering::Equal
            } else {
                Ordering::Greater
            }
        }
        -1 => {
            if b.sender == parent_port_identity {
                Ordering::Equal
            } else {
                Ordering::Less
            }
        }
        0 => {
            if a.sender == b.sender {
                Ordering::Equal
            } else {
                a.sender.cmp(&b.sender)
            }
        }
        _ => unreachable!("i32 difference of two u16 values is always in -1..=1 outside the matched ranges"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    fn base() -> ComparisonRecord {
        ComparisonRecord {
            grandmaster_priority_1: 128,
            grandmaster_identity: ClockIdentity([1; 8]),
            grandmaster_clock_quality: ClockQuality {
                clock_class: 6,
                clock_accuracy: 0x21,
                offset_scaled_log_variance: 0x436A,
            },
            grandmaster_priority_2: 128,
            steps_removed: 0,
            sender: PortIdentity {
                clock_identity: ClockIdentity([1; 8]),
                port_number: 1,
            },
        }
    }

    fn own_port() -> PortIdentity {
        PortIdentity {
            clock_identity: ClockIdentity([0xFF; 8]),
            port_number: 1,
        }
    }

    #[test]
    fn s2_grandmaster_identity_tiebreak() {
        let mut a = base();
        a.grandmaster_identity = ClockIdentity([0x00, 0, 0, 0, 0, 0, 0, 0x01]);
        let mut b = base();
        b.grandmaster_identity = ClockIdentity([0x00, 0, 0, 0, 0, 0, 0, 0x02]);

        assert_eq!(compare(&a, &b, own_port()), Ordering::Less);
        assert_eq!(compare(&b, &a, own_port()), Ordering::Greater);
    }

    #[test]
    fn antisymmetric_across_priority1() {
        let a = base();
        let mut b = base();
        b.grandmaster_priority_1 = 200;
        assert_eq!(compare(&a, &b, own_port()), Ordering::Less);
        assert_eq!(compare(&b, &a, own_port()), Ordering::Greater);
    }

    #[test]
    fn same_grandmaster_fewer_steps_removed_wins_outright() {
        let a = base();
        let mut b = base();
        b.steps_removed = 3;
        assert_eq!(compare(&a, &b, own_port()), Ordering::Less);
    }

    #[test]
    fn same_grandmaster_one_step_difference_favors_non_parent_sender() {
        let mut a = base();
        a.steps_removed = 1;
        a.sender = PortIdentity {
            clock_identity: ClockIdentity([7; 8]),
            port_number: 1,
        };
        let b = base();

        // b is "closer" (fewer steps) but a's sender isn't our parent, so the
        // topology tie-break doesn't apply and a still loses on steps.
        assert_eq!(compare(&a, &b, own_port()), Ordering::Greater);
    }

    #[test]
    fn same_grandmaster_equal_steps_tie_breaks_on_sender_identity() {
        let mut a = base();
        a.sender.clock_identity = ClockIdentity([1; 8]);
        let mut b = base();
        b.sender.clock_identity = ClockIdentity([2; 8]);
        assert_eq!(compare(&a, &b, own_port()), Ordering::Less);

        let mut c = base();
        c.sender = a.sender;
        assert_eq!(compare(&a, &c, own_port()), Ordering::Equal);
    }
}
