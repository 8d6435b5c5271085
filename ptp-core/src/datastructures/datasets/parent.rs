use crate::datastructures::{
    common::{ClockIdentity, ClockQuality, PortIdentity},
    datasets::DefaultDS,
};

/// The parent data set: identity and quality of the clock this port is
/// currently synchronized to (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentDS {
    pub parent_port_identity: PortIdentity,
    pub grandmaster_identity: ClockIdentity,
    pub grandmaster_clock_quality: ClockQuality,
    pub grandmaster_priority_1: u8,
    pub grandmaster_priority_2: u8,
    pub observed_parent_offset_scaled_log_variance: u16,
    pub observed_parent_clock_phase_change_rate: i32,
}

impl ParentDS {
    /// The parent data set a newly-created clock has before any Announce is
    /// ever received: it is its own parent and grandmaster.
    pub fn new_self_parent(default_ds: &DefaultDS) -> Self {
        Self {
            parent_port_identity: PortIdentity {
                clock_identity: default_ds.clock_identity,
                port_number: 0,
            },
            grandmaster_identity: default_ds.clock_identity,
            grandmaster_clock_quality: default_ds.clock_quality,
            grandmaster_priority_1: default_ds.priority_1,
            grandmaster_priority_2: default_ds.priority_2,
            observed_parent_offset_scaled_log_variance: 0xFFFF,
            observed_parent_clock_phase_change_rate: 0,
        }
    }
}
