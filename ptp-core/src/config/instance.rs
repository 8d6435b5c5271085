use crate::datastructures::common::{ClockIdentity, ClockQuality};

/// Instance-wide configuration: the fields of the default data set that are
/// set once at startup (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceConfig {
    pub clock_identity: ClockIdentity,
    pub clock_quality: ClockQuality,
    pub priority_1: u8,
    pub priority_2: u8,
    pub domain_number: u8,
    pub slave_only: bool,
}
