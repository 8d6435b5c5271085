use crate::datastructures::common::{ClockIdentity, ClockQuality};

/// The default data set: properties of the local clock that never change in
/// response to BMC, only in response to (re)configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultDS {
    pub clock_identity: ClockIdentity,
    pub number_ports: u16,
    pub clock_quality: ClockQuality,
    pub priority_1: u8,
    pub priority_2: u8,
    pub domain_number: u8,
    pub slave_only: bool,
}

impl DefaultDS {
    /// Construct the default data set for an ordinary clock (`number_ports`
    /// is always 1; `spec.md` §3).
    ///
    /// If `slave_only` is set, `clock_quality.clock_class` is forced to 255
    /// regardless of the value passed in, per `spec.md` §3's invariant.
    pub fn new_ordinary_clock(
        clock_identity: ClockIdentity,
        mut clock_quality: ClockQuality,
        priority_1: u8,
        priority_2: u8,
        domain_number: u8,
        slave_only: bool,
    ) -> Self {
        if slave_only {
            clock_quality.clock_class = 255;
        }

        Self {
            clock_identity,
            number_ports: 1,
            clock_quality,
            priority_1,
            priority_2,
            domain_number,
            slave_only,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slave_only_forces_clock_class_255() {
        let ds = DefaultDS::new_ordinary_clock(
            ClockIdentity([0; 8]),
            ClockQuality {
                clock_class: 6,
                clock_accuracy: 0x21,
                offset_scaled_log_variance: 0,
            },
            128,
            128,
            0,
            true,
        );
        assert_eq!(ds.clock_quality.clock_class, 255);
    }
}
