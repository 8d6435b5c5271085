use crate::datastructures::common::TimeSource;

/// The time-properties data set: characteristics of the timescale the
/// grandmaster distributes (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePropertiesDS {
    pub current_utc_offset: i16,
    pub current_utc_offset_valid: bool,
    pub leap59: bool,
    pub leap61: bool,
    pub time_traceable: bool,
    pub frequency_traceable: bool,
    pub ptp_timescale: bool,
    pub time_source: TimeSource,
}

impl TimePropertiesDS {
    /// Default properties for a clock acting as its own grandmaster, driven
    /// by a free-running internal oscillator.
    pub fn new_arbitrary() -> Self {
        Self {
            current_utc_offset: 37,
            current_utc_offset_valid: false,
            leap59: false,
            leap61: false,
            time_traceable: false,
            frequency_traceable: false,
            ptp_timescale: true,
            time_source: TimeSource::InternalOscillator,
        }
    }
}

impl Default for TimePropertiesDS {
    fn default() -> Self {
        Self::new_arbitrary()
    }
}
