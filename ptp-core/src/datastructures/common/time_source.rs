/// The `timeSource` field of the time-properties data set / Announce body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    AtomicClock,
    Gps,
    TerrestrialRadio,
    Ptp,
    Ntp,
    HandSet,
    Other,
    InternalOscillator,
    /// A vendor-specific or otherwise unrecognized value, preserved verbatim
    /// so unpack/pack round-trips even for values the standard doesn't
    /// enumerate.
    Other8(u8),
}

impl TimeSource {
    pub const fn to_primitive(self) -> u8 {
        match self {
            TimeSource::AtomicClock => 0x10,
            TimeSource::Gps => 0x20,
            TimeSource::TerrestrialRadio => 0x30,
            TimeSource::Ptp => 0x40,
            TimeSource::Ntp => 0x50,
            TimeSource::HandSet => 0x60,
            TimeSource::Other => 0x90,
            TimeSource::InternalOscillator => 0xA0,
            TimeSource::Other8(v) => v,
        }
    }

    pub const fn from_primitive(value: u8) -> Self {
        match value {
            0x10 => TimeSource::AtomicClock,
            0x20 => TimeSource::Gps,
            0x30 => TimeSource::TerrestrialRadio,
            0x40 => TimeSource::Ptp,
            0x50 => TimeSource::Ntp,
            0x60 => TimeSource::HandSet,
            0x90 => TimeSource::Other,
            0xA0 => TimeSource::InternalOscillator,
            other => TimeSource::Other8(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_known_values() {
        for ts in [
            TimeSource::AtomicClock,
            TimeSource::Gps,
            TimeSource::Ptp,
            TimeSource::InternalOscillator,
        ] {
            assert_eq!(TimeSource::from_primitive(ts.to_primitive()), ts);
        }
    }
}
