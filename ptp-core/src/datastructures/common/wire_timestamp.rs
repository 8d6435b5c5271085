use super::super::{WireFormat, WireFormatError};
use crate::time::TimeInternal;

/// The wire representation of a PTP timestamp: 48-bit seconds (sent as a
/// 16-bit high word and a 32-bit low word) plus 32-bit nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WireTimestamp {
    pub seconds: u64,
    pub nanos: u32,
}

impl WireTimestamp {
    /// Convert from [`TimeInternal`], clamping negative values to zero since
    /// the wire format has no sign.
    pub fn from_time_internal(time: TimeInternal) -> Self {
        if time.is_negative() {
            Self {
                seconds: 0,
                nanos: 0,
            }
        } else {
            Self {
                seconds: time.seconds() as u64,
                nanos: time.nanoseconds() as u32,
            }
        }
    }

    pub fn to_time_internal(self) -> TimeInternal {
        TimeInternal::new(self.seconds as i32, self.nanos as i32)
    }
}

impl WireFormat for WireTimestamp {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BadLength);
        }
        let seconds_hi = ((self.seconds >> 32) & 0xFFFF) as u16;
        let seconds_lo = (self.seconds & 0xFFFF_FFFF) as u32;
        buffer[0..2].copy_from_slice(&seconds_hi.to_be_bytes());
        buffer[2..6].copy_from_slice(&seconds_lo.to_be_bytes());
        buffer[6..10].copy_from_slice(&self.nanos.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BadLength);
        }
        let seconds_hi = u16::from_be_bytes([buffer[0], buffer[1]]) as u64;
        let seconds_lo = u32::from_be_bytes([buffer[2], buffer[3], buffer[4], buffer[5]]) as u64;
        let nanos = u32::from_be_bytes([buffer[6], buffer[7], buffer[8], buffer[9]]);
        Ok(Self {
            seconds: (seconds_hi << 32) | seconds_lo,
            nanos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let ts = WireTimestamp {
            seconds: 1_169_232_218,
            nanos: 174_389_936,
        };
        let mut buf = [0u8; 10];
        ts.serialize(&mut buf).unwrap();
        assert_eq!(WireTimestamp::deserialize(&buf).unwrap(), ts);
    }

    #[test]
    fn negative_time_internal_clamps_to_zero() {
        let t = TimeInternal::new(-5, -100);
        let ts = WireTimestamp::from_time_internal(t);
        assert_eq!(ts, WireTimestamp { seconds: 0, nanos: 0 });
    }
}
