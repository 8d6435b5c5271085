use super::super::{WireFormat, WireFormatError};

/// The quality of a clock, as carried in Announce messages and the default
/// data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ClockQuality {
    pub clock_class: u8,
    pub clock_accuracy: u8,
    pub offset_scaled_log_variance: u16,
}

impl WireFormat for ClockQuality {
    fn wire_size(&self) -> usize {
        4
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 4 {
            return Err(WireFormatError::BadLength);
        }
        buffer[0] = self.clock_class;
        buffer[1] = self.clock_accuracy;
        buffer[2..4].copy_from_slice(&self.offset_scaled_log_variance.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 4 {
            return Err(WireFormatError::BadLength);
        }
        Ok(Self {
            clock_class: buffer[0],
            clock_accuracy: buffer[1],
            offset_scaled_log_variance: u16::from_be_bytes([buffer[2], buffer[3]]),
        })
    }
}
