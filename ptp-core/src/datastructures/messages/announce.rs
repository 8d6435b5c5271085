use crate::datastructures::{
    common::{ClockIdentity, ClockQuality, TimeSource, WireTimestamp},
    WireFormat, WireFormatError,
};

/// Announce message body (64 octets including header).
///
/// Carries the sending clock's view of the grandmaster, used as the raw
/// material for BMC dataset comparison (`spec.md` §4.1, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnounceMessage {
    pub origin_timestamp: WireTimestamp,
    pub current_utc_offset: i16,
    pub grandmaster_priority_1: u8,
    pub grandmaster_clock_quality: ClockQuality,
    pub grandmaster_priority_2: u8,
    pub grandmaster_identity: ClockIdentity,
    pub steps_removed: u16,
    pub time_source: TimeSource,
}

impl AnnounceMessage {
    pub const CONTENT_LEN: usize = 30;

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BadLength);
        }

        self.origin_timestamp.serialize(&mut buffer[0..10])?;
        buffer[10..12].copy_from_slice(&self.current_utc_offset.to_be_bytes());
        buffer[12] = 0;
        buffer[13] = self.grandmaster_priority_1;
        self.grandmaster_clock_quality.serialize(&mut buffer[14..18])?;
        buffer[18] = self.grandmaster_priority_2;
        self.grandmaster_identity.serialize(&mut buffer[19..27])?;
        buffer[27..29].copy_from_slice(&self.steps_removed.to_be_bytes());
        buffer[29] = self.time_source.to_primitive();
        Ok(())
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BadLength);
        }

        Ok(Self {
            origin_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
            current_utc_offset: i16::from_be_bytes([buffer[10], buffer[11]]),
            grandmaster_priority_1: buffer[13],
            grandmaster_clock_quality: ClockQuality::deserialize(&buffer[14..18])?,
            grandmaster_priority_2: buffer[18],
            grandmaster_identity: ClockIdentity::deserialize(&buffer[19..27])?,
            steps_removed: u16::from_be_bytes([buffer[27], buffer[28]]),
            time_source: TimeSource::from_primitive(buffer[29]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AnnounceMessage {
        AnnounceMessage {
            origin_timestamp: WireTimestamp {
                seconds: 0,
                nanos: 0,
            },
            current_utc_offset: 37,
            grandmaster_priority_1: 128,
            grandmaster_clock_quality: ClockQuality {
                clock_class: 6,
                clock_accuracy: 0x21,
                offset_scaled_log_variance: 0x436A,
            },
            grandmaster_priority_2: 128,
            grandmaster_identity: ClockIdentity([0x00, 0x11, 0x22, 0xFF, 0xFE, 0x33, 0x44, 0x55]),
            steps_removed: 0,
            time_source: TimeSource::Gps,
        }
    }

    #[test]
    fn roundtrip() {
        let msg = sample();
        let mut buf = [0u8; AnnounceMessage::CONTENT_LEN];
        msg.serialize_content(&mut buf).unwrap();
        assert_eq!(AnnounceMessage::deserialize_content(&buf).unwrap(), msg);
    }

    #[test]
    fn rejects_short_buffer() {
        let buf = [0u8; AnnounceMessage::CONTENT_LEN - 1];
        assert_eq!(
            AnnounceMessage::deserialize_content(&buf),
            Err(WireFormatError::BadLength)
        );
    }
}
