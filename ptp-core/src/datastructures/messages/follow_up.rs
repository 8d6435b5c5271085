use crate::datastructures::{common::WireTimestamp, WireFormat, WireFormatError};

/// Follow_Up message body (44 octets including header):
/// `preciseOriginTimestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpMessage {
    pub precise_origin_timestamp: WireTimestamp,
}

impl FollowUpMessage {
    pub const CONTENT_LEN: usize = 10;

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BadLength);
        }
        self.precise_origin_timestamp.serialize(&mut buffer[0..10])
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BadLength);
        }
        Ok(Self {
            precise_origin_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let msg = FollowUpMessage {
            precise_origin_timestamp: WireTimestamp {
                seconds: 1,
                nanos: 1_000_000_000 - 1,
            },
        };
        let mut buf = [0u8; FollowUpMessage::CONTENT_LEN];
        msg.serialize_content(&mut buf).unwrap();
        assert_eq!(FollowUpMessage::deserialize_content(&buf).unwrap(), msg);
    }
}
