use crate::datastructures::{common::WireTimestamp, WireFormat, WireFormatError};

/// PDelay_Req message body (54 octets including header): `originTimestamp`
/// followed by 10 reserved octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PDelayReqMessage {
    pub origin_timestamp: WireTimestamp,
}

impl PDelayReqMessage {
    pub const CONTENT_LEN: usize = 20;

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BadLength);
        }
        self.origin_timestamp.serialize(&mut buffer[0..10])?;
        buffer[10..20].fill(0);
        Ok(())
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BadLength);
        }
        Ok(Self {
            origin_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let msg = PDelayReqMessage {
            origin_timestamp: WireTimestamp {
                seconds: 1169232218,
                nanos: 174389936,
            },
        };
        let mut buf = [0u8; PDelayReqMessage::CONTENT_LEN];
        msg.serialize_content(&mut buf).unwrap();
        assert_eq!(PDelayReqMessage::deserialize_content(&buf).unwrap(), msg);
        assert_eq!(&buf[10..20], &[0u8; 10]);
    }
}
