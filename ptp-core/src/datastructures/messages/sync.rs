use crate::datastructures::{common::WireTimestamp, WireFormat, WireFormatError};

/// Sync message body (44 octets including header): `originTimestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMessage {
    pub origin_timestamp: WireTimestamp,
}

impl SyncMessage {
    pub const CONTENT_LEN: usize = 10;

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BadLength);
        }
        self.origin_timestamp.serialize(&mut buffer[0..10])
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
        let msg = SyncMessage {
            origin_timestamp: WireTimestamp {
                seconds: 10,
                nanos: 500,
            },
        };
        let mut buf = [0u8; SyncMessage::CONTENT_LEN];
        msg.serialize_content(&mut buf).unwrap();
        assert_eq!(SyncMessage::deserialize_content(&buf).unwrap(), msg);
    }
}
