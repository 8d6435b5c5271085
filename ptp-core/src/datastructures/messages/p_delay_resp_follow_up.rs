use crate::datastructures::{
    common::{PortIdentity, WireTimestamp},
    WireFormat, WireFormatError,
};

/// PDelay_Resp_Follow_Up message body (54 octets including header):
/// `responseOriginTimestamp`, `requestingPortIdentity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PDelayRespFollowUpMessage {
    pub response_origin_timestamp: WireTimestamp,
    pub requesting_port_identity: PortIdentity,
}

impl PDelayRespFollowUpMessage {
    pub const CONTENT_LEN: usize = 20;

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BadLength);
        }
        self.response_origin_timestamp.serialize(&mut buffer[0..10])?;
        self.requesting_port_identity.serialize(&mut buffer[10..20])
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BadLength);
        }
        Ok(Self {
            response_origin_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
            requesting_port_identity: PortIdentity::deserialize(&buffer[10..20])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    #[test]
    fn roundtrip() {
        let msg = PDelayRespFollowUpMessage {
            response_origin_timestamp: WireTimestamp {
                seconds: 3,
                nanos: 500,
            },
            requesting_port_identity: PortIdentity {
                clock_identity: ClockIdentity([1; 8]),
                port_number: 3,
            },
        };
        let mut buf = [0u8; PDelayRespFollowUpMessage::CONTENT_LEN];
        msg.serialize_content(&mut buf).unwrap();
        assert_eq!(
            PDelayRespFollowUpMessage::deserialize_content(&buf).unwrap(),
            msg
        );
    }
}
