use crate::datastructures::{
    common::{PortIdentity, WireTimestamp},
    WireFormat, WireFormatError,
};

/// PDelay_Resp message body (54 octets including header):
/// `requestReceiptTimestamp`, `requestingPortIdentity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PDelayRespMessage {
    pub request_receipt_timestamp: WireTimestamp,
    pub requesting_port_identity: PortIdentity,
}

impl PDelayRespMessage {
    pub const CONTENT_LEN: usize = 20;

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BadLength);
        }
        self.request_receipt_timestamp.serialize(&mut buffer[0..10])?;
        self.requesting_port_identity.serialize(&mut buffer[10..20])
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BadLength);
        }
        Ok(Self {
            request_receipt_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
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
        let msg = PDelayRespMessage {
            request_receipt_timestamp: WireTimestamp {
                seconds: 7,
                nanos: 42,
            },
            requesting_port_identity: PortIdentity {
                clock_identity: ClockIdentity([8, 7, 6, 5, 4, 3, 2, 1]),
                port_number: 2,
            },
        };
        let mut buf = [0u8; PDelayRespMessage::CONTENT_LEN];
        msg.serialize_content(&mut buf).unwrap();
        assert_eq!(PDelayRespMessage::deserialize_content(&buf).unwrap(), msg);
    }
}
