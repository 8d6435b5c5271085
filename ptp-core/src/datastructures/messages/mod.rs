//! The ten PTP message types and their pack/unpack (§4.1).

mod announce;
mod delay_req;
mod delay_resp;
mod follow_up;
mod header;
mod p_delay_req;
mod p_delay_resp;
mod p_delay_resp_follow_up;
mod sync;

pub use announce::AnnounceMessage;
pub use delay_req::DelayReqMessage;
pub use delay_resp::DelayRespMessage;
pub use follow_up::FollowUpMessage;
pub use header::{FlagField, Header, HEADER_LEN};
pub use p_delay_req::PDelayReqMessage;
pub use p_delay_resp::PDelayRespMessage;
pub use p_delay_resp_follow_up::PDelayRespFollowUpMessage;
pub use sync::SyncMessage;

use super::WireFormatError;

/// The `messageType` nibble of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Sync = 0x0,
    DelayReq = 0x1,
    PDelayReq = 0x2,
    PDelayResp = 0x3,
    FollowUp = 0x8,
    DelayResp = 0x9,
    PDelayRespFollowUp = 0xA,
    Announce = 0xB,
    Signaling = 0xC,
    Management = 0xD,
}

pub struct UnknownMessageType;

impl TryFrom<u8> for MessageType {
    type Error = UnknownMessageType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use MessageType::*;
        Ok(match value {
            0x0 => Sync,
            0x1 => DelayReq,
            0x2 => PDelayReq,
            0x3 => PDelayResp,
            0x8 => FollowUp,
            0x9 => DelayResp,
            0xA => PDelayRespFollowUp,
            0xB => Announce,
            0xC => Signaling,
            0xD => Management,
            _ => return Err(UnknownMessageType),
        })
    }
}

impl MessageType {
    pub const fn to_primitive(self) -> u8 {
        self as u8
    }

    /// True for event (time-critical, port 319) messages.
    pub const fn is_event(self) -> bool {
        matches!(
            self,
            MessageType::Sync
                | MessageType::DelayReq
                | MessageType::PDelayReq
                | MessageType::PDelayResp
        )
    }

    /// The `controlField` byte legacy PTPv1 receivers use to classify a
    /// message; PTPv2-only receivers should ignore it, but we still set it
    /// correctly, as `ptpd` does, for interoperability with mixed networks.
    pub const fn control_field(self) -> u8 {
        match self {
            MessageType::Sync => 0x00,
            MessageType::DelayReq => 0x01,
            MessageType::FollowUp => 0x02,
            MessageType::DelayResp => 0x03,
            MessageType::Management => 0x04,
            _ => 0x05,
        }
    }
}

/// A decoded header plus its body, as handed to a port's dispatch logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Sync(SyncMessage),
    DelayReq(DelayReqMessage),
    PDelayReq(PDelayReqMessage),
    PDelayResp(PDelayRespMessage),
    FollowUp(FollowUpMessage),
    DelayResp(DelayRespMessage),
    PDelayRespFollowUp(PDelayRespFollowUpMessage),
    Announce(AnnounceMessage),
}

/// Decode the header and, based on its `message_type`, the matching body.
///
/// Returns `None` for Signaling/Management, which are accepted by the codec
/// (so the header check and discard path still apply) but have no body type
/// defined by this crate: management is explicitly out of scope (`spec.md`
/// §1) beyond what the state machines require.
pub fn decode(buffer: &[u8]) -> Result<(Header, Option<MessageBody>), WireFormatError> {
    use crate::datastructures::WireFormat;

    let header = Header::deserialize(buffer)?;
    let body_buf = buffer.get(HEADER_LEN..).unwrap_or(&[]);

    let body = match header.message_type {
        MessageType::Sync => Some(MessageBody::Sync(SyncMessage::deserialize_content(body_buf)?)),
        MessageType::DelayReq => Some(MessageBody::DelayReq(DelayReqMessage::deserialize_content(
            body_buf,
        )?)),
        MessageType::PDelayReq => Some(MessageBody::PDelayReq(
            PDelayReqMessage::deserialize_content(body_buf)?,
        )),
        MessageType::PDelayResp => Some(MessageBody::PDelayResp(
            PDelayRespMessage::deserialize_content(body_buf)?,
        )),
        MessageType::FollowUp => Some(MessageBody::FollowUp(FollowUpMessage::deserialize_content(
            body_buf,
        )?)),
        MessageType::DelayResp => Some(MessageBody::DelayResp(
            DelayRespMessage::deserialize_content(body_buf)?,
        )),
        MessageType::PDelayRespFollowUp => Some(MessageBody::PDelayRespFollowUp(
            PDelayRespFollowUpMessage::deserialize_content(body_buf)?,
        )),
        MessageType::Announce => Some(MessageBody::Announce(AnnounceMessage::deserialize_content(
            body_buf,
        )?)),
        MessageType::Signaling | MessageType::Management => None,
    };

    Ok((header, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_roundtrip() {
        for raw in [0x0u8, 0x1, 0x2, 0x3, 0x8, 0x9, 0xA, 0xB, 0xC, 0xD] {
            let ty = MessageType::try_from(raw).unwrap();
            assert_eq!(ty.to_primitive(), raw);
        }
        assert!(MessageType::try_from(0x4).is_err());
    }
}
