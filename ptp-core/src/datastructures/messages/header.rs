use super::MessageType;
use crate::datastructures::{common::PortIdentity, WireFormat, WireFormatError};

pub const HEADER_LEN: usize = 34;

/// Flags carried in the 2-octet `flagField`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagField {
    pub two_step: bool,
    pub leap61: bool,
    pub leap59: bool,
    pub current_utc_offset_valid: bool,
    pub ptp_timescale: bool,
    pub time_traceable: bool,
    pub frequency_traceable: bool,
}

impl FlagField {
    fn to_bytes(self) -> [u8; 2] {
        let mut byte0 = 0u8;
        if self.two_step {
            byte0 |= 1 << 1;
        }

        let mut byte1 = 0u8;
        if self.leap61 {
            byte1 |= 1 << 0;
        }
        if self.leap59 {
            byte1 |= 1 << 1;
        }
        if self.current_utc_offset_valid {
            byte1 |= 1 << 2;
        }
        if self.ptp_timescale {
            byte1 |= 1 << 3;
        }
        if self.time_traceable {
            byte1 |= 1 << 4;
        }
        if self.frequency_traceable {
            byte1 |= 1 << 5;
        }

        [byte0, byte1]
    }

    fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            two_step: bytes[0] & (1 << 1) != 0,
            leap61: bytes[1] & (1 << 0) != 0,
            leap59: bytes[1] & (1 << 1) != 0,
            current_utc_offset_valid: bytes[1] & (1 << 2) != 0,
            ptp_timescale: bytes[1] & (1 << 3) != 0,
            time_traceable: bytes[1] & (1 << 4) != 0,
            frequency_traceable: bytes[1] & (1 << 5) != 0,
        }
    }
}

/// The 34-octet PTP common header (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub transport_specific: u8,
    pub message_type: MessageType,
    pub version_ptp: u8,
    pub message_length: u16,
    pub domain_number: u8,
    pub flags: FlagField,
    /// Scaled nanoseconds (actual value × 2^16).
    pub correction_field: i64,
    pub source_port_identity: PortIdentity,
    pub sequence_id: u16,
    pub control_field: u8,
    pub log_message_interval: i8,
}

impl Header {
    pub fn new(message_type: MessageType, message_length: u16, domain_number: u8) -> Self {
        Self {
            transport_specific: 0,
            message_type,
            version_ptp: 2,
            message_length,
            domain_number,
            flags: FlagField::default(),
            correction_field: 0,
            source_port_identity: PortIdentity::default(),
            sequence_id: 0,
            control_field: message_type.control_field(),
            log_message_interval: 0,
        }
    }
}

impl WireFormat for Header {
    fn wire_size(&self) -> usize {
        HEADER_LEN
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < HEADER_LEN {
            return Err(WireFormatError::BadLength);
        }

        buffer[0] = (self.transport_specific << 4) | (self.message_type.to_primitive() & 0x0F);
        buffer[1] = self.version_ptp & 0x0F;
        buffer[2..4].copy_from_slice(&self.message_length.to_be_bytes());
        buffer[4] = self.domain_number;
        buffer[5] = 0;
        buffer[6..8].copy_from_slice(&self.flags.to_bytes());
        buffer[8..16].copy_from_slice(&self.correction_field.to_be_bytes());
        buffer[16..20].copy_from_slice(&[0u8; 4]);
        self.source_port_identity.serialize(&mut buffer[20..30])?;
        buffer[30..32].copy_from_slice(&self.sequence_id.to_be_bytes());
        buffer[32] = self.control_field;
        buffer[33] = self.log_message_interval as u8;
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < HEADER_LEN {
            return Err(WireFormatError::BadLength);
        }

        let version_ptp = buffer[1] & 0x0F;
        if version_ptp != 2 {
            return Err(WireFormatError::BadVersion);
        }

        let message_type = MessageType::try_from(buffer[0] & 0x0F)
            .map_err(|_| WireFormatError::EnumConversionError)?;

        Ok(Self {
            transport_specific: buffer[0] >> 4,
            message_type,
            version_ptp,
            message_length: u16::from_be_bytes([buffer[2], buffer[3]]),
            domain_number: buffer[4],
            flags: FlagField::from_bytes([buffer[6], buffer[7]]),
            correction_field: i64::from_be_bytes(buffer[8..16].try_into().unwrap()),
            source_port_identity: PortIdentity::deserialize(&buffer[20..30])?,
            sequence_id: u16::from_be_bytes([buffer[30], buffer[31]]),
            control_field: buffer[32],
            log_message_interval: buffer[33] as i8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    fn sample_header() -> Header {
        Header {
            transport_specific: 0,
            message_type: MessageType::Announce,
            version_ptp: 2,
            message_length: 64,
            domain_number: 0,
            flags: FlagField {
                two_step: true,
                ..Default::default()
            },
            correction_field: 0,
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
                port_number: 1,
            },
            sequence_id: 42,
            control_field: 0x05,
            log_message_interval: 1,
        }
    }

    #[test]
    fn roundtrip() {
        let header = sample_header();
        let mut buf = [0u8; HEADER_LEN];
        header.serialize(&mut buf).unwrap();
        let parsed = Header::deserialize(&buf).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn rejects_wrong_version() {
        let header = sample_header();
        let mut buf = [0u8; HEADER_LEN];
        header.serialize(&mut buf).unwrap();
        buf[1] = 1; // versionPTP = 1
        assert_eq!(Header::deserialize(&buf), Err(WireFormatError::BadVersion));
    }

    #[test]
    fn rejects_short_buffer() {
        let buf = [0u8; HEADER_LEN - 1];
        assert_eq!(Header::deserialize(&buf), Err(WireFormatError::BadLength));
    }
}
