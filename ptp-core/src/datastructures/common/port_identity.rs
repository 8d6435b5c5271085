use core::fmt::{Debug, Display, Formatter};

use super::{
    super::{WireFormat, WireFormatError},
    ClockIdentity,
};

/// The pair (clockIdentity, portNumber) identifying a single PTP port.
///
/// Ordering is lexicographic over the concatenation of the two fields, which
/// is what the BMC dataset comparison algorithm relies on for its topology
/// tie-breaks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PortIdentity {
    pub clock_identity: ClockIdentity,
    pub port_number: u16,
}

impl Debug for PortIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for PortIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-{}", self.clock_identity, self.port_number)
    }
}

impl WireFormat for PortIdentity {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BadLength);
        }
        self.clock_identity.serialize(&mut buffer[0..8])?;
        buffer[8..10].copy_from_slice(&self.port_number.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BadLength);
        }
        Ok(Self {
            clock_identity: ClockIdentity::deserialize(&buffer[0..8])?,
            port_number: u16::from_be_bytes([buffer[8], buffer[9]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic_over_concatenation() {
        let a = PortIdentity {
            clock_identity: ClockIdentity([0; 8]),
            port_number: 5,
        };
        let b = PortIdentity {
            clock_identity: ClockIdentity([0; 8]),
            port_number: 6,
        };
        assert!(a < b);

        let c = PortIdentity {
            clock_identity: ClockIdentity([1; 8]),
            port_number: 0,
        };
        assert!(b < c);
    }
}
