//! PTP wire format: the common header plus the ten message bodies (§4.1).

pub mod common;
pub mod datasets;
pub mod messages;

/// Errors that can occur while decoding a PTP message from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum WireFormatError {
    /// The buffer was shorter than the minimum length for this message.
    #[cfg_attr(feature = "std", error("buffer too short for this message"))]
    BadLength,
    /// `versionPTP` was not 2.
    #[cfg_attr(feature = "std", error("unsupported PTP version"))]
    BadVersion,
    /// An enum-valued field held a value with no known meaning.
    #[cfg_attr(feature = "std", error("unrecognized enum value on the wire"))]
    EnumConversionError,
}

/// Common pack/unpack behaviour shared by the header and every message body.
pub(crate) trait WireFormat: Sized {
    /// Size in octets this value occupies on the wire.
    fn wire_size(&self) -> usize;

    /// Serialize into `buffer`, which must be at least `wire_size()` long.
    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError>;

    /// Deserialize from the front of `buffer`.
    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError>;
}
