//! Types shared across multiple PTP message bodies and data sets.

mod clock_identity;
mod clock_quality;
mod port_identity;
mod time_source;
mod wire_timestamp;

pub use clock_identity::ClockIdentity;
pub use clock_quality::ClockQuality;
pub use port_identity::PortIdentity;
pub use time_source::TimeSource;
pub use wire_timestamp::WireTimestamp;
