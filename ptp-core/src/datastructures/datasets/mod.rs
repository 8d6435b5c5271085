//! The data sets defined by the standard (`spec.md` §3): default, current,
//! parent, time-properties, and port configuration.

mod current;
mod default;
mod parent;
mod port;
mod time_properties;

pub use current::CurrentDS;
pub use default::DefaultDS;
pub use parent::ParentDS;
pub use port::{DelayMechanism, PortDS};
pub use time_properties::TimePropertiesDS;
