//! The configuration surface the core recognises (`spec.md` §6).
//!
//! These are plain Rust structs: the core takes configuration, it does not
//! parse it. `ptp-core-linux` owns the TOML/CLI surface that produces them,
//! the way `statime-linux::config` produces `statime::config::InstanceConfig`
//! / `PortConfig`.

mod instance;
mod port;

pub use instance::InstanceConfig;
pub use port::PortConfig;

pub use crate::{
    datastructures::{
        common::{ClockIdentity, ClockQuality, TimeSource},
        datasets::DelayMechanism,
    },
    servo::ServoConfig,
};
