//! Time representations used throughout the core.
//!
//! [`TimeInternal`] is the in-memory representation of a PTP timestamp or
//! time difference: signed seconds and signed nanoseconds, always kept
//! normalized. It intentionally mirrors the representation used by the
//! `ptpd` reference implementation this crate's algorithms were distilled
//! from, rather than a fixed-point nanosecond scalar, because the sign and
//! magnitude of seconds/nanoseconds are observed independently at several
//! points in the servo.

mod internal;
mod interval;

pub use internal::TimeInternal;
pub use interval::Interval;
