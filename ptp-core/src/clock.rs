//! The OS clock collaborator interface (§6 of the specification).
//!
//! The core never touches the system clock directly: it only calls through
//! this trait, which a consumer (e.g. `ptp-core-linux`) implements against
//! `clock_gettime`/`adjtimex`/a hardware PHC device.

use crate::time::TimeInternal;

/// Clock manipulation and querying interface.
///
/// An implementation of this trait is responsible for:
/// - reporting the current time,
/// - stepping the clock by an arbitrary offset,
/// - steering the clock's frequency by a ppb amount, clamped to whatever
///   range the underlying hardware/kernel API supports (the conversion from
///   ppb to the kernel's native scale, e.g. 65536 × ppm for Linux adjtimex,
///   is the collaborator's responsibility, not the servo's — see
///   `spec.md` §9).
pub trait Clock {
    type Error: core::fmt::Debug;

    /// Current time. The semantics (wall vs. monotonic) are up to the
    /// collaborator but must be consistent within one running instance.
    fn get_time(&self) -> TimeInternal;

    /// Step the clock so that its current time becomes `get_time() + offset`.
    fn set_time(&mut self, new_time: TimeInternal) -> Result<(), Self::Error>;

    /// Steer the clock frequency by `ppb` parts-per-billion relative to its
    /// nominal rate.
    fn adjust_frequency(&mut self, ppb: i32) -> Result<(), Self::Error>;

    /// The largest frequency adjustment magnitude (in ppb) this clock can
    /// accept.
    fn max_adjustment(&self) -> i32;
}
