//! The error/disposition table of `spec.md` §7.

/// Every fallible outcome a port's dispatch logic can produce. None of these
/// unwind or abort the process; each is handled locally by the disposition
/// named in its doc comment, and only [`PortError::TransportFault`] and
/// [`PortError::ClockAdjustFault`] ever produce an observable
/// [`crate::Event`] (`spec.md` §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum PortError {
    /// `unpack` failed a length/version check. Disposition: discard,
    /// counter++.
    #[cfg_attr(feature = "std", error("malformed message"))]
    MalformedMessage,
    /// `header.domainNumber` did not match the configured domain.
    /// Disposition: discard silently.
    #[cfg_attr(feature = "std", error("message on wrong PTP domain"))]
    WrongDomain,
    /// `sourcePortIdentity` equals our own. Disposition: discard.
    #[cfg_attr(feature = "std", error("message originated from this port"))]
    SelfMessage,
    /// A Follow_Up/Delay_Resp/PDelay response's sequenceId (or requesting
    /// port identity) did not match the outstanding request. Disposition:
    /// discard, clear the pending measurement.
    #[cfg_attr(feature = "std", error("sequence id or port identity mismatch"))]
    SequenceMismatch,
    /// A timestamp was older than the last one accepted by at least a
    /// second. Disposition: discard.
    #[cfg_attr(feature = "std", error("stale timestamp"))]
    StaleTimestamp,
    /// `|offset| > maxReset` and stepping was not permitted. Disposition:
    /// discard.
    #[cfg_attr(feature = "std", error("offset exceeds configured maximum"))]
    OffsetTooLarge,
    /// The transport collaborator's send/recv returned a fatal error.
    /// Disposition: enter FAULTY, await external recovery.
    #[cfg_attr(feature = "std", error("transport fault"))]
    TransportFault,
    /// The clock collaborator's frequency/set-time primitive failed.
    /// Disposition: log, remain in the current state.
    #[cfg_attr(feature = "std", error("clock adjustment fault"))]
    ClockAdjustFault,
}
