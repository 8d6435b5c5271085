//! The clock servo: one-way-delay/offset filters, PI controller, and the
//! step-vs-slew policy (`spec.md` §4.6).

mod filter;
mod pi;

pub use filter::{OffsetFilter, OneWayDelayFilter};
pub use pi::{PiController, ADJ_FREQ_MAX};

use crate::time::TimeInternal;

/// One second, the hard-coded step threshold of `spec.md` §4.6.
const STEP_THRESHOLD_NANOS: i64 = 1_000_000_000;

/// Configuration consumed by the servo (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoConfig {
    pub ap: i16,
    pub ai: i16,
    pub s: i16,
    pub no_adjust: bool,
    pub no_reset_clock: bool,
    pub max_reset_nanos: i64,
    pub max_delay_nanos: i64,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            ap: 10,
            ai: 1000,
            s: 6,
            no_adjust: false,
            no_reset_clock: false,
            max_reset_nanos: 2_000_000_000,
            max_delay_nanos: 1_000_000_000,
        }
    }
}

/// A fully-resolved two-way exchange (`spec.md` §4.5's E2E timestamps).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct E2eSample {
    pub t1: TimeInternal,
    pub t2: TimeInternal,
    pub t3: TimeInternal,
    pub t4: TimeInternal,
    /// Sum of the Sync and Delay_Resp `correctionField`s, already decoded
    /// from scaled nanoseconds.
    pub correction: TimeInternal,
}

/// The two quantities the offset computation in `spec.md` §4.6 produces,
/// before filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawOffsetSample {
    pub offset_from_master: TimeInternal,
    pub mean_path_delay: TimeInternal,
}

/// Compute the raw (pre-filter) offset and mean path delay from a matched
/// t1..t4 quadruple (`spec.md` §4.6, testable property 4).
pub fn compute_e2e_offset(sample: E2eSample) -> RawOffsetSample {
    let master_to_slave = sample.t2 - sample.t1 - sample.correction;
    let slave_to_master = sample.t4 - sample.t3;

    RawOffsetSample {
        offset_from_master: (master_to_slave - slave_to_master).half(),
        mean_path_delay: (master_to_slave + slave_to_master).half(),
    }
}

/// Compute peer (P2P) mean path delay from a PDelay exchange (`spec.md`
/// §4.5, scenario S6): `((t4-t1) - (t3-t2)) / 2`.
pub fn compute_peer_mean_path_delay(
    t1: TimeInternal,
    t2: TimeInternal,
    t3: TimeInternal,
    t4: TimeInternal,
) -> TimeInternal {
    ((t4 - t1) - (t3 - t2)).half()
}

/// Compute offset-from-master for a port using the P2P delay mechanism.
///
/// Unlike E2E, a P2P port never exchanges Delay_Req/Delay_Resp with the
/// master: `peerMeanPathDelay` is already known from the independent
/// PDelay exchange with the adjacent link partner, so a single Sync/Follow_Up
/// pair is enough: `offsetFromMaster = t2 - t1 - correction - peerMeanPathDelay`.
pub fn compute_p2p_offset(
    t1: TimeInternal,
    t2: TimeInternal,
    correction: TimeInternal,
    peer_mean_path_delay: TimeInternal,
) -> TimeInternal {
    t2 - t1 - correction - peer_mean_path_delay
}

/// What the servo decided to do with a sample, handed to the orchestrator so
/// it can drive the `Clock` collaborator (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoAction {
    /// Slew: steer frequency by this many ppb.
    Slew { frequency_adjustment_ppb: i32 },
    /// Step: set the clock directly by this offset; caller must also reset
    /// port state to UNCALIBRATED and restart qualification.
    Step { offset: TimeInternal },
    /// The sample was a transient outlier (`|offset| > maxReset` and
    /// stepping wasn't applicable); discarded without touching the clock.
    Discard,
    /// `noAdjust` is set: the offset was computed but no adjustment applied.
    NoOp,
}

/// The servo's filter and controller state, owned by the port
/// (`spec.md` §3: `PtpClock`'s `one_way_delay_filter`,
/// `offset_from_master_filter`, `observed_drift`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Servo {
    one_way_delay_filter: OneWayDelayFilter,
    offset_filter: OffsetFilter,
    pi: PiController,
}

impl Servo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn one_way_delay(&self) -> i32 {
        self.one_way_delay_filter.output()
    }

    pub fn filtered_offset(&self) -> i32 {
        self.offset_filter.output()
    }

    pub fn observed_drift(&self) -> i32 {
        self.pi.observed_drift()
    }

    /// Cancellation: a state change out of SLAVE stops all servo activity
    /// and clears filter state (`spec.md` §4.6).
    pub fn reset(&mut self) {
        self.one_way_delay_filter.reset();
        self.offset_filter.reset();
        self.pi.reset();
    }

    /// Feed a peer-delay sample into the one-way-delay filter only (P2P mode
    /// has no offset-from-master of its own; that still comes from Sync).
    pub fn feed_peer_delay(&mut self, peer_mean_path_delay: TimeInternal, config: &ServoConfig) -> i32 {
        self.one_way_delay_filter
            .feed(peer_mean_path_delay.total_nanos() as i32, config.s)
    }

    /// Feed a raw E2E sample through both filters and the PI controller,
    /// returning the action the orchestrator should take and the filtered
    /// mean path delay to store in the current data set.
    pub fn handle_e2e_sample(
        &mut self,
        raw: RawOffsetSample,
        config: &ServoConfig,
        max_adjustment: i32,
    ) -> (ServoAction, i32) {
        let (action, _) = self.apply_offset(raw.offset_from_master, config, max_adjustment);
        let filtered_delay = match action {
            ServoAction::Slew { .. } => self
                .one_way_delay_filter
                .feed(raw.mean_path_delay.total_nanos() as i32, config.s),
            _ => self.one_way_delay_filter.output(),
        };
        (action, filtered_delay)
    }

    /// Feed a P2P offset-from-master sample (`spec.md` §4.5): the mean path
    /// delay it needs is already known from the independent PDelay exchange,
    /// so only the offset/PI half of [`Self::handle_e2e_sample`] applies.
    pub fn handle_p2p_offset(
        &mut self,
        offset_from_master: TimeInternal,
        config: &ServoConfig,
        max_adjustment: i32,
    ) -> ServoAction {
        self.apply_offset(offset_from_master, config, max_adjustment).0
    }

    /// Shared step-vs-slew policy and PI update (`spec.md` §4.6), common to
    /// both delay mechanisms once an offset-from-master sample is in hand.
    fn apply_offset(
        &mut self,
        offset_from_master: TimeInternal,
        config: &ServoConfig,
        max_adjustment: i32,
    ) -> (ServoAction, i32) {
        let offset_nanos = offset_from_master.total_nanos();

        if config.no_adjust {
            return (ServoAction::NoOp, 0);
        }

        if offset_nanos.abs() > STEP_THRESHOLD_NANOS && !config.no_reset_clock {
            self.reset();
            return (
                ServoAction::Step {
                    offset: offset_from_master,
                },
                0,
            );
        }

        if offset_nanos.abs() > config.max_reset_nanos {
            return (ServoAction::Discard, 0);
        }

        let filtered_offset = self.offset_filter.feed(offset_nanos as i32);
        let adjustment = self
            .pi
            .update(filtered_offset, config.ap, config.ai, max_adjustment);

        (
            ServoAction::Slew {
                frequency_adjustment_ppb: adjustment,
            },
            filtered_offset,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(seconds: i32, nanos: i32) -> TimeInternal {
        TimeInternal::new(seconds, nanos)
    }

    /// Scenario S1 from `spec.md` §8: offsetFromMaster = 100 ns, meanPathDelay
    /// = 400 ns from the literal timestamps given.
    #[test]
    fn s1_offset_and_mean_path_delay() {
        let sample = E2eSample {
            t1: t(1, 0),
            t2: t(1, 500),
            t3: t(1, 700),
            t4: t(1, 1000),
            correction: TimeInternal::ZERO,
        };
        let raw = compute_e2e_offset(sample);
        assert_eq!(raw.offset_from_master, t(0, 100));
        assert_eq!(raw.mean_path_delay, t(0, 400));
    }

    /// Scenario S6: peer delay = 1000 ns.
    #[test]
    fn s6_peer_mean_path_delay() {
        let t1 = t(0, 0);
        let t2 = t(0, 1_000);
        let t3 = t(0, 2_000);
        let t4 = t(0, 3_000);
        assert_eq!(compute_peer_mean_path_delay(t1, t2, t3, t4), t(0, 1_000));
    }

    #[test]
    fn testable_property_offset_matches_formula_before_filtering() {
        let sample = E2eSample {
            t1: t(0, 0),
            t2: t(0, 50),
            t3: t(0, 60),
            t4: t(0, 130),
            correction: TimeInternal::ZERO,
        };
        let raw = compute_e2e_offset(sample);
        // (t2-t1 - (t4-t3)) / 2 = (50 - 70) / 2 = -10
        assert_eq!(raw.offset_from_master, t(0, -10));
    }

    /// Scenario S3: a 5 s offset with noResetClock=false always steps,
    /// regardless of maxReset.
    #[test]
    fn s3_large_offset_steps_and_resets_filters() {
        let mut servo = Servo::new();
        servo.offset_filter.feed(123); // dirty the filter state first
        let config = ServoConfig {
            max_reset_nanos: 2_000_000_000,
            ..ServoConfig::default()
        };
        let raw = RawOffsetSample {
            offset_from_master: t(5, 0),
            mean_path_delay: t(0, 500),
        };
        let (action, _) = servo.handle_e2e_sample(raw, &config, ADJ_FREQ_MAX);
        assert_eq!(
            action,
            ServoAction::Step {
                offset: t(5, 0)
            }
        );
        assert_eq!(servo.filtered_offset(), 0);
    }

    #[test]
    fn offset_beyond_max_reset_is_discarded_when_stepping_is_disabled() {
        let mut servo = Servo::new();
        let config = ServoConfig {
            no_reset_clock: true,
            max_reset_nanos: 10_000,
            ..ServoConfig::default()
        };
        let raw = RawOffsetSample {
            offset_from_master: t(0, 50_000),
            mean_path_delay: t(0, 500),
        };
        let (action, _) = servo.handle_e2e_sample(raw, &config, ADJ_FREQ_MAX);
        assert_eq!(action, ServoAction::Discard);
    }

    #[test]
    fn no_adjust_computes_without_applying() {
        let mut servo = Servo::new();
        let config = ServoConfig {
            no_adjust: true,
            ..ServoConfig::default()
        };
        let raw = RawOffsetSample {
            offset_from_master: t(0, 100),
            mean_path_delay: t(0, 400),
        };
        let (action, _) = servo.handle_e2e_sample(raw, &config, ADJ_FREQ_MAX);
        assert_eq!(action, ServoAction::NoOp);
        assert_eq!(servo.filtered_offset(), 0);
    }
}
