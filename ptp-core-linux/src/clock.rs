//! The system/PHC clock collaborator, grounded in `clock_steering::unix::UnixClock`
//! the way `statime-linux::clock::LinuxClock` wraps `RawLinuxClock`.

use clock_steering::{unix::UnixClock, Clock as SteeringClock, Duration as SteeringDuration, Timestamp};
use ptp_core::{clock::Clock, time::TimeInternal};

/// The largest frequency adjustment `adjtimex` accepts, expressed in ppb;
/// the servo never needs to know this conversion happens (`spec.md` §9).
const MAX_ADJUSTMENT_PPB: i32 = 500_000;

#[derive(Debug)]
pub struct LinuxClockError(pub clock_steering::unix::Error);

impl core::fmt::Display for LinuxClockError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "linux clock error: {:?}", self.0)
    }
}

impl std::error::Error for LinuxClockError {}

pub struct LinuxClock {
    clock: UnixClock,
}

impl LinuxClock {
    pub fn realtime() -> Self {
        Self {
            clock: UnixClock::CLOCK_REALTIME,
        }
    }

    pub fn open_phc(path: &std::path::Path) -> std::io::Result<Self> {
        Ok(Self {
            clock: UnixClock::open(path)?,
        })
    }
}

fn to_time_internal(ts: Timestamp) -> TimeInternal {
    TimeInternal::new(ts.seconds as i32, ts.nanos as i32)
}

fn to_offset_duration(offset: TimeInternal) -> SteeringDuration {
    SteeringDuration::from_nanos(offset.total_nanos())
}

impl Clock for LinuxClock {
    type Error = LinuxClockError;

    fn get_time(&self) -> TimeInternal {
        // The collaborator interface has no fallible `now`; a clock read
        // failing is treated the same as the kernel clock being correct but
        // momentarily unreadable, which in practice never happens for
        // CLOCK_REALTIME/a bound PHC.
        self.clock
            .now()
            .map(to_time_internal)
            .unwrap_or(TimeInternal::ZERO)
    }

    fn set_time(&mut self, new_time: TimeInternal) -> Result<(), Self::Error> {
        let current = self.get_time();
        self.clock
            .step_clock(to_offset_duration(new_time - current))
            .map_err(LinuxClockError)
    }

    fn adjust_frequency(&mut self, ppb: i32) -> Result<(), Self::Error> {
        let ppm = ppb as f64 / 1000.0;
        self.clock.set_frequency(ppm).map_err(LinuxClockError)?;
        Ok(())
    }

    fn max_adjustment(&self) -> i32 {
        MAX_ADJUSTMENT_PPB
    }
}
