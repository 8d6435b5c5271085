//! The fixed set of named interval timers driving message emission and
//! receipt-timeout recovery (`spec.md` §4.2).

/// Index into [`TimerSet`]. One timer per named purpose; no dynamic
/// allocation, matching the teacher's fixed-size timer array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum TimerId {
    PdelayReq = 0,
    DelayReq = 1,
    Sync = 2,
    AnnounceReceipt = 3,
    AnnounceInterval = 4,
    /// Bounds how long a port waits in UNCALIBRATED/SLAVE for the next Sync
    /// before giving up on the current parent (`spec.md` §2's "sync receipt
    /// timeout", restarted on every accepted Sync).
    SyncReceipt = 5,
    /// Bounds how long a port dwells in PRE_MASTER before the state machine
    /// promotes it to MASTER (`spec.md` §2's "qualification timeout",
    /// `spec.md` §4.5's `PRE_MASTER (-> MASTER)` transition).
    Qualification = 6,
}

const TIMER_COUNT: usize = 7;

/// A single countdown timer: an interval, the time remaining until it
/// expires, and a latched expiry flag read-and-cleared by [`Timer::expired`].
#[derive(Debug, Clone, Copy, PartialEq)]
struct Timer {
    interval: f64,
    remaining: f64,
    running: bool,
    expired: bool,
}

impl Timer {
    const STOPPED: Self = Self {
        interval: 0.0,
        remaining: 0.0,
        running: false,
        expired: false,
    };

    fn start(&mut self, interval: f64) {
        self.interval = interval;
        self.remaining = interval;
        self.running = true;
        self.expired = false;
    }

    fn stop(&mut self) {
        *self = Self::STOPPED;
    }

    fn tick(&mut self, elapsed: f64) {
        if !self.running {
            return;
        }
        self.remaining -= elapsed;
        if self.remaining <= 0.0 {
            self.expired = true;
            // Periodic timers (everything but AnnounceReceipt/Sync receipt
            // timeouts, which the port restarts explicitly on each qualifying
            // receipt) keep ticking at their configured interval so repeated
            // `tick` calls without an intervening `expired()` don't lose time.
            self.remaining += self.interval;
            if self.remaining <= 0.0 {
                self.remaining = self.interval;
            }
        }
    }

    /// Read-and-clear the expiry flag.
    fn expired(&mut self) -> bool {
        core::mem::take(&mut self.expired)
    }
}

/// The fixed array of named timers owned by a [`crate::port::Port`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerSet {
    timers: [Timer; TIMER_COUNT],
}

impl Default for TimerSet {
    fn default() -> Self {
        Self {
            timers: [Timer::STOPPED; TIMER_COUNT],
        }
    }
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, id: TimerId, interval_seconds: f64) {
        self.timers[id as usize].start(interval_seconds);
    }

    pub fn stop(&mut self, id: TimerId) {
        self.timers[id as usize].stop();
    }

    pub fn stop_all(&mut self) {
        for timer in &mut self.timers {
            timer.stop();
        }
    }

    /// Read-and-clear whether `id` has expired since the last check.
    pub fn expired(&mut self, id: TimerId) -> bool {
        self.timers[id as usize].expired()
    }

    /// Advance every running timer by `elapsed` seconds of monotonic time.
    pub fn tick(&mut self, elapsed: f64) {
        for timer in &mut self.timers {
            timer.tick(elapsed);
        }
    }

    /// Seconds until the next timer expiry, for bounding the orchestrator's
    /// readiness wait. `None` if no timer is running.
    pub fn next_expiry(&self) -> Option<f64> {
        self.timers
            .iter()
            .filter(|t| t.running)
            .map(|t| t.remaining.max(0.0))
            .fold(None, |acc, r| Some(acc.map_or(r, |a: f64| a.min(r))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_and_clears() {
        let mut timers = TimerSet::new();
        timers.start(TimerId::Sync, 1.0);
        assert!(!timers.expired(TimerId::Sync));
        timers.tick(1.5);
        assert!(timers.expired(TimerId::Sync));
        // read-and-clear: second read is false until it expires again
        assert!(!timers.expired(TimerId::Sync));
    }

    #[test]
    fn stopped_timer_never_expires() {
        let mut timers = TimerSet::new();
        timers.tick(100.0);
        assert!(!timers.expired(TimerId::AnnounceReceipt));
        assert_eq!(timers.next_expiry(), None);
    }

    #[test]
    fn next_expiry_tracks_soonest_running_timer() {
        let mut timers = TimerSet::new();
        timers.start(TimerId::Sync, 2.0);
        timers.start(TimerId::AnnounceInterval, 0.5);
        assert_eq!(timers.next_expiry(), Some(0.5));
    }
}
