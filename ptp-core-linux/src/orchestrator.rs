//! The concrete event loop: ties `PtpInstance` to a [`Transport`] and
//! [`Clock`], translating `spec.md` §5's two suspension points (wait for
//! readable transport, wait for nearest timer) into blocking calls driven
//! from a dedicated OS thread, with `tokio::signal` delivering shutdown from
//! the async side (`spec.md` §9: no self-pipe needed once signals are a
//! future alongside socket readiness).

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use ptp_core::{
    clock::Clock,
    network::Transport,
    observability::Snapshot,
    port::{PortAction, TimestampContext, MAX_MESSAGE_LEN},
    Event, PtpInstance,
};

use crate::observer::SharedSnapshot;

/// Ceiling on how long a single `poll_readable` call blocks, so the loop
/// still re-checks the shutdown flag promptly when no timer is running.
/// When a timer is running, the actual wait is bounded by its expiry
/// instead (`spec.md` §5: "a short timeout bounded by the nearest timer
/// expiry").
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Orchestrator<T, C> {
    instance: PtpInstance,
    transport: T,
    clock: C,
    snapshot: SharedSnapshot,
}

impl<T, C> Orchestrator<T, C>
where
    T: Transport,
    C: Clock,
{
    pub fn new(mut instance: PtpInstance, transport: T, clock: C, snapshot: SharedSnapshot) -> Self {
        instance.set_max_adjustment(clock.max_adjustment());
        Self {
            instance,
            transport,
            clock,
            snapshot,
        }
    }

    /// Run until `shutdown` is set. Blocking: intended to be driven from
    /// `tokio::task::spawn_blocking`.
    pub fn run(mut self, shutdown: Arc<AtomicBool>) {
        self.instance.handle_transport_ready();
        let mut last_tick = Instant::now();

        while !shutdown.load(Ordering::Relaxed) {
            let timeout = self
                .instance
                .next_timer_expiry()
                .map(|seconds| Duration::from_secs_f64(seconds.max(0.0)))
                .unwrap_or(MAX_POLL_INTERVAL)
                .min(MAX_POLL_INTERVAL);

            match self.transport.poll_readable(timeout) {
                Ok(true) => self.recv_one(),
                Ok(false) => {}
                Err(e) => {
                    log::warn!("transport fault: {e:?}");
                    let event = self.instance.handle_transport_fault();
                    self.log_event(event);
                }
            }

            let elapsed = last_tick.elapsed().as_secs_f64();
            last_tick = Instant::now();
            let outcome = self.instance.tick(elapsed, self.clock.get_time());
            self.dispatch_actions(outcome.actions);
            if let Some(update) = outcome.servo_update {
                self.apply_servo_update(update.action);
            }
            if let Some(event) = outcome.event {
                self.log_event(event);
            }

            self.publish_snapshot();
        }

        log::info!("shutting down");
    }

    /// Read and dispatch at most one pending message per call, so a backlog
    /// (e.g. a burst of Announces at startup) can't starve timer servicing
    /// (`spec.md` §5: "read and dispatch at most one pending message per
    /// iteration, to bound handler latency").
    fn recv_one(&mut self) {
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let (len, timestamp) = match self.transport.recv(&mut buf) {
            Ok(received) => received,
            Err(e) => {
                log::warn!("transport fault: {e:?}");
                let event = self.instance.handle_transport_fault();
                self.log_event(event);
                return;
            }
        };
        if len == 0 {
            return;
        }

        let outcome = self.instance.handle_message(&buf[..len], timestamp);
        self.dispatch_actions(outcome.actions);
        if let Some(update) = outcome.servo_update {
            self.apply_servo_update(update.action);
        }
        if let Some(event) = outcome.event {
            self.log_event(event);
        }
    }

    fn dispatch_actions(&mut self, actions: ptp_core::port::PortActions) {
        for action in actions {
            match action {
                PortAction::SendEvent {
                    message,
                    link_local,
                    context,
                } => match self.transport.send_event(&message, link_local) {
                    Ok(tx_timestamp) => self.route_tx_timestamp(context, tx_timestamp),
                    Err(e) => log::warn!("failed to send event message: {e:?}"),
                },
                PortAction::SendGeneral { message, link_local } => {
                    if let Err(e) = self.transport.send_general(&message, link_local) {
                        log::warn!("failed to send general message: {e:?}");
                    }
                }
                // Timer scheduling is handled internally by `Port`'s own
                // `TimerSet`, driven by wall-clock deltas each loop
                // iteration; there is no OS timer to arm here.
                PortAction::ResetTimer { .. } | PortAction::StopTimer { .. } => {}
            }
        }
    }

    fn route_tx_timestamp(&mut self, context: TimestampContext, tx_timestamp: ptp_core::time::TimeInternal) {
        let actions = self.instance.handle_send_timestamp(context, tx_timestamp);
        self.dispatch_actions(actions);
    }

    fn apply_servo_update(&mut self, action: ptp_core::servo::ServoAction) {
        match action {
            ptp_core::servo::ServoAction::Slew { frequency_adjustment_ppb } => {
                if let Err(e) = self.clock.adjust_frequency(frequency_adjustment_ppb) {
                    log::warn!("clock frequency adjustment failed: {e:?}");
                }
            }
            ptp_core::servo::ServoAction::Step { offset } => {
                let target = self.clock.get_time() + offset;
                if let Err(e) = self.clock.set_time(target) {
                    log::warn!("clock step failed: {e:?}");
                }
            }
            ptp_core::servo::ServoAction::Discard => log::debug!("offset sample discarded as an outlier"),
            ptp_core::servo::ServoAction::NoOp => {}
        }
    }

    fn log_event(&self, event: Event) {
        log::info!("{event}");
    }

    fn publish_snapshot(&self) {
        let snapshot = Snapshot::capture(&self.instance);
        *self.snapshot.lock().unwrap() = snapshot;
    }
}
