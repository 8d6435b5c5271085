//! [`PtpInstance`]: the core-side orchestration glue (`spec.md` §2's "Glue").
//!
//! Ties a single [`Port`] to the clock-wide data sets (default, parent,
//! current, time-properties) that BMC's M1/S1 actions mutate, and hosts the
//! `(MessageType, PortState)` dispatch table the port's handlers are keyed
//! by (`spec.md` §9). `PtpInstance` itself never touches a socket or the OS
//! clock: it turns decoded messages and timer ticks into [`PortAction`]s and
//! [`ServoUpdate`]s for the orchestrator (`ptp-core-linux`) to carry out,
//! mirroring `statime::ptp_instance::PtpInstance`'s split between the
//! protocol-level instance and its `network`/`clock` collaborators.

use crate::{
    bmc::{apply_m1, apply_s1, BmcAction},
    config::{InstanceConfig, PortConfig},
    datastructures::{
        common::PortIdentity,
        datasets::{CurrentDS, DefaultDS, ParentDS, PortDS, TimePropertiesDS},
        messages::{decode, MessageBody, MessageType},
        WireFormatError,
    },
    port::{Port, PortAction, PortActions, PortError, PortState, ServoUpdate, TimestampContext},
    time::TimeInternal,
    Event,
};

/// Everything a single call to [`PtpInstance::handle_message`] produced: zero
/// or more outbound actions, an observable servo update (if a fresh offset
/// sample completed), and a state-change event (if BMC or a timeout changed
/// the port's state). Matches the "handler per `(MessageType, PortState)`,
/// discard unknown combinations silently" redesign of `spec.md` §9: no
/// variant here is an error, an empty/default `DispatchOutcome` *is* the
/// silent-discard path.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub actions: PortActions,
    pub servo_update: Option<ServoUpdate>,
    pub event: Option<Event>,
}

/// A single ordinary PTP clock: one port, plus the clock-wide data sets BMC
/// reads and writes (`spec.md` §3). Boundary-clock support (`N` ports
/// sharing one set of clock-wide data sets) is out of this crate's scope
/// (`spec.md` §1); `number_ports` in [`DefaultDS`] is always 1 here.
#[derive(Debug)]
pub struct PtpInstance {
    default_ds: DefaultDS,
    current_ds: CurrentDS,
    parent_ds: ParentDS,
    time_properties_ds: TimePropertiesDS,
    port: Port,
}

impl PtpInstance {
    /// Build a new ordinary-clock instance, parenting itself until BMC says
    /// otherwise (`spec.md` §3: a freshly constructed clock is its own
    /// parent and grandmaster).
    ///
    /// `receipt_timeout_r` must be sampled once per startup from a uniform
    /// `[0,1)` distribution by the caller (`spec.md` §4.2); see
    /// [`Port::new`] for why this crate doesn't sample it itself.
    pub fn new(instance_config: InstanceConfig, port_config: PortConfig, receipt_timeout_r: f64) -> Self {
        let default_ds = DefaultDS::new_ordinary_clock(
            instance_config.clock_identity,
            instance_config.clock_quality,
            instance_config.priority_1,
            instance_config.priority_2,
            instance_config.domain_number,
            instance_config.slave_only,
        );
        let parent_ds = ParentDS::new_self_parent(&default_ds);
        let own_port_identity = PortIdentity {
            clock_identity: instance_config.clock_identity,
            port_number: 1,
        };
        let port = Port::new(own_port_identity, instance_config.domain_number, port_config, receipt_timeout_r);

        Self {
            default_ds,
            current_ds: CurrentDS::default(),
            parent_ds,
            time_properties_ds: TimePropertiesDS::new_arbitrary(),
            port,
        }
    }

    pub fn identity(&self) -> PortIdentity {
        self.port.identity()
    }

    pub fn state(&self) -> PortState {
        self.port.state()
    }

    pub fn default_ds(&self) -> &DefaultDS {
        &self.default_ds
    }

    pub fn current_ds(&self) -> &CurrentDS {
        &self.current_ds
    }

    pub fn parent_ds(&self) -> &ParentDS {
        &self.parent_ds
    }

    pub fn time_properties_ds(&self) -> &TimePropertiesDS {
        &self.time_properties_ds
    }

    pub fn port_ds(&self) -> &PortDS {
        self.port.port_ds()
    }

    pub fn port(&self) -> &Port {
        &self.port
    }

    /// Seconds until the port's nearest running timer expires, for bounding
    /// the orchestrator's transport readiness wait (`spec.md` §5). `None` if
    /// no timer is currently running.
    pub fn next_timer_expiry(&self) -> Option<f64> {
        self.port.next_timer_expiry()
    }

    /// Report the `Clock` collaborator's frequency-adjustment ceiling
    /// (`spec.md` §6); forwarded to the port's servo.
    pub fn set_max_adjustment(&mut self, max_adjustment: i32) {
        self.port.set_max_adjustment(max_adjustment);
    }

    // ---- lifecycle --------------------------------------------------------

    pub fn handle_transport_ready(&mut self) {
        self.port.handle_transport_ready();
    }

    pub fn handle_transport_fault(&mut self) -> Event {
        self.port.handle_transport_fault()
    }

    /// Advance timers by `elapsed` seconds of monotonic time, servicing any
    /// that expired: message emission first, then the two receipt-timeout
    /// checks, which both trigger BMC (`spec.md` §2, §4.5).
    pub fn tick(&mut self, elapsed: f64, now: TimeInternal) -> DispatchOutcome {
        let actions = self
            .port
            .tick(elapsed, now, &self.parent_ds, &self.time_properties_ds);

        let mut event = None;
        if self.port.poll_announce_receipt_timeout() || self.port.poll_sync_receipt_timeout() {
            event = Some(self.handle_receipt_timeout());
        }

        DispatchOutcome {
            actions,
            servo_update: None,
            event,
        }
    }

    /// `spec.md` §4.5: an announce- or sync-receipt timeout drops the port
    /// back to LISTENING, clears the parent data set to self-parent, and
    /// reruns BMC (which, with an empty foreign-master table, just confirms
    /// LISTENING — `spec.md` §4.4's "no foreign records" short-circuit).
    fn handle_receipt_timeout(&mut self) -> Event {
        let event = self.port.handle_receipt_timeout();
        self.parent_ds = ParentDS::new_self_parent(&self.default_ds);
        self.current_ds.clear();
        self.run_bmc();
        event
    }

    pub fn handle_send_timestamp(&mut self, context: TimestampContext, timestamp: TimeInternal) -> PortActions {
        self.port.handle_send_timestamp(context, timestamp)
    }

    // ---- BMC ---------------------------------------------------------------

    /// Run BMC over the currently qualified foreign-master records and apply
    /// whichever data-set action it decides (`spec.md` §4.4), returning an
    /// event if the port's state changed as a result.
    pub fn run_bmc(&mut self) -> Option<Event> {
        let parent_port_identity = self.parent_ds.parent_port_identity;
        let (action, event) = self.port.run_bmc(&self.default_ds, parent_port_identity);
        self.apply_bmc_action(action);
        event
    }

    fn apply_bmc_action(&mut self, action: BmcAction) {
        match action {
            BmcAction::M1 => {
                self.parent_ds = apply_m1(&self.default_ds);
                self.current_ds.clear();
                self.time_properties_ds = TimePropertiesDS::new_arbitrary();
            }
            BmcAction::S1(record) => {
                self.current_ds.steps_removed = self.current_ds.steps_removed.saturating_add(1);
                let (parent_ds, time_properties_ds) = apply_s1(&record);
                self.parent_ds = parent_ds;
                self.time_properties_ds = time_properties_ds;
            }
            // RemainListening touches no data set; Fault is the defensive
            // algorithmic-tie branch flagged in `spec.md` §9 and likewise
            // left alone here (see DESIGN.md's Open Questions).
            BmcAction::RemainListening | BmcAction::Fault => {}
        }
    }

    // ---- message receipt ----------------------------------------------------

    /// Decode and dispatch one datagram, keyed by `(MessageType, PortState)`
    /// as the redesign in `spec.md` §9 calls for. Malformed buffers, the
    /// wrong domain, self-originated messages, and combinations the current
    /// port state doesn't expect are all discarded silently (an empty
    /// [`DispatchOutcome`]), matching the disposition table in `spec.md` §7.
    pub fn handle_message(&mut self, buffer: &[u8], rx_timestamp: Option<TimeInternal>) -> DispatchOutcome {
        let (header, body) = match decode(buffer) {
            Ok(decoded) => decoded,
            Err(WireFormatError::BadLength | WireFormatError::BadVersion | WireFormatError::EnumConversionError) => {
                return DispatchOutcome::default();
            }
        };

        let Some(body) = body else {
            // Signaling/Management: accepted by the codec but carry no body
            // this crate interprets (`spec.md` §1's management non-goal).
            return DispatchOutcome::default();
        };

        let result = match body {
            MessageBody::Announce(announce) => self.dispatch_announce(header, announce),
            MessageBody::Sync(sync) => self.dispatch_sync(header, sync, rx_timestamp),
            MessageBody::FollowUp(follow_up) => self.dispatch_follow_up(header, follow_up),
            MessageBody::DelayReq(req) => self.dispatch_delay_req(header, req, rx_timestamp),
            MessageBody::DelayResp(resp) => self.dispatch_delay_resp(header, resp),
            MessageBody::PDelayReq(req) => self.dispatch_pdelay_req(header, req, rx_timestamp),
            MessageBody::PDelayResp(resp) => self.dispatch_pdelay_resp(header, resp, rx_timestamp),
            MessageBody::PDelayRespFollowUp(follow_up) => self.dispatch_pdelay_resp_follow_up(header, follow_up),
        };

        result.unwrap_or_default()
    }

    fn dispatch_announce(
        &mut self,
        header: crate::datastructures::messages::Header,
        announce: crate::datastructures::messages::AnnounceMessage,
    ) -> Result<DispatchOutcome, PortError> {
        self.port
            .handle_announce(header, announce, self.parent_ds.parent_port_identity)?;
        let event = self.run_bmc();
        Ok(DispatchOutcome {
            actions: PortActions::new(),
            servo_update: None,
            event,
        })
    }

    fn dispatch_sync(
        &mut self,
        header: crate::datastructures::messages::Header,
        sync: crate::datastructures::messages::SyncMessage,
        rx_timestamp: Option<TimeInternal>,
    ) -> Result<DispatchOutcome, PortError> {
        let Some(rx_timestamp) = rx_timestamp else {
            return Ok(DispatchOutcome::default());
        };
        let servo_update = self
            .port
            .handle_sync(header, sync, rx_timestamp, self.parent_ds.parent_port_identity)?;
        self.apply_servo_update(servo_update.as_ref());
        Ok(DispatchOutcome {
            actions: PortActions::new(),
            servo_update,
            event: None,
        })
    }

    fn dispatch_follow_up(
        &mut self,
        header: crate::datastructures::messages::Header,
        follow_up: crate::datastructures::messages::FollowUpMessage,
    ) -> Result<DispatchOutcome, PortError> {
        let servo_update = self
            .port
            .handle_follow_up(header, follow_up, self.parent_ds.parent_port_identity)?;
        self.apply_servo_update(servo_update.as_ref());
        Ok(DispatchOutcome {
            actions: PortActions::new(),
            servo_update,
            event: None,
        })
    }

    fn dispatch_delay_req(
        &mut self,
        header: crate::datastructures::messages::Header,
        req: crate::datastructures::messages::DelayReqMessage,
        rx_timestamp: Option<TimeInternal>,
    ) -> Result<DispatchOutcome, PortError> {
        let Some(rx_timestamp) = rx_timestamp else {
            return Ok(DispatchOutcome::default());
        };
        let actions = self.port.handle_delay_req(header, req, rx_timestamp)?;
        Ok(DispatchOutcome {
            actions,
            servo_update: None,
            event: None,
        })
    }

    fn dispatch_delay_resp(
        &mut self,
        header: crate::datastructures::messages::Header,
        resp: crate::datastructures::messages::DelayRespMessage,
    ) -> Result<DispatchOutcome, PortError> {
        let servo_update = self.port.handle_delay_resp(header, resp)?;
        self.apply_servo_update(servo_update.as_ref());
        Ok(DispatchOutcome {
            actions: PortActions::new(),
            servo_update,
            event: None,
        })
    }

    fn dispatch_pdelay_req(
        &mut self,
        header: crate::datastructures::messages::Header,
        req: crate::datastructures::messages::PDelayReqMessage,
        rx_timestamp: Option<TimeInternal>,
    ) -> Result<DispatchOutcome, PortError> {
        let Some(rx_timestamp) = rx_timestamp else {
            return Ok(DispatchOutcome::default());
        };
        let actions = self.port.handle_pdelay_req(header, req, rx_timestamp)?;
        Ok(DispatchOutcome {
            actions,
            servo_update: None,
            event: None,
        })
    }

    fn dispatch_pdelay_resp(
        &mut self,
        header: crate::datastructures::messages::Header,
        resp: crate::datastructures::messages::PDelayRespMessage,
        rx_timestamp: Option<TimeInternal>,
    ) -> Result<DispatchOutcome, PortError> {
        let Some(rx_timestamp) = rx_timestamp else {
            return Ok(DispatchOutcome::default());
        };
        self.port.handle_pdelay_resp(header, resp, rx_timestamp)?;
        Ok(DispatchOutcome::default())
    }

    fn dispatch_pdelay_resp_follow_up(
        &mut self,
        header: crate::datastructures::messages::Header,
        follow_up: crate::datastructures::messages::PDelayRespFollowUpMessage,
    ) -> Result<DispatchOutcome, PortError> {
        self.port.handle_pdelay_resp_follow_up(header, follow_up)?;
        Ok(DispatchOutcome::default())
    }

    /// Latch a completed servo sample into the current data set (`spec.md`
    /// §3: `offsetFromMaster`/`meanPathDelay` are recomputed on every servo
    /// update).
    fn apply_servo_update(&mut self, update: Option<&ServoUpdate>) {
        if let Some(update) = update {
            self.current_ds.offset_from_master = update.offset_from_master;
            self.current_ds.mean_path_delay = update.mean_path_delay;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::{
        common::{ClockIdentity, ClockQuality, TimeSource, WireTimestamp},
        messages::{AnnounceMessage, DelayReqMessage, DelayRespMessage, FollowUpMessage, Header, MessageType, SyncMessage},
        WireFormat,
    };

    fn instance(slave_only: bool) -> PtpInstance {
        let instance_config = InstanceConfig {
            clock_identity: ClockIdentity([0xAA; 8]),
            clock_quality: ClockQuality {
                clock_class: 6,
                clock_accuracy: 0x21,
                offset_scaled_log_variance: 0xFFFF,
            },
            priority_1: 128,
            priority_2: 128,
            domain_number: 0,
            slave_only,
        };
        let mut instance = PtpInstance::new(instance_config, PortConfig::default(), 0.0);
        instance.handle_transport_ready();
        instance
    }

    fn encode_announce(source: u8, sequence_id: u16, clock_class: u8) -> Vec<u8> {
        let header = Header {
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([source; 8]),
                port_number: 1,
            },
            sequence_id,
            ..Header::new(MessageType::Announce, 64, 0)
        };
        let body = AnnounceMessage {
            origin_timestamp: WireTimestamp::default(),
            current_utc_offset: 37,
            grandmaster_priority_1: 128,
            grandmaster_clock_quality: ClockQuality {
                clock_class,
                clock_accuracy: 0x21,
                offset_scaled_log_variance: 0,
            },
            grandmaster_priority_2: 128,
            grandmaster_identity: ClockIdentity([source; 8]),
            steps_removed: 0,
            time_source: TimeSource::Gps,
        };
        let mut buf = vec![0u8; 64];
        header.serialize(&mut buf[..34]).unwrap();
        body.serialize_content(&mut buf[34..]).unwrap();
        buf
    }

    #[test]
    fn two_qualifying_announces_elect_self_master_when_better() {
        let mut instance = instance(false);
        let buf = encode_announce(0xBB, 0, 248);
        instance.handle_message(&buf, None);
        let outcome = instance.handle_message(&buf, None);
        assert_eq!(instance.state(), PortState::PreMaster);
        assert!(outcome.event.is_some());
        assert_eq!(instance.parent_ds().grandmaster_identity, instance.default_ds().clock_identity);
    }

    #[test]
    fn slave_only_adopts_foreign_grandmaster() {
        let mut instance = instance(true);
        let buf = encode_announce(0xCC, 0, 6);
        instance.handle_message(&buf, None);
        instance.handle_message(&buf, None);
        assert_eq!(instance.state(), PortState::Slave);
        assert_eq!(
            instance.parent_ds().grandmaster_identity,
            ClockIdentity([0xCC; 8])
        );
        assert_eq!(instance.current_ds().steps_removed, 1);
    }

    /// Scenario S1 (`spec.md` §8), driven end to end through
    /// `handle_message` rather than the port directly.
    #[test]
    fn s1_two_step_slave_lock_end_to_end() {
        let mut instance = instance(true);
        let parent = PortIdentity {
            clock_identity: ClockIdentity([0x33; 8]),
            port_number: 1,
        };

        // Two qualifying Announces from the same sender elect it as parent.
        let announce_buf = {
            let header = Header {
                source_port_identity: parent,
                ..Header::new(MessageType::Announce, 64, 0)
            };
            let body = AnnounceMessage {
                origin_timestamp: WireTimestamp::default(),
                current_utc_offset: 37,
                grandmaster_priority_1: 128,
                grandmaster_clock_quality: ClockQuality {
                    clock_class: 6,
                    clock_accuracy: 0x21,
                    offset_scaled_log_variance: 0,
                },
                grandmaster_priority_2: 128,
                grandmaster_identity: ClockIdentity([0x33; 8]),
                steps_removed: 0,
                time_source: TimeSource::Gps,
            };
            let mut buf = vec![0u8; 64];
            header.serialize(&mut buf[..34]).unwrap();
            body.serialize_content(&mut buf[34..]).unwrap();
            buf
        };
        instance.handle_message(&announce_buf, None);
        instance.handle_message(&announce_buf, None);
        // `slave_only` jumps LISTENING -> SLAVE directly (`spec.md` §4.4's
        // S1 branch), skipping UNCALIBRATED; `handle_sync`/`handle_delay_resp`
        // treat the two states identically.
        assert_eq!(instance.state(), PortState::Slave);
        assert_eq!(instance.parent_ds().parent_port_identity, parent);

        // Entering SLAVE started the Delay_Req timer (1s interval, the
        // default `logMinDelayReqInterval` of 0); tick past it to capture
        // the instance's own outbound Delay_Req sequence id.
        let tick_outcome = instance.tick(1.0, TimeInternal::new(1, 700));
        let delay_req_sequence_id = tick_outcome
            .actions
            .iter()
            .find_map(|action| match action {
                PortAction::SendEvent {
                    context: TimestampContext::DelayReq { sequence_id },
                    ..
                } => Some(*sequence_id),
                _ => None,
            })
            .expect("tick past the delay-req interval emits a Delay_Req");
        instance.handle_send_timestamp(
            TimestampContext::DelayReq {
                sequence_id: delay_req_sequence_id,
            },
            TimeInternal::new(1, 700),
        );

        let mut sync_header = Header {
            source_port_identity: parent,
            sequence_id: 1,
            ..Header::new(MessageType::Sync, 44, 0)
        };
        sync_header.flags.two_step = true;
        let sync = SyncMessage {
            origin_timestamp: WireTimestamp::default(),
        };
        let mut sync_buf = vec![0u8; 44];
        sync_header.serialize(&mut sync_buf[..34]).unwrap();
        sync.serialize_content(&mut sync_buf[34..]).unwrap();
        let outcome = instance.handle_message(&sync_buf, Some(TimeInternal::new(1, 500)));
        assert!(outcome.servo_update.is_none());

        let follow_up_header = Header {
            source_port_identity: parent,
            sequence_id: 1,
            ..Header::new(MessageType::FollowUp, 44, 0)
        };
        let follow_up = FollowUpMessage {
            precise_origin_timestamp: WireTimestamp { seconds: 1, nanos: 0 },
        };
        let mut follow_up_buf = vec![0u8; 44];
        follow_up_header.serialize(&mut follow_up_buf[..34]).unwrap();
        follow_up.serialize_content(&mut follow_up_buf[34..]).unwrap();
        instance.handle_message(&follow_up_buf, None);

        let delay_resp_header = Header {
            source_port_identity: parent,
            sequence_id: delay_req_sequence_id,
            ..Header::new(MessageType::DelayResp, 54, 0)
        };
        let delay_resp = DelayRespMessage {
            receive_timestamp: WireTimestamp {
                seconds: 1,
                nanos: 1000,
            },
            requesting_port_identity: instance.identity(),
        };
        let mut delay_resp_buf = vec![0u8; 54];
        delay_resp_header.serialize(&mut delay_resp_buf[..34]).unwrap();
        delay_resp.serialize_content(&mut delay_resp_buf[34..]).unwrap();
        let outcome = instance.handle_message(&delay_resp_buf, None);

        let update = outcome.servo_update.expect("quadruple complete");
        assert_eq!(update.offset_from_master, TimeInternal::new(0, 100));
        assert_eq!(update.mean_path_delay, TimeInternal::new(0, 400));
        assert_eq!(instance.current_ds().offset_from_master, TimeInternal::new(0, 100));
        assert_eq!(instance.state(), PortState::Slave);
    }

    #[test]
    fn announce_receipt_timeout_clears_parent_back_to_self() {
        let mut instance = instance(false);
        let event = instance.handle_receipt_timeout();
        assert!(matches!(event, Event::PortBecameListening { .. }));
        assert_eq!(
            instance.parent_ds().grandmaster_identity,
            instance.default_ds().clock_identity
        );
    }
}
