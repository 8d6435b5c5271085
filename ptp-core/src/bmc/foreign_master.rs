//! Bounded, insertion-ordered foreign-master bookkeeping (`spec.md` §4.3).

use arrayvec::ArrayVec;

use crate::datastructures::{
    common::PortIdentity,
    messages::{AnnounceMessage, Header},
};

/// Upper bound on `max_foreign_records` the table can be configured with.
/// `spec.md` only requires the *configured* capacity be respected; this is
/// just the backing array size so the table needs no allocator.
pub const MAX_FOREIGN_RECORDS: usize = 16;

/// How many of the most recent announce intervals are considered when
/// judging whether a record is qualified.
pub const DEFAULT_FOREIGN_MASTER_TIME_WINDOW: u8 = 4;

/// Minimum Announce count within the time window for a record to enter BMC.
pub const DEFAULT_FOREIGN_MASTER_THRESHOLD: u8 = 2;

/// One candidate master: the most recently observed Announce from a given
/// `sourcePortIdentity`, plus how many have been seen in the current
/// qualification window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignMasterRecord {
    pub source_port_identity: PortIdentity,
    pub header: Header,
    pub announce: AnnounceMessage,
    pub announce_count: u8,
}

impl ForeignMasterRecord {
    /// A record is qualified once it has accumulated the threshold count of
    /// Announces; the count is capped at the threshold since BMC only cares
    /// whether the bar was cleared, not by how much.
    pub fn is_qualified(&self) -> bool {
        self.announce_count >= DEFAULT_FOREIGN_MASTER_THRESHOLD
    }
}

/// Bounded, insertion-ordered table of foreign-master records, keyed by
/// `sourcePortIdentity`. Eviction on overflow is oldest-first.
#[derive(Debug, Clone)]
pub struct ForeignMasterTable {
    records: ArrayVec<ForeignMasterRecord, MAX_FOREIGN_RECORDS>,
    capacity: usize,
}

impl ForeignMasterTable {
    /// `capacity` is clamped to `[1, MAX_FOREIGN_RECORDS]` (`spec.md` §6:
    /// `max_foreign_records`, default 5, minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            records: ArrayVec::new(),
            capacity: capacity.clamp(1, MAX_FOREIGN_RECORDS),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Record an Announce receipt. Returns `true` if this created a new
    /// record (as opposed to updating an existing one).
    pub fn observe(&mut self, header: Header, announce: AnnounceMessage) -> bool {
        let source = header.source_port_identity;

        if let Some(existing) = self
            .records
            .iter_mut()
            .find(|r| r.source_port_identity == source)
        {
            existing.header = header;
            existing.announce = announce;
            existing.announce_count =
                existing.announce_count.saturating_add(1).min(u8::MAX);
            return false;
        }

        let record = ForeignMasterRecord {
            source_port_identity: source,
            header,
            announce,
            announce_count: 1,
        };

        if self.records.len() >= self.capacity {
            // Oldest-first eviction: index 0 is the longest-resident entry.
            self.records.remove(0);
        }
        self.records.push(record);
        true
    }

    /// Reset every record's Announce count, as happens when an
    /// announce-receipt-timeout promotes the port out of
    /// SLAVE/UNCALIBRATED (`spec.md` §3).
    pub fn reset_counts(&mut self) {
        for record in &mut self.records {
            record.announce_count = 0;
        }
    }

    /// Iterate over records that have cleared the qualification threshold;
    /// only these are eligible to enter BMC (`spec.md` §4.3).
    pub fn qualified(&self) -> impl Iterator<Item = &ForeignMasterRecord> {
        self.records.iter().filter(|r| r.is_qualified())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::{
        common::{ClockIdentity, ClockQuality, TimeSource, WireTimestamp},
        messages::MessageType,
    };

    fn header_for(clock_id: u8) -> Header {
        Header {
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([clock_id; 8]),
                port_number: 1,
            },
            ..Header::new(MessageType::Announce, 64, 0)
        }
    }

    fn announce() -> AnnounceMessage {
        AnnounceMessage {
            origin_timestamp: WireTimestamp::default(),
            current_utc_offset: 37,
            grandmaster_priority_1: 128,
            grandmaster_clock_quality: ClockQuality {
                clock_class: 6,
                clock_accuracy: 0x21,
                offset_scaled_log_variance: 0,
            },
            grandmaster_priority_2: 128,
            grandmaster_identity: ClockIdentity([9; 8]),
            steps_removed: 0,
            time_source: TimeSource::Gps,
        }
    }

    #[test]
    fn repeated_observations_from_same_sender_keep_a_single_record() {
        let mut table = ForeignMasterTable::new(5);
        for _ in 0..3 {
            table.observe(header_for(1), announce());
        }
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].announce_count, 3);
    }

    #[test]
    fn unqualified_records_are_excluded_from_bmc() {
        let mut table = ForeignMasterTable::new(5);
        table.observe(header_for(1), announce());
        assert_eq!(table.qualified().count(), 0);
        table.observe(header_for(1), announce());
        assert_eq!(table.qualified().count(), 1);
    }

    #[test]
    fn eviction_is_oldest_first_when_full() {
        let mut table = ForeignMasterTable::new(2);
        table.observe(header_for(1), announce());
        table.observe(header_for(2), announce());
        table.observe(header_for(3), announce());
        assert_eq!(table.len(), 2);
        assert!(table
            .records
            .iter()
            .all(|r| r.source_port_identity.clock_identity != ClockIdentity([1; 8])));
    }

    #[test]
    fn capacity_is_clamped_to_at_least_one() {
        let table = ForeignMasterTable::new(0);
        assert_eq!(table.capacity, 1);
    }
}
