//! Buffered-priority scheduler (spec §4.8): the two-bucket staging area used
//! when immediate scheduling is disabled.

use crate::{
    allocator::Allocator,
    collaborators::{ConnectionInterface, StreamTable},
    config::Config,
    flags::Flags,
    packet::{FrameTypeBits, PacketId},
    store::{Priority, Store},
};
use alloc::collections::BTreeMap;
use quic_core::recovery::CongestionController;

/// Caches which bucket a stream's writes currently land in, so repeated
/// writes from the same stream don't re-run the priority comparison every
/// time (spec §4.8 "cached by stream id").
#[derive(Clone, Debug, Default)]
pub struct BucketCache {
    cached: BTreeMap<u64, Priority>,
}

impl BucketCache {
    /// Drops a stream's cached bucket (spec: "invalidated by explicit reset").
    pub fn invalidate(&mut self, stream_id: u64) {
        self.cached.remove(&stream_id);
    }

    /// Classifies `stream_id`'s writing priority against every other stream
    /// still competing for bandwidth: HIGHEST_PRIO iff strictly higher
    /// priority (lower number) than every non-critical, not-write-done
    /// competitor.
    pub fn classify(
        &mut self,
        stream_id: u64,
        priority: u8,
        streams: &dyn StreamTable,
    ) -> Priority {
        if let Some(&cached) = self.cached.get(&stream_id) {
            return cached;
        }

        let highest = streams
            .streams()
            .filter(|s| s.id != stream_id && !s.critical && !s.write_done)
            .all(|s| priority < s.priority);

        let bucket = if highest {
            Priority::Highest
        } else {
            Priority::Other
        };
        self.cached.insert(stream_id, bucket);
        bucket
    }
}

/// Per-bucket capacity (spec §4.8 "Per-bucket limit").
pub fn bucket_limit(
    priority: Priority,
    store: &Store,
    cc: &dyn CongestionController,
    mtu: usize,
    config: &Config,
) -> usize {
    match priority {
        Priority::Other => config.max_bpq_count,
        Priority::Highest => {
            let window_packets = (cc.congestion_window() as usize / mtu.max(1))
                .saturating_sub(store.n_in_flight_all())
                .saturating_sub(store.buffered_len(Priority::Highest));
            config.max_bpq_count.max(window_packets)
        }
    }
}

/// Adds one freshly built packet to `priority`'s bucket, trying to carry an
/// ACK along (spec §4.8 "ACK placement").
pub fn add_to_bucket(
    store: &mut Store,
    priority: Priority,
    mut packet: crate::packet::SentPacket,
    conn: &dyn ConnectionInterface,
) -> PacketId {
    let is_first_in_bucket = store.buffered_len(priority) == 0;
    if is_first_in_bucket {
        let other = match priority {
            Priority::Highest => Priority::Other,
            Priority::Other => Priority::Highest,
        };
        let other_carries_ack = store
            .buffered_front(other)
            .is_some_and(|id| store.packets().get(id).frame_types.contains(FrameTypeBits::ACK));

        if other_carries_ack {
            if let Some(other_head) = store.buffered_front(other) {
                let other_packet = store.packets_mut().get_mut(other_head);
                other_packet.frame_types.remove(FrameTypeBits::ACK);
            }
            packet.frame_types.insert(FrameTypeBits::ACK);
        } else if conn.can_write_ack() {
            packet.frame_types.insert(FrameTypeBits::ACK);
        }
    }

    let id = store.packets_mut().insert(packet);
    store.packets_mut().get_mut(id).flags.insert(Flags::REPACKNO);
    store.push_buffered(priority, id);
    id
}

/// Drains both buckets into the scheduled queue while admission permits,
/// head-first in enumeration order (HIGHEST_PRIO before OTHER_PRIO), assigning
/// fresh packet numbers as each packet is promoted (spec §4.8 "Promotion").
pub fn schedule_buffered(
    store: &mut Store,
    allocator: &mut Allocator,
    can_admit: impl Fn(&Store) -> bool,
    largest_acked: Option<u64>,
) -> alloc::vec::Vec<PacketId> {
    let mut promoted = alloc::vec::Vec::new();

    for priority in [Priority::Highest, Priority::Other] {
        while can_admit(store) {
            let Some(id) = store.buffered_front(priority) else {
                break;
            };

            if let Some(largest_acked) = largest_acked {
                let packet = store.packets().get(id);
                if packet.frame_types.contains(FrameTypeBits::ACK)
                    && packet.ack2ed.is_some_and(|ack2ed| ack2ed < largest_acked)
                {
                    store.packets_mut().get_mut(id).frame_types.remove(FrameTypeBits::ACK);
                }
                if store.packets().get(id).frame_types.is_empty() {
                    store.pop_buffered_front(priority);
                    store.packets_mut().destroy_chain(id);
                    continue;
                }
            }

            store.pop_buffered_front(priority);
            let packet = store.packets_mut().get_mut(id);
            packet.packet_number = allocator.next();
            packet.flags.remove(Flags::REPACKNO);
            packet.flags.insert(Flags::SCHEDULED);
            store.schedule_existing(id);
            promoted.push(id);
        }
    }

    promoted
}
