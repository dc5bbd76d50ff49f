//! The packet-set store: owns every queue a packet can live in, plus the
//! byte/count accumulators derived from queue membership (spec §2 row 1,
//! §3 invariants 1–4).
//!
//! Four collections: `scheduled`, `unacked` (one per PNS), `lost`, and
//! `buffered` (one per priority bucket). A packet is in exactly one of them
//! at a time, tracked by the `SCHEDULED`/`UNACKED`/`LOST` flag triple — a
//! loss record is the one exception, living in `unacked` with
//! `UNACKED | LOSS_RECORD` set (invariant 1).

use crate::{
    flags::Flags,
    packet::{PacketId, Packets, SentPacket},
    pns::{PacketNumberSpace, PerPns},
};
use alloc::{collections::VecDeque, vec::Vec};

/// The two buckets of the buffered-priority scheduler (spec §4.8).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Priority {
    Highest,
    Other,
}

#[derive(Debug, Default)]
struct Accumulators {
    bytes_unacked_all: usize,
    n_in_flight_all: usize,
    bytes_unacked_retx: usize,
    n_in_flight_retx: usize,
    bytes_scheduled: usize,
}

#[derive(Debug, Default)]
pub struct Store {
    packets: Packets,
    scheduled: VecDeque<PacketId>,
    unacked: PerPns<VecDeque<PacketId>>,
    lost: VecDeque<PacketId>,
    buffered_highest: VecDeque<PacketId>,
    buffered_other: VecDeque<PacketId>,
    accumulators: Accumulators,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn packets(&self) -> &Packets {
        &self.packets
    }

    #[inline]
    pub fn packets_mut(&mut self) -> &mut Packets {
        &mut self.packets
    }

    #[inline]
    pub fn bytes_unacked_all(&self) -> usize {
        self.accumulators.bytes_unacked_all
    }

    #[inline]
    pub fn n_in_flight_all(&self) -> usize {
        self.accumulators.n_in_flight_all
    }

    #[inline]
    pub fn bytes_unacked_retx(&self) -> usize {
        self.accumulators.bytes_unacked_retx
    }

    #[inline]
    pub fn n_in_flight_retx(&self) -> usize {
        self.accumulators.n_in_flight_retx
    }

    #[inline]
    pub fn bytes_scheduled(&self) -> usize {
        self.accumulators.bytes_scheduled
    }

    /// Inserts a freshly allocated packet and appends it to the scheduled
    /// queue.
    pub fn schedule(&mut self, mut packet: SentPacket) -> PacketId {
        packet.flags.insert(Flags::SCHEDULED);
        let total_size = packet.total_size;
        let id = self.packets.insert(packet);
        self.scheduled.push_back(id);
        self.accumulators.bytes_scheduled += total_size;
        id
    }

    /// Appends an already-allocated packet descriptor to the scheduled queue
    /// (spec §4.8 "Promotion" — the buffered-priority packet already has an
    /// arena slot; only its queue membership changes).
    pub fn schedule_existing(&mut self, id: PacketId) {
        let total_size = self.packets.get(id).total_size;
        self.scheduled.push_back(id);
        self.accumulators.bytes_scheduled += total_size;
    }

    #[inline]
    pub fn scheduled_front(&self) -> Option<PacketId> {
        self.scheduled.front().copied()
    }

    pub fn pop_scheduled_front(&mut self) -> Option<PacketId> {
        let id = self.scheduled.pop_front()?;
        let total_size = self.packets.get(id).total_size;
        self.accumulators.bytes_scheduled -= total_size;
        Some(id)
    }

    /// Re-inserts a packet at the head of the scheduled queue ("delayed one",
    /// spec §4.9) after a send attempt failed.
    pub fn push_scheduled_front(&mut self, id: PacketId) {
        let total_size = self.packets.get(id).total_size;
        self.scheduled.push_front(id);
        self.accumulators.bytes_scheduled += total_size;
    }

    /// Moves a just-written packet from scheduled into `unacked[pns]`
    /// (spec §4.2). The unacked queue stays sorted ascending because sends
    /// happen in increasing packet-number order.
    pub fn record_sent(&mut self, id: PacketId) {
        let packet = self.packets.get_mut(id);
        packet.flags.remove(Flags::SCHEDULED);
        packet.flags.insert(Flags::UNACKED);
        let sent_size = packet.sent_size;
        let retransmittable = packet.is_retransmittable();
        let pns = packet.pns;

        self.accumulators.bytes_unacked_all += sent_size;
        self.accumulators.n_in_flight_all += 1;
        if retransmittable {
            self.accumulators.bytes_unacked_retx += sent_size;
            self.accumulators.n_in_flight_retx += 1;
        }

        self.unacked.get_mut(pns).push_back(id);
    }

    #[inline]
    pub fn unacked(&self, pns: PacketNumberSpace) -> impl Iterator<Item = PacketId> + '_ {
        self.unacked.get(pns).iter().copied()
    }

    #[inline]
    pub fn unacked_is_empty(&self, pns: PacketNumberSpace) -> bool {
        self.unacked.get(pns).is_empty()
    }

    /// True iff any retransmittable, non-loss-record packet remains unacked
    /// in `pns` (spec §3 invariant 5 — alarm-armed condition).
    pub fn has_retransmittable_unacked(&self, pns: PacketNumberSpace) -> bool {
        self.unacked(pns)
            .any(|id| self.packets.get(id).is_retransmittable())
    }

    /// Removes `id` from `unacked[pns]`, updating accumulators, destroys its
    /// loss chain (a lone packet's chain is itself), and returns a snapshot
    /// of the descriptor for the caller to act on (RTT sample, congestion
    /// ack/stream notification) before it's gone.
    pub fn remove_unacked(&mut self, pns: PacketNumberSpace, id: PacketId) -> SentPacket {
        let queue = self.unacked.get_mut(pns);
        let index = queue
            .iter()
            .position(|&candidate| candidate == id)
            .expect("packet id not present in the unacked queue for this PNS");
        queue.remove(index);

        let packet = self.packets.get(id).clone();
        if !packet.is_loss_record() {
            self.accumulators.bytes_unacked_all -= packet.sent_size;
            self.accumulators.n_in_flight_all -= 1;
            if packet.is_retransmittable() {
                self.accumulators.bytes_unacked_retx -= packet.sent_size;
                self.accumulators.n_in_flight_retx -= 1;
            }
        }
        self.packets.destroy_chain(id);
        packet
    }

    /// Moves a declared-lost packet out of `unacked[pns]` into the lost
    /// queue, leaving behind a loss-record shadow in its place (spec §4.4).
    /// Returns the loss record's handle so the caller can attach `ack2ed`.
    pub fn declare_lost(&mut self, pns: PacketNumberSpace, id: PacketId) -> PacketId {
        let packet = self.packets.get(id);
        debug_assert!(packet.is_retransmittable());
        self.accumulators.bytes_unacked_all -= packet.sent_size;
        self.accumulators.n_in_flight_all -= 1;
        self.accumulators.bytes_unacked_retx -= packet.sent_size;
        self.accumulators.n_in_flight_retx -= 1;

        let mut record = packet.clone();
        record.flags.insert(Flags::LOSS_RECORD);
        let record_id = self.packets.link_loss_record(id, record);

        let queue = self.unacked.get_mut(pns);
        let index = queue
            .iter()
            .position(|&candidate| candidate == id)
            .expect("packet id not present in the unacked queue for this PNS");
        queue[index] = record_id;

        let original = self.packets.get_mut(id);
        original.flags.remove(Flags::UNACKED);
        original.flags.insert(Flags::LOST);
        self.lost.push_back(id);

        record_id
    }

    #[inline]
    pub fn lost_front(&self) -> Option<PacketId> {
        self.lost.front().copied()
    }

    pub fn pop_lost_front(&mut self) -> Option<PacketId> {
        self.lost.pop_front()
    }

    pub fn push_buffered(&mut self, priority: Priority, id: PacketId) {
        match priority {
            Priority::Highest => self.buffered_highest.push_back(id),
            Priority::Other => self.buffered_other.push_back(id),
        }
    }

    #[inline]
    pub fn buffered_front(&self, priority: Priority) -> Option<PacketId> {
        match priority {
            Priority::Highest => self.buffered_highest.front().copied(),
            Priority::Other => self.buffered_other.front().copied(),
        }
    }

    pub fn pop_buffered_front(&mut self, priority: Priority) -> Option<PacketId> {
        match priority {
            Priority::Highest => self.buffered_highest.pop_front(),
            Priority::Other => self.buffered_other.pop_front(),
        }
    }

    #[inline]
    pub fn buffered_len(&self, priority: Priority) -> usize {
        match priority {
            Priority::Highest => self.buffered_highest.len(),
            Priority::Other => self.buffered_other.len(),
        }
    }

    /// Snapshot of every scheduled packet's handle, in queue order.
    #[inline]
    pub fn scheduled_ids(&self) -> Vec<PacketId> {
        self.scheduled.iter().copied().collect()
    }

    /// Snapshot of every lost-queue packet's handle, in queue order.
    #[inline]
    pub fn lost_ids(&self) -> Vec<PacketId> {
        self.lost.iter().copied().collect()
    }

    /// Snapshot of every packet handle across every queue (spec §4.10
    /// "Repath" walks all of them).
    pub fn all_ids(&self) -> Vec<PacketId> {
        let mut ids: Vec<PacketId> = self.scheduled.iter().copied().collect();
        for (_, queue) in self.unacked.iter() {
            ids.extend(queue.iter().copied());
        }
        ids.extend(self.lost.iter().copied());
        ids.extend(self.buffered_highest.iter().copied());
        ids.extend(self.buffered_other.iter().copied());
        ids
    }

    /// Removes `id` from the scheduled queue without touching the arena or
    /// accumulators beyond the scheduled-bytes count; the caller owns what
    /// happens to the descriptor next.
    pub fn remove_scheduled(&mut self, id: PacketId) {
        if let Some(index) = self.scheduled.iter().position(|&candidate| candidate == id) {
            self.scheduled.remove(index);
            let total_size = self.packets.get(id).total_size;
            self.accumulators.bytes_scheduled -= total_size;
        }
    }

    /// Applies `keep` to every scheduled packet, dropping (and destroying)
    /// those it rejects. `keep` may mutate the packet through `store` before
    /// answering; used by the mutators that edit-then-filter in one pass.
    pub fn retain_scheduled(&mut self, mut keep: impl FnMut(&mut Store, PacketId) -> bool) {
        let ids: Vec<PacketId> = self.scheduled.iter().copied().collect();
        for id in ids {
            if !keep(self, id) {
                self.remove_scheduled(id);
                self.packets.destroy_chain(id);
            }
        }
    }

    /// Same as [`Store::retain_scheduled`] but over one buffered-priority
    /// bucket, for mutators that must reach packets still staged ahead of
    /// promotion (spec §4.10 "Elide stream frames").
    pub fn retain_buffered(&mut self, priority: Priority, mut keep: impl FnMut(&mut Store, PacketId) -> bool) {
        let ids: Vec<PacketId> = match priority {
            Priority::Highest => self.buffered_highest.iter().copied().collect(),
            Priority::Other => self.buffered_other.iter().copied().collect(),
        };
        for id in ids {
            if !keep(self, id) {
                let queue = match priority {
                    Priority::Highest => &mut self.buffered_highest,
                    Priority::Other => &mut self.buffered_other,
                };
                if let Some(index) = queue.iter().position(|&candidate| candidate == id) {
                    queue.remove(index);
                }
                self.packets.destroy_chain(id);
            }
        }
    }

    /// Destroys every packet in every queue belonging to `pns` and clears
    /// the queue (spec §4.10 "Empty PNS").
    pub fn empty_pns(&mut self, pns: PacketNumberSpace) {
        let ids: alloc::vec::Vec<PacketId> = self.unacked.get_mut(pns).drain(..).collect();
        for id in ids {
            self.packets.destroy_chain(id);
        }

        self.scheduled.retain(|&id| {
            let keep = self.packets.get(id).pns != pns;
            if !keep {
                self.packets.destroy_chain(id);
            }
            keep
        });
        self.lost.retain(|&id| {
            let keep = self.packets.get(id).pns != pns;
            if !keep {
                self.packets.destroy_chain(id);
            }
            keep
        });
        self.buffered_highest.retain(|&id| {
            let keep = self.packets.get(id).pns != pns;
            if !keep {
                self.packets.destroy_chain(id);
            }
            keep
        });
        self.buffered_other.retain(|&id| {
            let keep = self.packets.get(id).pns != pns;
            if !keep {
                self.packets.destroy_chain(id);
            }
            keep
        });
    }

    /// Reconciles accumulators against queue contents (spec §5 "Memory
    /// accounting"). Intended for debug-build assertions, not the hot path.
    pub fn sanity_check(&self) -> bool {
        let mut bytes_all = 0usize;
        let mut n_all = 0usize;
        let mut bytes_retx = 0usize;
        let mut n_retx = 0usize;

        for (_, queue) in self.unacked.iter() {
            for &id in queue {
                let packet = self.packets.get(id);
                if packet.is_loss_record() {
                    continue;
                }
                bytes_all += packet.sent_size;
                n_all += 1;
                if packet.is_retransmittable() {
                    bytes_retx += packet.sent_size;
                    n_retx += 1;
                }
            }
        }

        let bytes_scheduled: usize = self
            .scheduled
            .iter()
            .map(|&id| self.packets.get(id).total_size)
            .sum();

        bytes_all == self.accumulators.bytes_unacked_all
            && n_all == self.accumulators.n_in_flight_all
            && bytes_retx == self.accumulators.bytes_unacked_retx
            && n_retx == self.accumulators.n_in_flight_retx
            && bytes_scheduled == self.accumulators.bytes_scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::FrameTypeBits;
    use quic_core::{inet::ExplicitCongestionNotification, path, time::{Duration, Timestamp}};

    fn packet(pns: PacketNumberSpace, retransmittable: bool) -> SentPacket {
        let frame_types = if retransmittable {
            FrameTypeBits::STREAM
        } else {
            FrameTypeBits::ACK
        };
        SentPacket::new(
            0,
            pns,
            Flags::default(),
            frame_types,
            unsafe { Timestamp::from_duration(Duration::from_secs(1)) },
            100,
            120,
            ExplicitCongestionNotification::NotECT,
            unsafe { path::Id::new(0) },
            None,
        )
    }

    #[test]
    fn schedule_then_send_moves_accumulators() {
        let mut store = Store::new();
        let id = store.schedule(packet(PacketNumberSpace::ApplicationData, true));
        assert_eq!(store.bytes_scheduled(), 120);

        store.pop_scheduled_front();
        assert_eq!(store.bytes_scheduled(), 0);

        store.record_sent(id);
        assert_eq!(store.bytes_unacked_all(), 100);
        assert_eq!(store.n_in_flight_all(), 1);
        assert_eq!(store.bytes_unacked_retx(), 100);
        assert!(store.sanity_check());
    }

    #[test]
    fn non_retransmittable_packet_does_not_count_toward_retx() {
        let mut store = Store::new();
        let id = store.schedule(packet(PacketNumberSpace::ApplicationData, false));
        store.pop_scheduled_front();
        store.record_sent(id);
        assert_eq!(store.bytes_unacked_all(), 100);
        assert_eq!(store.bytes_unacked_retx(), 0);
    }

    #[test]
    fn declare_lost_leaves_a_loss_record_in_place() {
        let mut store = Store::new();
        let id = store.schedule(packet(PacketNumberSpace::ApplicationData, true));
        store.pop_scheduled_front();
        store.record_sent(id);

        let record = store.declare_lost(PacketNumberSpace::ApplicationData, id);
        assert!(store.packets().get(record).is_loss_record());
        assert_eq!(store.bytes_unacked_retx(), 0);
        assert_eq!(store.lost_front(), Some(id));
        assert!(store.sanity_check());
    }

    #[test]
    fn remove_unacked_fully_frees_a_clean_ack() {
        let mut store = Store::new();
        let id = store.schedule(packet(PacketNumberSpace::ApplicationData, true));
        store.pop_scheduled_front();
        store.record_sent(id);

        store.remove_unacked(PacketNumberSpace::ApplicationData, id);
        assert_eq!(store.bytes_unacked_all(), 0);
        assert_eq!(store.n_in_flight_all(), 0);
        assert!(store.unacked_is_empty(PacketNumberSpace::ApplicationData));
    }
}
