//! The packet descriptor and the arena that owns it.
//!
//! Spec §9 ("Loss chains") asks for a cyclic ring of loss-record shadows
//! linking back to the live packet, and notes that a language forbidding
//! cycles should express the ring as an arena with integer handles: each
//! descriptor stores a "next incarnation" index, the arena owns every node. A
//! lone packet with no history is its own ring of one.

use crate::{flags::Flags, pns::PacketNumberSpace};
use alloc::vec::Vec;
use quic_core::{inet::ExplicitCongestionNotification, path, time::Timestamp};

/// Global packet number, monotonic across the whole controller (not per-PNS —
/// see spec §4.1 and the grounding note in DESIGN.md).
pub type PacketNumber = u64;

/// An arena handle for a live packet descriptor. Stable for the descriptor's
/// lifetime; never reused while the descriptor is live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PacketId(u32);

/// Which frame kinds a packet carries, used to drive ACK, retransmit, and
/// elision logic (spec §3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameTypeBits(u32);

impl FrameTypeBits {
    pub const STREAM: FrameTypeBits = FrameTypeBits(1 << 0);
    pub const RST_STREAM: FrameTypeBits = FrameTypeBits(1 << 1);
    pub const ACK: FrameTypeBits = FrameTypeBits(1 << 2);
    pub const PING: FrameTypeBits = FrameTypeBits(1 << 3);
    pub const CRYPTO: FrameTypeBits = FrameTypeBits(1 << 4);
    pub const STOP_WAITING: FrameTypeBits = FrameTypeBits(1 << 5);
    pub const REGENERABLE: FrameTypeBits = FrameTypeBits(Self::ACK.0 | Self::STOP_WAITING.0);

    #[inline]
    pub fn contains(self, other: FrameTypeBits) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    #[inline]
    pub fn intersects(self, other: FrameTypeBits) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn insert(&mut self, other: FrameTypeBits) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: FrameTypeBits) {
        self.0 &= !other.0;
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Ack-eliciting per RFC 9002 §2: any non-regenerable frame requires an ACK.
    #[inline]
    pub fn is_ack_eliciting(self) -> bool {
        self.0 & !FrameTypeBits::REGENERABLE.0 != 0
    }

    /// Only regenerable content remains (spec §4.6, §4.10 "squeeze").
    #[inline]
    pub fn is_regenerable_only(self) -> bool {
        !self.is_empty() && self.0 & !FrameTypeBits::REGENERABLE.0 == 0
    }
}

/// A live packet descriptor or a loss-record shadow of one.
#[derive(Clone, Debug)]
pub struct SentPacket {
    pub packet_number: PacketNumber,
    pub pns: PacketNumberSpace,
    pub flags: Flags,
    pub frame_types: FrameTypeBits,
    pub sent_time: Timestamp,
    pub sent_size: usize,
    pub total_size: usize,
    pub ecn: ExplicitCongestionNotification,
    pub path: path::Id,
    /// Largest packet number the peer had acknowledged as of this packet's
    /// ACK frame, used to advance the peer's stop-waiting (legacy only).
    pub ack2ed: Option<PacketNumber>,
    /// Next node in this packet's loss-record ring (spec §9); points back to
    /// itself for a packet with no loss-record history yet.
    next_incarnation: PacketId,
}

impl SentPacket {
    /// Builds a fresh descriptor not yet tied to a loss chain. `next_incarnation`
    /// is a placeholder until the packet is inserted into a `Packets` arena,
    /// which always overwrites it to point at itself (spec §9 loss chains).
    #[inline]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        packet_number: PacketNumber,
        pns: PacketNumberSpace,
        flags: Flags,
        frame_types: FrameTypeBits,
        sent_time: Timestamp,
        sent_size: usize,
        total_size: usize,
        ecn: ExplicitCongestionNotification,
        path: path::Id,
        ack2ed: Option<PacketNumber>,
    ) -> Self {
        Self {
            packet_number,
            pns,
            flags,
            frame_types,
            sent_time,
            sent_size,
            total_size,
            ecn,
            path,
            ack2ed,
            next_incarnation: PacketId(0),
        }
    }

    #[inline]
    pub fn is_retransmittable(&self) -> bool {
        self.frame_types.is_ack_eliciting()
    }

    #[inline]
    pub fn is_loss_record(&self) -> bool {
        self.flags.contains(Flags::LOSS_RECORD)
    }
}

/// Owns every live packet descriptor. A freed slot is recycled for the next
/// allocation, mirroring `quic_core::packet::number::Map`'s ring-buffer reuse
/// discipline but keyed by an opaque handle instead of a packet number.
#[derive(Debug, Default)]
pub struct Packets {
    slots: Vec<Option<SentPacket>>,
    free: Vec<u32>,
}

impl Packets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fresh packet whose loss chain is itself (a ring of one).
    pub fn insert(&mut self, mut packet: SentPacket) -> PacketId {
        let id = self.reserve_slot();
        packet.next_incarnation = id;
        self.slots[id.0 as usize] = Some(packet);
        id
    }

    fn reserve_slot(&mut self) -> PacketId {
        if let Some(index) = self.free.pop() {
            PacketId(index)
        } else {
            self.slots.push(None);
            PacketId(self.slots.len() as u32 - 1)
        }
    }

    #[inline]
    pub fn get(&self, id: PacketId) -> &SentPacket {
        self.slots[id.0 as usize]
            .as_ref()
            .expect("PacketId used after the packet was removed")
    }

    #[inline]
    pub fn get_mut(&mut self, id: PacketId) -> &mut SentPacket {
        self.slots[id.0 as usize]
            .as_mut()
            .expect("PacketId used after the packet was removed")
    }

    /// Splices `record` into `original`'s loss chain and returns its handle.
    /// The record becomes the new head; the ring still closes on `original`.
    pub fn link_loss_record(&mut self, original: PacketId, mut record: SentPacket) -> PacketId {
        let next = self.get(original).next_incarnation;
        record.next_incarnation = next;
        let record_id = self.reserve_slot();
        self.slots[record_id.0 as usize] = Some(record);
        self.get_mut(original).next_incarnation = record_id;
        record_id
    }

    /// Walks and removes every descriptor in `start`'s loss chain, including
    /// `start` itself.
    pub fn destroy_chain(&mut self, start: PacketId) {
        let mut current = start;
        loop {
            let next = self.get(current).next_incarnation;
            self.slots[current.0 as usize] = None;
            self.free.push(current.0);
            if next == start {
                break;
            }
            current = next;
        }
    }

    /// Removes a single descriptor without following its loss chain. Used
    /// when a non-retransmittable packet is freed outright (spec §4.4).
    pub fn remove(&mut self, id: PacketId) -> SentPacket {
        let packet = self.slots[id.0 as usize]
            .take()
            .expect("PacketId used after the packet was removed");
        self.free.push(id.0);
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quic_core::time::Duration;

    fn packet(packet_number: PacketNumber, pns: PacketNumberSpace) -> SentPacket {
        SentPacket::new(
            packet_number,
            pns,
            Flags::UNACKED,
            FrameTypeBits::STREAM,
            unsafe { Timestamp::from_duration(Duration::from_secs(1)) },
            100,
            100,
            ExplicitCongestionNotification::NotECT,
            unsafe { path::Id::new(0) },
            None,
        )
    }

    #[test]
    fn lone_packet_is_its_own_ring() {
        let mut packets = Packets::new();
        let id = packets.insert(packet(1, PacketNumberSpace::ApplicationData));
        assert_eq!(packets.get(id).next_incarnation, id);
    }

    #[test]
    fn loss_chain_destroy_removes_every_incarnation() {
        let mut packets = Packets::new();
        let original = packets.insert(packet(1, PacketNumberSpace::ApplicationData));
        let record = packets.link_loss_record(original, packet(1, PacketNumberSpace::ApplicationData));

        assert_eq!(packets.get(original).next_incarnation, record);
        assert_eq!(packets.get(record).next_incarnation, original);

        packets.destroy_chain(original);
        assert!(packets.slots[original.0 as usize].is_none());
        assert!(packets.slots[record.0 as usize].is_none());
    }

    #[test]
    fn freed_slots_are_recycled() {
        let mut packets = Packets::new();
        let a = packets.insert(packet(1, PacketNumberSpace::Initial));
        packets.remove(a);
        let b = packets.insert(packet(2, PacketNumberSpace::Initial));
        assert_eq!(a, b);
    }
}
