//! Next-packet-to-send chooser (spec §4.9): the head of the scheduled queue,
//! subject to RTO-verification blockade, renumbering, and datagram-fit rules.

use crate::{
    admission::RtoVerification,
    allocator::Allocator,
    flags::Flags,
    packet::{FrameTypeBits, PacketId},
    store::Store,
};
use quic_core::{
    inet::ExplicitCongestionNotification,
    time::{Duration, Timestamp},
};

/// What the caller should do with the chosen packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Choice {
    Send(PacketId),
    /// Nothing at the head fits the current constraints; try again later.
    None,
}

/// True if `last_rto` is still within one RTO interval of `now` — the window
/// during which only RTO-verification-limited sends are allowed (spec §4.9
/// "recent").
fn rto_blockade_active(last_rto: Option<Timestamp>, now: Timestamp, rto_interval: Duration) -> bool {
    last_rto.is_some_and(|last| now.saturating_duration_since(last) <= rto_interval)
}

/// Picks the next packet to send, applying every per-packet gate in order.
/// `remaining_datagram_budget` is `None` when not coalescing into a prior
/// datagram.
#[allow(clippy::too_many_arguments)]
pub fn choose(
    store: &mut Store,
    allocator: &mut Allocator,
    rto: &mut RtoVerification,
    consec_rtos: u32,
    last_rto: Option<Timestamp>,
    now: Timestamp,
    rto_interval: Duration,
    remaining_datagram_budget: Option<usize>,
) -> Choice {
    let Some(id) = store.scheduled_front() else {
        return Choice::None;
    };

    if consec_rtos > 0 && rto_blockade_active(last_rto, now, rto_interval) {
        let packet = store.packets().get(id);
        let ack_only = packet.frame_types.is_regenerable_only();
        if !ack_only {
            if !rto.take() {
                return Choice::None;
            }
            store.packets_mut().get_mut(id).flags.insert(Flags::LIMITED);
        }
    }

    if store.packets().get(id).flags.contains(Flags::REPACKNO) {
        renumber_for_resend(store, allocator, id);
        if store.packets().get(id).frame_types.is_regenerable_only() {
            store.pop_scheduled_front();
            store.packets_mut().destroy_chain(id);
            return Choice::None;
        }
    }

    if let Some(budget) = remaining_datagram_budget {
        let size = store.packets().get(id).total_size;
        if size > budget {
            return Choice::None;
        }
    }

    store.pop_scheduled_front();
    Choice::Send(id)
}

/// Renumbers a `REPACKNO` packet in place before it can be sent again (spec
/// §4.9 "update for resending").
fn renumber_for_resend(store: &mut Store, allocator: &mut Allocator, id: PacketId) {
    let packet = store.packets_mut().get_mut(id);
    packet.flags.remove(Flags::SENT_SZ);
    packet.flags.remove(Flags::REPACKNO);
    packet.frame_types.remove(FrameTypeBits::REGENERABLE);
    packet.packet_number = allocator.next();
    packet.ecn = ExplicitCongestionNotification::NotECT;
}

/// Pads an Initial packet up to `target` total bytes if the coalesced
/// datagram would otherwise fall short of 1200 (spec §4.9 "padding").
pub fn pad_initial_if_needed(store: &mut Store, id: PacketId, coalesced_bytes: usize, target: usize) {
    if coalesced_bytes >= target {
        return;
    }
    let packet = store.packets_mut().get_mut(id);
    packet.total_size = packet.total_size.max(packet.total_size + (target - coalesced_bytes));
}

/// Reinserts a packet that couldn't be written after all (spec §4.9
/// "Delayed one"), restoring its RTO-verification token if it spent one.
pub fn delay_one(store: &mut Store, rto: &mut RtoVerification, id: PacketId) {
    if store.packets().get(id).flags.contains(Flags::LIMITED) {
        store.packets_mut().get_mut(id).flags.remove(Flags::LIMITED);
        rto.restore();
    }
    store.push_scheduled_front(id);
}
