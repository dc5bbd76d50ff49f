//! Reschedule engine (spec §4.6): drains the lost queue into fresh
//! scheduled packets.

use crate::{
    allocator::Allocator,
    flags::Flags,
    packet::{FrameTypeBits, PacketId},
    store::Store,
};
use quic_core::inet::ExplicitCongestionNotification;

/// Drains the lost queue head-to-tail while admission permits, producing a
/// freshly numbered scheduled packet per surviving lost packet. Stops (rather
/// than skipping) the first time admission refuses, so later lost packets
/// keep their place at the head of the queue for the next pass.
pub fn run(
    store: &mut Store,
    allocator: &mut Allocator,
    can_admit: impl Fn(&Store) -> bool,
    current_ecn: ExplicitCongestionNotification,
) -> alloc::vec::Vec<PacketId> {
    let mut rescheduled = alloc::vec::Vec::new();

    while let Some(id) = store.lost_front() {
        if store.packets().get(id).frame_types.is_regenerable_only() {
            // Elision already stripped this down to nothing worth resending;
            // its content is conveyed by other signals (spec §4.6).
            store.pop_lost_front();
            store.packets_mut().destroy_chain(id);
            continue;
        }

        if !can_admit(store) {
            break;
        }

        store.pop_lost_front();
        let packet = store.packets_mut().get_mut(id);
        packet.flags.remove(Flags::LOST);
        packet.flags.insert(Flags::SCHEDULED);
        packet.flags.remove(Flags::SENT_SZ);
        packet.frame_types.remove(FrameTypeBits::REGENERABLE);
        packet.packet_number = allocator.next();
        packet.ecn = current_ecn;

        store.schedule_existing(id);
        rescheduled.push(id);
    }

    rescheduled
}
