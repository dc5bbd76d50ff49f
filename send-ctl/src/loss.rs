//! Loss detector (spec §4.4): FACK/reordering, early retransmit, and
//! time-based heuristics over one PNS's unacked queue.

use crate::{
    ack::EcnTracker,
    collaborators::ConnectionInterface,
    config::Config,
    packet::PacketId,
    pns::PacketNumberSpace,
    store::Store,
};
use alloc::vec::Vec;
use quic_core::{
    recovery::{CongestionController, Pacer, RttEstimator},
    time::{Duration, Timestamp},
};

/// Everything a loss-detection pass discovered, for the caller (ACK processor
/// or alarm) to notify collaborators and decide on a congestion cutback.
#[derive(Debug, Default)]
pub struct Outcome {
    pub lost: Vec<PacketId>,
    /// Set when early retransmit fired; the LOSS-mode alarm should be armed
    /// this far out (spec §4.4, §9 open question on persistence).
    pub loss_to: Option<Duration>,
    /// Set when the handshake ECN black-hole tripwire fired; the caller
    /// should force the PNS's `EcnTracker` off (spec §4.4).
    pub disable_ecn: bool,
}

/// Tracks the largest-ever-sent packet number as of the last congestion
/// cutback, so losses within the same epoch don't double-trigger `cc.loss()`
/// (spec §4.4 "Special tripwire").
#[derive(Clone, Copy, Debug, Default)]
pub struct CutbackTracker {
    largest_sent_at_cutback: Option<u64>,
}

impl CutbackTracker {
    /// Returns `true` the first time, per epoch, that a lost packet number
    /// exceeds the last cutback's watermark; advances the watermark to
    /// `largest_sent` when it does.
    pub fn observe_loss(&mut self, lost_packet_number: u64, largest_sent: u64) -> bool {
        let triggers = self
            .largest_sent_at_cutback
            .is_none_or(|watermark| lost_packet_number > watermark);
        if triggers {
            self.largest_sent_at_cutback = Some(largest_sent);
        }
        triggers
    }
}

/// Runs one loss-detection pass over `pns`'s unacked queue.
#[allow(clippy::too_many_arguments)]
pub fn detect(
    store: &mut Store,
    pns: PacketNumberSpace,
    now: Timestamp,
    largest_acked_packno: u64,
    largest_acked_sent_time: Timestamp,
    largest_sent: u64,
    rtt: &RttEstimator,
    cc: &mut dyn CongestionController,
    pacer: &mut dyn Pacer,
    cutback: &mut CutbackTracker,
    conn: &dyn ConnectionInterface,
    ecn: &EcnTracker,
    config: &Config,
) -> Outcome {
    let srtt = rtt.smoothed_rtt();

    let largest_retransmittable = store
        .unacked(pns)
        .filter(|&id| store.packets().get(id).is_retransmittable())
        .map(|id| store.packets().get(id).packet_number)
        .max();

    let early_retransmit_applies = largest_retransmittable
        .is_some_and(|largest_retx| largest_retx <= largest_acked_packno);

    let candidates: Vec<PacketId> = store.unacked(pns).collect();
    let mut to_declare = Vec::new();

    for id in candidates {
        let packet = store.packets().get(id);
        if packet.is_loss_record() {
            continue;
        }

        let by_fack = packet.packet_number + config.n_nacks_before_retx <= largest_acked_packno;
        let by_early_retransmit =
            early_retransmit_applies && packet.is_retransmittable() && packet.packet_number <= largest_acked_packno;
        let by_time = largest_acked_sent_time > packet.sent_time
            && largest_acked_sent_time - packet.sent_time > srtt;

        if by_fack || by_early_retransmit || by_time {
            to_declare.push(id);
        }
    }

    let mut outcome = Outcome::default();
    if early_retransmit_applies && !to_declare.is_empty() {
        outcome.loss_to = Some(srtt / 4);
    }

    let mut fired_loss_hook = false;
    for id in to_declare {
        let packet = store.packets().get(id);
        let packet_number = packet.packet_number;
        let sent_size = packet.sent_size;
        let retransmittable = packet.is_retransmittable();

        // Possible ECN black hole during the handshake: the client's third
        // Initial packet number was never the subject of a single ECN-marked
        // ack. A real black hole and an ossified middlebox look identical
        // this early, so the tripwire just turns ECN off rather than trying
        // to distinguish them (spec §4.4; server-side detection is out of
        // scope here per the same client-only check upstream).
        if config.ecn_enabled
            && !conn.is_server()
            && pns == PacketNumberSpace::Initial
            && packet_number == 3
            && ecn.total_acked() == 0
        {
            outcome.disable_ecn = true;
        }

        cc.lost(sent_size);
        if !fired_loss_hook {
            cc.loss();
            fired_loss_hook = true;
        }

        if cutback.observe_loss(packet_number, largest_sent) {
            pacer.loss_event();
        }

        if retransmittable {
            store.declare_lost(pns, id);
            outcome.lost.push(id);
        } else {
            store.remove_unacked(pns, id);
        }
    }

    outcome
}
