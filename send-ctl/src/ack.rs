//! ACK processor (spec §4.3).
//!
//! Ranges arrive descending (highest packet number first); the unacked queue
//! is kept ascending. Reversing the range list once up front and then
//! walking both lists forward in lock-step keeps the whole pass
//! O(ranges + packets) rather than a per-packet binary search, preserving
//! the access pattern called out in Design Notes §9.

use crate::{
    alarm,
    collaborators::{Alarmset, ConnectionInterface},
    config::Config,
    error::{Result, SendControlError},
    loss,
    pns::PacketNumberSpace,
    store::Store,
};
use alloc::vec::Vec;
use core::ops::RangeInclusive;
use quic_core::{
    recovery::{CongestionController, Pacer, RttEstimator},
    time::Timestamp,
};

/// ECN counters as reported by the peer in an ACK frame's ECN section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EcnCounts {
    pub ect0: u64,
    pub ect1: u64,
    pub ce: u64,
}

pub struct AckFrame {
    pub pns: PacketNumberSpace,
    /// Packet-number ranges, descending, each inclusive of both ends.
    pub ranges: Vec<RangeInclusive<u64>>,
    pub ack_delay: quic_core::time::Duration,
    pub ecn: Option<EcnCounts>,
}

/// Running ECN observation state for one PNS (spec §4.3 "ECN accounting").
#[derive(Clone, Copy, Debug, Default)]
pub struct EcnTracker {
    observed_ce: u64,
    peer_reported: EcnCounts,
    disabled: bool,
}

impl EcnTracker {
    /// Reconciles a peer-reported total against our observations. Disables
    /// ECN on the connection if the peer's count ever shrinks or undercounts
    /// what we observed; returns `true` if the CE count advanced (the
    /// congestion controller should be notified — see the §9 open question
    /// on what action beyond logging that warrants).
    pub fn reconcile(&mut self, reported: EcnCounts, our_observed_ce: u64) -> bool {
        if reported.ect0 < self.peer_reported.ect0
            || reported.ect1 < self.peer_reported.ect1
            || reported.ce < self.peer_reported.ce
            || reported.ce < our_observed_ce
        {
            self.disabled = true;
            return false;
        }
        let ce_advanced = reported.ce > self.peer_reported.ce;
        self.peer_reported = reported;
        self.observed_ce = our_observed_ce;
        ce_advanced
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Total ECN-marked packets the peer has ever acknowledged on this PNS
    /// (spec §4.4 "ECN black-hole tripwire" — zero means no ECN ack has ever
    /// arrived for this space, the precondition for the handshake tripwire).
    #[inline]
    pub fn total_acked(&self) -> u64 {
        self.peer_reported.ect0 + self.peer_reported.ect1 + self.peer_reported.ce
    }

    /// Forces ECN off outright, bypassing the usual reconcile-mismatch path
    /// (spec §4.4 "ECN black-hole tripwire").
    #[inline]
    pub fn force_disable(&mut self) {
        self.disabled = true;
    }
}

#[derive(Debug, Default)]
pub struct AckOutcome {
    pub acked: Vec<u64>,
    pub rtt_sample_delivered: bool,
    pub loss: Option<loss::Outcome>,
    pub ecn_ce_advanced: bool,
}

#[allow(clippy::too_many_arguments)]
pub fn process(
    frame: &AckFrame,
    now: Timestamp,
    largest_sent: u64,
    store: &mut Store,
    alarms: &mut dyn Alarmset,
    conn: &dyn ConnectionInterface,
    alarm_state: &mut alarm::State,
    rtt: &mut RttEstimator,
    cc: &mut dyn CongestionController,
    pacer: &mut dyn Pacer,
    cutback: &mut loss::CutbackTracker,
    ecn: &mut EcnTracker,
    config: &Config,
) -> Result<AckOutcome> {
    let pns = frame.pns;
    let largest_in_frame = frame
        .ranges
        .iter()
        .map(|r| *r.end())
        .max()
        .unwrap_or(0);

    if largest_in_frame > largest_sent {
        return Err(SendControlError::ProtocolViolation);
    }

    let ascending_ranges: Vec<RangeInclusive<u64>> = frame.ranges.iter().rev().cloned().collect();
    let mut range_idx = 0;

    let candidates: Vec<_> = store.unacked(pns).collect();
    let mut outcome = AckOutcome::default();
    let mut largest_acked_packno = 0u64;
    let mut largest_acked_sent_time = now;
    let mut observed_ce = 0u64;
    let mut bytes_retx_before_ack = store.bytes_unacked_retx() as u64;

    for id in candidates {
        let pn = store.packets().get(id).packet_number;

        while range_idx < ascending_ranges.len() && pn > *ascending_ranges[range_idx].end() {
            range_idx += 1;
        }
        if range_idx >= ascending_ranges.len() {
            break;
        }
        if pn < *ascending_ranges[range_idx].start() {
            continue;
        }

        // app_limited: in-flight-retx plus headroom for three more packets
        // of this packet's size is still under the window (spec §4.3).
        let packet_size = store.packets().get(id).sent_size as u64;
        let app_limited = bytes_retx_before_ack + 3 * packet_size < cc.congestion_window() as u64;

        let packet = store.remove_unacked(pns, id);
        if packet.ecn.congestion_experienced() {
            observed_ce += 1;
        }

        cc.ack(packet.sent_size, now, Some(app_limited));
        if packet.is_retransmittable() {
            bytes_retx_before_ack = bytes_retx_before_ack.saturating_sub(packet.sent_size as u64);
        }

        if pn >= largest_acked_packno {
            largest_acked_packno = pn;
            largest_acked_sent_time = packet.sent_time;
        }
        outcome.acked.push(pn);
    }

    if let Some(reported) = frame.ecn {
        outcome.ecn_ce_advanced = ecn.reconcile(reported, observed_ce);
        if ecn.is_disabled() {
            tracing_disable_ecn(pns);
        }
    }

    if !outcome.acked.is_empty() && largest_acked_packno == largest_in_frame {
        let measured = now.saturating_duration_since(largest_acked_sent_time);
        let ack_delay = if frame.ack_delay < measured {
            frame.ack_delay
        } else {
            quic_core::time::Duration::ZERO
        };
        let adjusted = measured.saturating_sub(ack_delay);

        if alarm_state.take_rtt_sample_eligibility(largest_acked_packno) {
            rtt.update_rtt(ack_delay, adjusted, now, conn.handshake_done(), pns);
            alarm_state.reset_on_clean_ack();
            outcome.rtt_sample_delivered = true;
        }
    }

    if !outcome.acked.is_empty() {
        let loss_outcome = loss::detect(
            store,
            pns,
            now,
            largest_acked_packno,
            largest_acked_sent_time,
            largest_sent,
            rtt,
            cc,
            pacer,
            cutback,
            conn,
            ecn,
            config,
        );
        if let Some(loss_to) = loss_outcome.loss_to {
            alarm_state.set_loss_to(loss_to);
        }
        if loss_outcome.disable_ecn {
            ecn.force_disable();
            tracing_disable_ecn(pns);
        }
        outcome.loss = Some(loss_outcome);
    }

    if store.has_retransmittable_unacked(pns) {
        let n_in_flight = store.n_in_flight_all() as u32;
        let mode = alarm_state.select_mode(store, pns, conn.handshake_done(), config);
        let delay = alarm_state.delay(mode, rtt, n_in_flight, config);
        alarms.set(pns, now + delay);
    } else {
        alarms.unset(pns);
    }

    Ok(outcome)
}

#[cfg(feature = "tracing")]
fn tracing_disable_ecn(pns: PacketNumberSpace) {
    tracing::debug!(?pns, "ECN accounting inconsistent with peer report; disabling ECN");
}

#[cfg(not(feature = "tracing"))]
fn tracing_disable_ecn(_pns: PacketNumberSpace) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collaborators::testing::{FakeAlarmset, FakeConnection},
        flags::Flags,
        packet::FrameTypeBits,
        SentPacket,
    };
    use quic_core::{
        inet::ExplicitCongestionNotification, path,
        recovery::congestion_controller::testing::Mock, time::Duration,
    };

    struct NoopPacer;
    impl Pacer for NoopPacer {
        fn init(&mut self, _now: Timestamp) {}
        fn can_schedule(&self, _n_out: u32) -> bool {
            true
        }
        fn packet_scheduled(&mut self, _n_out: u32, _in_recovery: bool, _tx_time: Timestamp) {}
        fn delayed(&self) -> Option<Timestamp> {
            None
        }
        fn next_sched(&self) -> Option<Timestamp> {
            None
        }
        fn loss_event(&mut self) {}
    }

    fn at(secs: u64) -> Timestamp {
        unsafe { Timestamp::from_duration(Duration::from_secs(secs)) }
    }

    fn send(store: &mut Store, pn: u64, pns: PacketNumberSpace, sent_time: Timestamp) {
        let packet = SentPacket::new(
            pn,
            pns,
            Flags::default(),
            FrameTypeBits::STREAM,
            sent_time,
            100,
            100,
            ExplicitCongestionNotification::NotECT,
            unsafe { path::Id::new(0) },
            None,
        );
        let id = store.schedule(packet);
        store.pop_scheduled_front();
        store.record_sent(id);
    }

    #[test]
    fn simple_ack_clears_every_packet_and_delivers_rtt() {
        let mut store = Store::new();
        let pns = PacketNumberSpace::ApplicationData;
        for pn in 0..5 {
            send(&mut store, pn, pns, at(0) + Duration::from_millis(100));
        }

        let frame = AckFrame {
            pns,
            ranges: alloc::vec![0..=4],
            ack_delay: Duration::from_millis(5),
            ecn: None,
        };

        let mut alarms = FakeAlarmset::default();
        let conn = FakeConnection {
            handshake_done: true,
            ..Default::default()
        };
        let mut alarm_state = alarm::State::default();
        let mut rtt = RttEstimator::new(Duration::from_millis(100));
        let mut cc = Mock::new(u32::MAX);
        let mut pacer = NoopPacer;
        let mut cutback = loss::CutbackTracker::default();
        let mut ecn = EcnTracker::default();
        let config = Config::default();

        let now = at(0) + Duration::from_millis(200);
        let outcome = process(
            &frame,
            now,
            4,
            &mut store,
            &mut alarms,
            &conn,
            &mut alarm_state,
            &mut rtt,
            &mut cc,
            &mut pacer,
            &mut cutback,
            &mut ecn,
            &config,
        )
        .unwrap();

        assert_eq!(outcome.acked.len(), 5);
        assert!(store.unacked_is_empty(pns));
        assert!(!alarms.is_set(pns));
        assert!(outcome.rtt_sample_delivered);
        assert_eq!(cc.on_ack, 5);
    }

    #[test]
    fn ack_beyond_ever_sent_is_a_protocol_violation() {
        let mut store = Store::new();
        let pns = PacketNumberSpace::ApplicationData;
        send(&mut store, 0, pns, at(0));

        let frame = AckFrame {
            pns,
            ranges: alloc::vec![0..=10],
            ack_delay: Duration::ZERO,
            ecn: None,
        };

        let mut alarms = FakeAlarmset::default();
        let conn = FakeConnection::default();
        let mut alarm_state = alarm::State::default();
        let mut rtt = RttEstimator::new(Duration::from_millis(100));
        let mut cc = Mock::new(u32::MAX);
        let mut pacer = NoopPacer;
        let mut cutback = loss::CutbackTracker::default();
        let mut ecn = EcnTracker::default();
        let config = Config::default();

        let result = process(
            &frame,
            at(1),
            0,
            &mut store,
            &mut alarms,
            &conn,
            &mut alarm_state,
            &mut rtt,
            &mut cc,
            &mut pacer,
            &mut cutback,
            &mut ecn,
            &config,
        );

        assert!(matches!(result, Err(SendControlError::ProtocolViolation)));
    }
}
