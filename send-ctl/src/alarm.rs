//! Retransmission alarm (spec §4.5): per-PNS single-shot timer with
//! four-mode priority selection and exponential backoff.

use crate::{
    collaborators::{Alarmset, ConnectionInterface},
    config::Config,
    flags::Flags,
    loss,
    packet::PacketId,
    pns::PacketNumberSpace,
    store::Store,
};
use alloc::vec::Vec;
use quic_core::{
    recovery::{CongestionController, Pacer, RttEstimator},
    time::{Duration, Timestamp},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Handshake,
    Loss,
    Tlp,
    Rto,
}

/// Per-PNS counters the alarm needs across fires (spec §4.5 and the §9 open
/// question on whether `loss_to` should persist — here it is cleared the
/// moment LOSS mode consumes it, matching the original's unconditional clear
/// at the top of loss detection).
#[derive(Clone, Copy, Debug, Default)]
pub struct State {
    n_hsk: u32,
    tlp_count: u32,
    consec_rtos: u32,
    last_rto: Option<Timestamp>,
    loss_to: Option<Duration>,
    /// Packet number of the last packet an RTT sample was taken from; a
    /// later ACK must cover a strictly larger number to produce a fresh
    /// sample (spec §4.3).
    last_rtt_sample_pn: Option<u64>,
}

impl State {
    #[inline]
    pub fn consec_rtos(&self) -> u32 {
        self.consec_rtos
    }

    #[inline]
    pub fn last_rto(&self) -> Option<Timestamp> {
        self.last_rto
    }

    /// Records early retransmit's delay so the next fire selects LOSS mode.
    #[inline]
    pub fn set_loss_to(&mut self, loss_to: Duration) {
        self.loss_to = Some(loss_to);
    }

    pub fn reset_on_clean_ack(&mut self) {
        self.consec_rtos = 0;
        self.n_hsk = 0;
        self.tlp_count = 0;
    }

    /// Returns `true` and records `packet_number` if it's eligible to produce
    /// a fresh RTT sample (spec §4.3: must exceed the previous sample's
    /// packet number).
    pub fn take_rtt_sample_eligibility(&mut self, packet_number: u64) -> bool {
        let eligible = self.last_rtt_sample_pn.is_none_or(|prev| packet_number > prev);
        if eligible {
            self.last_rtt_sample_pn = Some(packet_number);
        }
        eligible
    }

    pub(crate) fn select_mode(&self, store: &Store, pns: PacketNumberSpace, handshake_done: bool, config: &Config) -> Mode {
        let any_hello = store
            .unacked(pns)
            .any(|id| store.packets().get(id).flags.contains(Flags::HELLO));

        if !handshake_done && any_hello {
            Mode::Handshake
        } else if self.loss_to.is_some() {
            Mode::Loss
        } else if self.tlp_count < config.max_tlps {
            Mode::Tlp
        } else {
            Mode::Rto
        }
    }

    pub(crate) fn delay(&self, mode: Mode, rtt: &RttEstimator, n_in_flight: u32, config: &Config) -> Duration {
        let has_sample = rtt.first_rtt_sample().is_some();
        let srtt = rtt.smoothed_rtt();

        let raw = match mode {
            Mode::Handshake => {
                let base = if has_sample {
                    (srtt + srtt / 2).max(Duration::from_millis(10))
                } else {
                    Duration::from_millis(150)
                };
                base * 2u32.saturating_pow(self.n_hsk.min(31))
            }
            Mode::Loss => self.loss_to.unwrap_or(config.default_retx_delay),
            Mode::Tlp => {
                if n_in_flight > 1 {
                    (srtt * 2).max(Duration::from_millis(10))
                } else {
                    (srtt * 2).max(srtt + srtt / 2 + config.min_rto)
                }
            }
            Mode::Rto => {
                let base = if has_sample {
                    (srtt + rtt.rttvar() * 4).max(config.min_rto)
                } else {
                    config.default_retx_delay
                };
                base * 2u32.saturating_pow(self.consec_rtos.min(config.max_rto_backoffs))
            }
        };

        raw.clamp(config.min_rto, config.max_rto)
    }
}

/// What a fired alarm produced, for the caller to notify collaborators with.
#[derive(Debug, Default)]
pub struct FireOutcome {
    pub mode: Option<Mode>,
    pub expired: Vec<PacketId>,
    pub loss: Option<loss::Outcome>,
    /// Set to `Some(2)` on an RTO fire (spec §4.5 "RTO-verification limit").
    pub rto_verification_limit: Option<u32>,
}

/// Handles one alarm fire for `pns`. The alarm must already be considered
/// un-set by the time this runs (spec: "the alarm is already un-set when the
/// callback runs").
#[allow(clippy::too_many_arguments)]
pub fn on_fire(
    state: &mut State,
    store: &mut Store,
    alarms: &mut dyn Alarmset,
    conn: &dyn ConnectionInterface,
    pns: PacketNumberSpace,
    now: Timestamp,
    largest_acked_packno: u64,
    largest_acked_sent_time: Timestamp,
    largest_sent: u64,
    rtt: &RttEstimator,
    cc: &mut dyn CongestionController,
    pacer: &mut dyn Pacer,
    cutback: &mut loss::CutbackTracker,
    ecn: &mut crate::ack::EcnTracker,
    config: &Config,
) -> FireOutcome {
    if !store.has_retransmittable_unacked(pns) {
        // Idempotent no-op (spec §7): nothing to expire.
        return FireOutcome::default();
    }

    let mode = state.select_mode(store, pns, conn.handshake_done(), config);
    let mut outcome = FireOutcome {
        mode: Some(mode),
        ..Default::default()
    };

    match mode {
        Mode::Handshake => {
            state.n_hsk += 1;
            let hellos: Vec<PacketId> = store
                .unacked(pns)
                .filter(|&id| {
                    let packet = store.packets().get(id);
                    packet.flags.contains(Flags::HELLO) && !packet.is_loss_record()
                })
                .collect();
            for id in hellos {
                store.declare_lost(pns, id);
                outcome.expired.push(id);
            }
        }
        Mode::Loss => {
            state.loss_to = None;
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
                state.loss_to = Some(loss_to);
            }
            if loss_outcome.disable_ecn {
                ecn.force_disable();
            }
            outcome.expired.extend_from_slice(&loss_outcome.lost);
            outcome.loss = Some(loss_outcome);
        }
        Mode::Tlp => {
            state.tlp_count += 1;
            let last = store
                .unacked(pns)
                .filter(|&id| {
                    let packet = store.packets().get(id);
                    packet.is_retransmittable() && !packet.is_loss_record()
                })
                .max_by_key(|&id| store.packets().get(id).packet_number);
            if let Some(id) = last {
                store.declare_lost(pns, id);
                outcome.expired.push(id);
            }
        }
        Mode::Rto => {
            state.last_rto = Some(now);
            state.consec_rtos += 1;
            outcome.rto_verification_limit = Some(2);

            let all: Vec<PacketId> = store.unacked(pns).collect();
            for id in all {
                let packet = store.packets().get(id);
                if packet.is_loss_record() {
                    continue;
                }
                if packet.is_retransmittable() {
                    store.declare_lost(pns, id);
                    outcome.expired.push(id);
                } else {
                    store.remove_unacked(pns, id);
                }
            }
            cc.timeout();
        }
    }

    if store.has_retransmittable_unacked(pns) {
        let n_in_flight = store.n_in_flight_all() as u32;
        let rearm_mode = state.select_mode(store, pns, conn.handshake_done(), config);
        let delay = state.delay(rearm_mode, rtt, n_in_flight, config);
        alarms.set(pns, now + delay);
    } else {
        alarms.unset(pns);
    }

    outcome
}

/// Arms the alarm for `pns` if it isn't already set, using the mode that
/// would currently be selected (spec §4.2 "arm the alarm" on first send).
pub fn arm_if_unset(
    state: &State,
    store: &Store,
    alarms: &mut dyn Alarmset,
    conn: &dyn ConnectionInterface,
    pns: PacketNumberSpace,
    now: Timestamp,
    rtt: &RttEstimator,
    config: &Config,
) {
    if alarms.is_set(pns) {
        return;
    }
    let n_in_flight = store.n_in_flight_all() as u32;
    let mode = state.select_mode(store, pns, conn.handshake_done(), config);
    let delay = state.delay(mode, rtt, n_in_flight, config);
    alarms.set(pns, now + delay);
}
