//! Admission gate (spec §4.7): may another packet be sent right now.

use crate::{collaborators::AttentionQueue, store::Store};
use quic_core::recovery::{CongestionController, Pacer};

/// RTO-verification state the chooser consults on top of the plain gate
/// (spec §4.9 "n_consec_rtos ... still in force").
#[derive(Clone, Copy, Debug, Default)]
pub struct RtoVerification {
    pub tokens_remaining: u32,
}

impl RtoVerification {
    pub fn arm(&mut self, limit: u32) {
        self.tokens_remaining = limit;
    }

    pub fn take(&mut self) -> bool {
        if self.tokens_remaining > 0 {
            self.tokens_remaining -= 1;
            true
        } else {
            false
        }
    }

    pub fn restore(&mut self) {
        self.tokens_remaining += 1;
    }

    pub fn in_force(&self) -> bool {
        self.tokens_remaining > 0
    }
}

/// Pure congestion-window test, no pacer, no side effects (spec §4.7 "could
/// send" predicate used for app-limited flagging).
#[inline]
pub fn could_send(store: &Store, cc: &dyn CongestionController) -> bool {
    store.bytes_scheduled() + store.bytes_unacked_all() < cc.congestion_window() as usize
}

/// Full admission test, with pacer side effects. When the pacer is holding
/// back, registers a wake-up with `attq` for the pacer's next-send time
/// (spec §4.7 "add-to-attq") so the connection's engine loop is re-driven
/// instead of polling.
pub fn can_send(
    store: &Store,
    cc: &dyn CongestionController,
    pacer: &dyn Pacer,
    pacing_enabled: bool,
    attq: &mut dyn AttentionQueue,
) -> bool {
    if !could_send(store, cc) {
        return false;
    }
    if !pacing_enabled {
        return true;
    }
    let n_out = (store.n_in_flight_all() + store.scheduled_ids().len()) as u32;
    if pacer.can_schedule(n_out) {
        return true;
    }
    if let Some(wake) = pacer.next_sched().or_else(|| pacer.delayed()) {
        attq.wake_at(wake);
    }
    false
}
