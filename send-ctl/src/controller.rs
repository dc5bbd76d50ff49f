//! The top-level controller: owns every piece of per-connection state this
//! crate defines and exposes the operations a connection driver calls into.
//!
//! Collaborators that live outside this crate (congestion control, pacing,
//! RTT estimation, the alarm dispatcher, the connection, the stream table,
//! the attention queue) are passed in by reference on each call rather than
//! stored here, mirroring how `quic_core::recovery::CongestionController`
//! and `Pacer` are driven from the connection's own task loop.

use crate::{
    ack,
    admission,
    alarm,
    allocator::Allocator,
    buffered,
    chooser,
    collaborators::{Alarmset, AttentionQueue, ConnectionInterface, SendHistory, StreamTable},
    config::Config,
    error::Result,
    loss,
    mutators,
    packet::{PacketId, SentPacket},
    pns::{PacketNumberSpace, PerPns},
    recorder,
    reschedule,
    store::Store,
};
use quic_core::{
    inet::ExplicitCongestionNotification,
    path,
    recovery::{CongestionController, Pacer, RttEstimator},
    time::{Duration, Timestamp},
};

/// Everything the controller needs to remember per packet-number space.
#[derive(Clone, Copy, Debug, Default)]
struct PnsState {
    alarm: alarm::State,
    cutback: loss::CutbackTracker,
    ecn: ack::EcnTracker,
}

#[derive(Debug)]
pub struct Controller {
    allocator: Allocator,
    store: Store,
    pns_state: PerPns<PnsState>,
    rto: admission::RtoVerification,
    bucket_cache: buffered::BucketCache,
    retry_state: mutators::RetryState,
    config: Config,
}

impl Controller {
    pub fn new(config: Config) -> Self {
        Self {
            allocator: Allocator::new(config.numbering_style),
            store: Store::new(),
            pns_state: PerPns::default(),
            rto: admission::RtoVerification::default(),
            bucket_cache: buffered::BucketCache::default(),
            retry_state: mutators::RetryState::default(),
            config,
        }
    }

    #[inline]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[inline]
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Allocates the next packet number and enqueues `packet` on the
    /// scheduled queue (spec §4.1, the send-through path before §4.2).
    pub fn schedule(&mut self, mut packet: SentPacket) -> PacketId {
        packet.packet_number = self.allocator.next();
        self.store.schedule(packet)
    }

    /// Records that `id` has just been handed to the socket (spec §4.2).
    pub fn on_sent(
        &mut self,
        alarms: &mut dyn Alarmset,
        conn: &dyn ConnectionInterface,
        cc: &mut dyn CongestionController,
        id: PacketId,
        now: Timestamp,
        rtt: &RttEstimator,
        app_limited: Option<bool>,
    ) {
        let pns = self.store.packets().get(id).pns;
        recorder::on_sent(
            &self.pns_state.get(pns).alarm,
            &mut self.store,
            alarms,
            conn,
            cc,
            id,
            now,
            rtt,
            app_limited,
            &self.config,
        );
    }

    /// Processes one ACK frame (spec §4.3).
    #[allow(clippy::too_many_arguments)]
    pub fn on_ack(
        &mut self,
        frame: &ack::AckFrame,
        now: Timestamp,
        alarms: &mut dyn Alarmset,
        conn: &dyn ConnectionInterface,
        rtt: &mut RttEstimator,
        cc: &mut dyn CongestionController,
        pacer: &mut dyn Pacer,
    ) -> Result<ack::AckOutcome> {
        let pns = frame.pns;
        let largest_sent = self.allocator.largest_issued().unwrap_or(0);
        let state = self.pns_state.get_mut(pns);
        ack::process(
            frame,
            now,
            largest_sent,
            &mut self.store,
            alarms,
            conn,
            &mut state.alarm,
            rtt,
            cc,
            pacer,
            &mut state.cutback,
            &mut state.ecn,
            &self.config,
        )
    }

    /// Handles a retransmission alarm fire for `pns` (spec §4.5).
    #[allow(clippy::too_many_arguments)]
    pub fn on_alarm_fire(
        &mut self,
        pns: PacketNumberSpace,
        alarms: &mut dyn Alarmset,
        conn: &dyn ConnectionInterface,
        now: Timestamp,
        largest_acked_packno: u64,
        largest_acked_sent_time: Timestamp,
        rtt: &RttEstimator,
        cc: &mut dyn CongestionController,
        pacer: &mut dyn Pacer,
    ) -> alarm::FireOutcome {
        let largest_sent = self.allocator.largest_issued().unwrap_or(0);
        let state = self.pns_state.get_mut(pns);
        let outcome = alarm::on_fire(
            &mut state.alarm,
            &mut self.store,
            alarms,
            conn,
            pns,
            now,
            largest_acked_packno,
            largest_acked_sent_time,
            largest_sent,
            rtt,
            cc,
            pacer,
            &mut state.cutback,
            &mut state.ecn,
            &self.config,
        );
        if let Some(alarm::Mode::Rto) = outcome.mode {
            self.rto.arm(self.config.max_resubmitted_on_rto);
        }
        outcome
    }

    /// Drains the lost queue into the scheduled queue (spec §4.6).
    pub fn reschedule(
        &mut self,
        cc: &dyn CongestionController,
        current_ecn: ExplicitCongestionNotification,
    ) -> alloc::vec::Vec<PacketId> {
        let allocator = &mut self.allocator;
        let can_admit = |store: &Store| admission::could_send(store, cc);
        reschedule::run(&mut self.store, allocator, can_admit, current_ecn)
    }

    /// Reports whether another packet may be sent right now (spec §4.7).
    /// Registers a wake-up on `attq` if the pacer is the reason for refusal.
    pub fn can_send(
        &self,
        cc: &dyn CongestionController,
        pacer: &dyn Pacer,
        pacing_enabled: bool,
        attq: &mut dyn AttentionQueue,
    ) -> bool {
        admission::can_send(&self.store, cc, pacer, pacing_enabled, attq)
    }

    /// Adds a freshly built, not-yet-numbered packet to the buffered-priority
    /// staging area (spec §4.8).
    pub fn add_buffered(
        &mut self,
        stream_id: u64,
        priority: u8,
        packet: SentPacket,
        conn: &dyn ConnectionInterface,
        streams: &dyn StreamTable,
    ) -> PacketId {
        let bucket = self.bucket_cache.classify(stream_id, priority, streams);
        buffered::add_to_bucket(&mut self.store, bucket, packet, conn)
    }

    /// Promotes as many buffered packets as admission permits (spec §4.8).
    pub fn schedule_buffered(&mut self, cc: &dyn CongestionController, largest_acked: Option<u64>) -> alloc::vec::Vec<PacketId> {
        let allocator = &mut self.allocator;
        let can_admit = |store: &Store| admission::could_send(store, cc);
        buffered::schedule_buffered(&mut self.store, allocator, can_admit, largest_acked)
    }

    /// Picks the next packet to send off the scheduled queue (spec §4.9).
    pub fn choose_next(
        &mut self,
        now: Timestamp,
        pns: PacketNumberSpace,
        rtt: &RttEstimator,
        remaining_datagram_budget: Option<usize>,
    ) -> chooser::Choice {
        let state = self.pns_state.get(pns).alarm;
        let n_in_flight = self.store.n_in_flight_all() as u32;
        let rto_interval = state.delay(alarm::Mode::Rto, rtt, n_in_flight, &self.config);
        chooser::choose(
            &mut self.store,
            &mut self.allocator,
            &mut self.rto,
            state.consec_rtos(),
            state.last_rto(),
            now,
            rto_interval,
            remaining_datagram_budget,
        )
    }

    /// Re-inserts a packet that could not be written after all (spec §4.9
    /// "Delayed one").
    pub fn delay_one(&mut self, id: PacketId) {
        chooser::delay_one(&mut self.store, &mut self.rto, id);
    }

    /// Removes every frame belonging to `stream_id` from the scheduled and
    /// buffered queues (spec §4.10 "Elide stream frames").
    pub fn elide_stream_frames(&mut self, history: &mut dyn SendHistory, stream_id: u64) {
        mutators::elide_stream_frames(&mut self.store, &mut self.allocator, history, stream_id);
    }

    /// Drops regenerable-only scheduled packets; returns whether anything
    /// non-regenerable remains (spec §4.10 "Squeeze scheduled").
    pub fn squeeze_sched(&mut self, history: &mut dyn SendHistory) -> bool {
        mutators::squeeze_sched(&mut self.store, &mut self.allocator, history)
    }

    /// Destroys every non-HELLO scheduled packet (spec §4.10 "Drop scheduled").
    pub fn drop_scheduled(&mut self, history: &mut dyn SendHistory) {
        mutators::drop_scheduled(&mut self.store, history);
    }

    /// Destroys every packet in `pns` and clears its alarm (spec §4.10
    /// "Empty PNS").
    pub fn empty_pns(&mut self, alarms: &mut dyn Alarmset, pns: PacketNumberSpace) {
        mutators::empty_pns(&mut self.store, alarms, pns);
        self.pns_state.get_mut(pns).alarm = alarm::State::default();
    }

    /// Repoints every packet on `old` to `new` (spec §4.10 "Repath").
    pub fn repath(&mut self, old: path::Id, new: path::Id) {
        mutators::repath(&mut self.store, old, new);
    }

    /// Handles a received Retry (spec §4.10 "Retry").
    pub fn retry(&mut self, token_len: usize, max_initial_size: usize) -> Result<()> {
        mutators::retry(&mut self.store, &mut self.retry_state, token_len, max_initial_size, &self.config)
    }

    /// Marks a stream's FIN on the first packet that can still carry it
    /// (spec §4.10 "Turn on FIN").
    pub fn turn_on_fin(&mut self, stream_id: u64) -> bool {
        mutators::turn_on_fin(&mut self.store, stream_id)
    }

    /// Resets the allocator after a renumbering event and marks every
    /// scheduled packet for renumbering (spec §4.1 "Reset").
    pub fn reset_numbering(&mut self, largest_ever_emitted: u64) {
        self.allocator.reset(largest_ever_emitted);
        for id in self.store.scheduled_ids() {
            self.store.packets_mut().get_mut(id).flags.insert(crate::flags::Flags::REPACKNO);
        }
    }
}
