//! End-to-end scenarios driven entirely through `Controller`'s public API,
//! one per literal walkthrough.

use quic_core::{
    inet::ExplicitCongestionNotification,
    path,
    recovery::{congestion_controller::testing::Mock, Pacer, RttEstimator},
    time::{Duration, Timestamp},
};
use send_ctl::{
    ack::AckFrame,
    alarm,
    collaborators::{
        testing::{FakeAlarmset, FakeConnection},
        Alarmset,
    },
    config::NumberingStyle,
    error::SendControlError,
    flags::Flags,
    packet::FrameTypeBits,
    Config, Controller, PacketNumberSpace, SentPacket,
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

fn stream_packet(pns: PacketNumberSpace, sent_time: Timestamp) -> SentPacket {
    SentPacket::new(
        0,
        pns,
        Flags::default(),
        FrameTypeBits::STREAM,
        sent_time,
        100,
        100,
        ExplicitCongestionNotification::NotECT,
        unsafe { path::Id::new(0) },
        None,
    )
}

/// Schedules `packet` through `controller` and immediately records it as sent,
/// returning its handle.
fn send(
    controller: &mut Controller,
    packet: SentPacket,
    alarms: &mut FakeAlarmset,
    conn: &FakeConnection,
    cc: &mut Mock,
    now: Timestamp,
    rtt: &RttEstimator,
) -> send_ctl::PacketId {
    let id = controller.schedule(packet);
    controller.store_mut().pop_scheduled_front();
    controller.on_sent(alarms, conn, cc, id, now, rtt, None);
    id
}

/// 1. Simple ack: five packets numbered 0..4, a single ACK covering all of
/// them arrives with a 5ms ack_delay atop a 100ms round trip.
#[test]
fn simple_ack() {
    let mut controller = Controller::new(Config::default());
    let pns = PacketNumberSpace::ApplicationData;
    let mut alarms = FakeAlarmset::default();
    let conn = FakeConnection {
        handshake_done: true,
        ..Default::default()
    };
    let mut cc = Mock::new(u32::MAX);
    let rtt_probe = RttEstimator::new(Duration::from_millis(100));
    let sent_time = at(0) + Duration::from_millis(100);

    for _ in 0..5 {
        send(
            &mut controller,
            stream_packet(pns, sent_time),
            &mut alarms,
            &conn,
            &mut cc,
            sent_time,
            &rtt_probe,
        );
    }
    assert!(alarms.is_set(pns));

    let frame = AckFrame {
        pns,
        ranges: vec![0..=4],
        ack_delay: Duration::from_millis(5),
        ecn: None,
    };
    let mut rtt = RttEstimator::new(Duration::from_millis(100));
    let mut pacer = NoopPacer;
    let now = at(0) + Duration::from_millis(200);

    let outcome = controller
        .on_ack(&frame, now, &mut alarms, &conn, &mut rtt, &mut cc, &mut pacer)
        .expect("ack within the sent range is valid");

    assert_eq!(outcome.acked.len(), 5);
    assert!(outcome.rtt_sample_delivered);
    assert!(controller.store().unacked_is_empty(pns));
    assert!(!alarms.is_set(pns));
}

/// 2. FACK loss: ten packets numbered 1..10 (legacy numbering), a single ACK
/// for packet 5 triggers the reordering threshold for packets far enough
/// behind it.
#[test]
fn fack_loss() {
    let config = Config {
        numbering_style: NumberingStyle::Legacy,
        ..Config::default()
    };
    let mut controller = Controller::new(config);
    let pns = PacketNumberSpace::ApplicationData;
    let mut alarms = FakeAlarmset::default();
    let conn = FakeConnection {
        handshake_done: true,
        ..Default::default()
    };
    let mut cc = Mock::new(u32::MAX);
    let rtt_probe = RttEstimator::new(Duration::from_millis(100));
    let sent_time = at(1);

    for _ in 1..=10 {
        send(
            &mut controller,
            stream_packet(pns, sent_time),
            &mut alarms,
            &conn,
            &mut cc,
            sent_time,
            &rtt_probe,
        );
    }

    let frame = AckFrame {
        pns,
        ranges: vec![5..=5],
        ack_delay: Duration::ZERO,
        ecn: None,
    };
    let mut rtt = RttEstimator::new(Duration::from_millis(100));
    let mut pacer = NoopPacer;

    let outcome = controller
        .on_ack(&frame, at(1), &mut alarms, &conn, &mut rtt, &mut cc, &mut pacer)
        .unwrap();

    let loss = outcome.loss.expect("an ack always runs a loss pass");
    let lost_numbers: Vec<u64> = loss
        .lost
        .iter()
        .map(|&id| controller.store().packets().get(id).packet_number)
        .collect();
    // Packets 1 and 2 sit 3+ packet numbers behind packet 5; 3 and 4 don't.
    assert!(lost_numbers.contains(&1));
    assert!(lost_numbers.contains(&2));
    assert!(!lost_numbers.contains(&3));
    assert!(!lost_numbers.contains(&4));
    assert!(!outcome.acked.is_empty());
}

/// 3. Early retransmit: packets 1..3 (legacy numbering), only packet 3 acked.
/// The largest remaining retransmittable number (2) is itself at-or-behind
/// what's acked, so early retransmit declares 1 and 2 lost and schedules a
/// LOSS-mode alarm a quarter-RTT out.
#[test]
fn early_retransmit() {
    let config = Config {
        numbering_style: NumberingStyle::Legacy,
        ..Config::default()
    };
    let mut controller = Controller::new(config);
    let pns = PacketNumberSpace::ApplicationData;
    let mut alarms = FakeAlarmset::default();
    let conn = FakeConnection {
        handshake_done: true,
        ..Default::default()
    };
    let mut cc = Mock::new(u32::MAX);
    let rtt_probe = RttEstimator::new(Duration::from_millis(100));
    let sent_time = at(1);

    for _ in 1..=3 {
        send(
            &mut controller,
            stream_packet(pns, sent_time),
            &mut alarms,
            &conn,
            &mut cc,
            sent_time,
            &rtt_probe,
        );
    }

    let frame = AckFrame {
        pns,
        ranges: vec![3..=3],
        ack_delay: Duration::ZERO,
        ecn: None,
    };
    let mut rtt = RttEstimator::new(Duration::from_millis(100));
    let mut pacer = NoopPacer;

    let outcome = controller
        .on_ack(&frame, at(1), &mut alarms, &conn, &mut rtt, &mut cc, &mut pacer)
        .unwrap();

    let loss = outcome.loss.unwrap();
    assert!(loss.loss_to.is_some(), "early retransmit sets a quarter-RTT loss_to");
    let lost_numbers: Vec<u64> = loss
        .lost
        .iter()
        .map(|&id| controller.store().packets().get(id).packet_number)
        .collect();
    assert_eq!(lost_numbers.len(), 2);
    assert!(lost_numbers.contains(&1));
    assert!(lost_numbers.contains(&2));
}

/// 4. RTO cycle: five unacknowledged packets, no ACKs at all. The alarm fires
/// three times: two TLP probes (each expiring the highest-numbered packet
/// still live), then escalation to RTO (`max_tlps` is 2 by default), which
/// expires everything still live and opens a two-packet RTO-verification
/// window.
#[test]
fn rto_cycle() {
    let mut controller = Controller::new(Config::default());
    let pns = PacketNumberSpace::ApplicationData;
    let mut alarms = FakeAlarmset::default();
    let conn = FakeConnection {
        handshake_done: true,
        ..Default::default()
    };
    let mut cc = Mock::new(u32::MAX);
    let rtt = RttEstimator::new(Duration::from_millis(100));
    let sent_time = at(1);

    for _ in 0..5 {
        send(
            &mut controller,
            stream_packet(pns, sent_time),
            &mut alarms,
            &conn,
            &mut cc,
            sent_time,
            &rtt,
        );
    }

    let mut pacer = NoopPacer;
    let now = at(2);

    let first = controller.on_alarm_fire(pns, &mut alarms, &conn, now, 0, now, &rtt, &mut cc, &mut pacer);
    assert_eq!(first.mode, Some(alarm::Mode::Tlp));

    let second = controller.on_alarm_fire(pns, &mut alarms, &conn, now, 0, now, &rtt, &mut cc, &mut pacer);
    assert_eq!(second.mode, Some(alarm::Mode::Tlp));

    let third = controller.on_alarm_fire(pns, &mut alarms, &conn, now, 0, now, &rtt, &mut cc, &mut pacer);
    assert_eq!(third.mode, Some(alarm::Mode::Rto));
    assert_eq!(third.rto_verification_limit, Some(2));

    let rescheduled = controller.reschedule(&cc, ExplicitCongestionNotification::NotECT);
    assert!(rescheduled.len() >= 3, "enough lost packets survive to exercise the verification window");

    let send1 = controller.choose_next(now, pns, &rtt, None);
    assert!(matches!(send1, send_ctl::chooser::Choice::Send(_)));
    let send2 = controller.choose_next(now, pns, &rtt, None);
    assert!(matches!(send2, send_ctl::chooser::Choice::Send(_)));
    let send3 = controller.choose_next(now, pns, &rtt, None);
    assert_eq!(send3, send_ctl::chooser::Choice::None, "the two-packet verification window is spent");
}

/// 5. Retry with token growth: a padded Initial packet is still unacked when
/// a Retry carrying a 150-byte token arrives. Growing every lost Initial's
/// accounted size by the token length pushes this one over the 1200-byte
/// budget, which is reported rather than silently truncated.
#[test]
fn retry_token_growth_exceeds_budget() {
    let mut controller = Controller::new(Config::default());
    let pns = PacketNumberSpace::Initial;
    let mut alarms = FakeAlarmset::default();
    let conn = FakeConnection {
        handshake_done: false,
        ..Default::default()
    };
    let mut cc = Mock::new(u32::MAX);
    let rtt = RttEstimator::new(Duration::from_millis(100));
    let sent_time = at(0);

    let mut hello = stream_packet(pns, sent_time);
    hello.frame_types = FrameTypeBits::CRYPTO;
    hello.flags.insert(Flags::HELLO);
    hello.sent_size = 1200;
    hello.total_size = 1200;
    send(&mut controller, hello, &mut alarms, &conn, &mut cc, sent_time, &rtt);

    let result = controller.retry(150, 1200);
    assert_eq!(result, Err(SendControlError::TokenTooLong));
}

/// 6. Repath: packets in every queue move from path A to path B; previously
/// encrypted packets lose that flag since they must be re-encrypted for the
/// new path's keys, and no packet number changes.
#[test]
fn repath_moves_every_queue() {
    let mut controller = Controller::new(Config::default());
    let pns = PacketNumberSpace::ApplicationData;
    let path_a = unsafe { path::Id::new(0) };
    let path_b = unsafe { path::Id::new(1) };

    let mut scheduled = stream_packet(pns, at(0));
    scheduled.path = path_a;
    let scheduled_id = controller.schedule(scheduled);

    let mut unacked = stream_packet(pns, at(0));
    unacked.path = path_a;
    unacked.flags.insert(Flags::ENCRYPTED);
    let unacked_id = controller.store_mut().schedule(unacked);
    controller.store_mut().pop_scheduled_front();
    controller.store_mut().record_sent(unacked_id);

    let mut lost = stream_packet(pns, at(0));
    lost.path = path_a;
    let lost_id = controller.store_mut().schedule(lost);
    controller.store_mut().pop_scheduled_front();
    controller.store_mut().record_sent(lost_id);
    controller.store_mut().declare_lost(pns, lost_id);

    let scheduled_number = controller.store().packets().get(scheduled_id).packet_number;
    let unacked_number = controller.store().packets().get(unacked_id).packet_number;
    let lost_number = controller.store().packets().get(lost_id).packet_number;

    controller.repath(path_a, path_b);

    for id in controller.store().all_ids() {
        assert_eq!(controller.store().packets().get(id).path, path_b);
    }
    assert!(!controller.store().packets().get(unacked_id).flags.contains(Flags::ENCRYPTED));
    assert_eq!(controller.store().packets().get(scheduled_id).packet_number, scheduled_number);
    assert_eq!(controller.store().packets().get(unacked_id).packet_number, unacked_number);
    assert_eq!(controller.store().packets().get(lost_id).packet_number, lost_number);
}
