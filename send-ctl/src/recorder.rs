//! Send path: record a just-written packet (spec §4.2).

use crate::{
    alarm,
    collaborators::{Alarmset, ConnectionInterface},
    config::Config,
    packet::PacketId,
    store::Store,
};
use quic_core::{
    recovery::{CongestionController, RttEstimator},
    time::Timestamp,
};

/// Appends `id` (already moved to the head of the scheduled queue and
/// handed to the socket) to its PNS's unacked queue, arms the alarm if
/// needed, and notifies congestion control.
pub fn on_sent(
    state: &alarm::State,
    store: &mut Store,
    alarms: &mut dyn Alarmset,
    conn: &dyn ConnectionInterface,
    cc: &mut dyn CongestionController,
    id: PacketId,
    now: Timestamp,
    rtt: &RttEstimator,
    app_limited: Option<bool>,
    config: &Config,
) {
    let pns = store.packets().get(id).pns;
    let was_quiet = store.n_in_flight_retx() == 0;

    store.record_sent(id);

    let packet = store.packets().get(id);
    let sent_size = packet.sent_size;
    let retransmittable = packet.is_retransmittable();

    if was_quiet && retransmittable {
        cc.was_quiet(now, store.bytes_unacked_all() as u32);
    }

    if retransmittable {
        alarm::arm_if_unset(state, store, alarms, conn, pns, now, rtt, config);
    }

    cc.sent(sent_size, store.n_in_flight_all() as u32, app_limited);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collaborators::testing::{FakeAlarmset, FakeConnection},
        flags::Flags,
        packet::FrameTypeBits,
        pns::PacketNumberSpace,
        SentPacket,
    };
    use quic_core::{
        inet::ExplicitCongestionNotification,
        path,
        recovery::congestion_controller::testing::Mock,
        time::Duration,
    };

    #[test]
    fn first_retransmittable_send_arms_the_alarm() {
        let mut store = Store::new();
        let packet = SentPacket::new(
            0,
            PacketNumberSpace::ApplicationData,
            Flags::default(),
            FrameTypeBits::STREAM,
            unsafe { Timestamp::from_duration(Duration::from_secs(1)) },
            100,
            100,
            ExplicitCongestionNotification::NotECT,
            unsafe { path::Id::new(0) },
            None,
        );
        let id = store.schedule(packet);
        store.pop_scheduled_front();

        let state = alarm::State::default();
        let mut alarms = FakeAlarmset::default();
        let conn = FakeConnection {
            handshake_done: true,
            ..Default::default()
        };
        let mut cc = Mock::new(u32::MAX);
        let rtt = RttEstimator::new(Duration::from_millis(100));
        let config = Config::default();
        let now = unsafe { Timestamp::from_duration(Duration::from_secs(1)) };

        on_sent(
            &state, &mut store, &mut alarms, &conn, &mut cc, id, now, &rtt, None, &config,
        );

        assert!(alarms.is_set(PacketNumberSpace::ApplicationData));
        assert_eq!(cc.on_sent, 1);
    }
}
