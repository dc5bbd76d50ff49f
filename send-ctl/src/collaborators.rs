//! Capability interfaces for the collaborators that aren't already modeled by
//! `quic_core::recovery` (spec §6). Kept narrow and local so the controller
//! can be driven from tests with in-memory fakes instead of a real
//! connection/endpoint — mirrors how `quic_core::recovery::CongestionController`
//! and `Pacer` are defined as trait contracts rather than concrete types.

use crate::pns::PacketNumberSpace;
use quic_core::time::Timestamp;

/// Per-PNS retransmission alarm dispatch (spec §6 "Alarmset").
///
/// Three ids are reserved, one per packet number space; a real
/// implementation multiplexes them onto a single timer wheel.
pub trait Alarmset {
    fn set(&mut self, pns: PacketNumberSpace, expiry: Timestamp);
    fn unset(&mut self, pns: PacketNumberSpace);
    fn is_set(&self, pns: PacketNumberSpace) -> bool;
    fn expiry(&self, pns: PacketNumberSpace) -> Option<Timestamp>;
}

/// Tracks the highest packet number ever handed to the socket, independent
/// of whether its descriptor is still live (spec §6 "Send history").
pub trait SendHistory {
    fn add(&mut self, packet_number: u64);
    fn largest(&self) -> Option<u64>;

    /// Suppresses the gap-in-sequence warning the next time a number below
    /// `largest()` is observed (set by `drop_scheduled`, spec §4.10).
    fn allow_gap(&mut self);
}

/// The subset of connection state the controller needs to read or request
/// (spec §6 "Connection interface").
pub trait ConnectionInterface {
    fn is_server(&self) -> bool;
    fn is_ietf(&self) -> bool;
    fn handshake_done(&self) -> bool;

    /// Whether the connection can synthesize an ACK frame right now, absent
    /// one already pending (spec §4.8 "ACK placement").
    fn can_write_ack(&self) -> bool;
}

/// One entry of the stream table the buffered-priority scheduler and the
/// mutators iterate over (spec §6 "Stream table").
pub struct StreamSummary {
    pub id: u64,
    pub priority: u8,
    pub write_done: bool,
    pub critical: bool,
}

pub trait StreamTable {
    type Iter<'a>: Iterator<Item = StreamSummary>
    where
        Self: 'a;

    fn streams(&self) -> Self::Iter<'_>;
}

/// Registers a future wake-up with the connection's engine loop when the
/// pacer is holding a packet back (spec §6 "Engine add-to-attq").
pub trait AttentionQueue {
    fn wake_at(&mut self, time: Timestamp);
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;
    use crate::pns::PerPns;
    use alloc::vec::Vec;

    #[derive(Clone, Copy, Debug, Default)]
    pub struct FakeAlarmset {
        expiry: PerPns<Option<Timestamp>>,
    }

    impl Alarmset for FakeAlarmset {
        fn set(&mut self, pns: PacketNumberSpace, expiry: Timestamp) {
            *self.expiry.get_mut(pns) = Some(expiry);
        }

        fn unset(&mut self, pns: PacketNumberSpace) {
            *self.expiry.get_mut(pns) = None;
        }

        fn is_set(&self, pns: PacketNumberSpace) -> bool {
            self.expiry.get(pns).is_some()
        }

        fn expiry(&self, pns: PacketNumberSpace) -> Option<Timestamp> {
            *self.expiry.get(pns)
        }
    }

    #[derive(Clone, Debug, Default)]
    pub struct FakeSendHistory {
        largest: Option<u64>,
        gap_ok: bool,
    }

    impl SendHistory for FakeSendHistory {
        fn add(&mut self, packet_number: u64) {
            self.largest = Some(self.largest.map_or(packet_number, |l| l.max(packet_number)));
        }

        fn largest(&self) -> Option<u64> {
            self.largest
        }

        fn allow_gap(&mut self) {
            self.gap_ok = true;
        }
    }

    #[derive(Clone, Copy, Debug)]
    pub struct FakeConnection {
        pub server: bool,
        pub ietf: bool,
        pub handshake_done: bool,
        pub can_write_ack: bool,
    }

    impl Default for FakeConnection {
        fn default() -> Self {
            Self {
                server: false,
                ietf: true,
                handshake_done: false,
                can_write_ack: false,
            }
        }
    }

    impl ConnectionInterface for FakeConnection {
        fn is_server(&self) -> bool {
            self.server
        }

        fn is_ietf(&self) -> bool {
            self.ietf
        }

        fn handshake_done(&self) -> bool {
            self.handshake_done
        }

        fn can_write_ack(&self) -> bool {
            self.can_write_ack
        }
    }

    #[derive(Clone, Debug, Default)]
    pub struct FakeStreamTable {
        pub streams: Vec<StreamSummary>,
    }

    impl StreamTable for FakeStreamTable {
        type Iter<'a> = alloc::vec::IntoIter<StreamSummary> where Self: 'a;

        fn streams(&self) -> Self::Iter<'_> {
            self.streams
                .iter()
                .map(|s| StreamSummary {
                    id: s.id,
                    priority: s.priority,
                    write_done: s.write_done,
                    critical: s.critical,
                })
                .collect::<Vec<_>>()
                .into_iter()
        }
    }

    #[derive(Clone, Copy, Debug, Default)]
    pub struct FakeAttentionQueue {
        pub woken_at: Option<Timestamp>,
    }

    impl AttentionQueue for FakeAttentionQueue {
        fn wake_at(&mut self, time: Timestamp) {
            self.woken_at = Some(time);
        }
    }
}
