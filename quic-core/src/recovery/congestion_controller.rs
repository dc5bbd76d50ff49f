// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::time::Timestamp;
use core::fmt::Debug;

/// The capability contract the send controller drives a congestion controller through.
///
/// The algorithm itself (Cubic, BBR, ...) is an external collaborator: this crate only
/// describes the narrow interface the controller calls into. `begin_ack`, `end_ack`, and
/// `was_quiet` are optional hooks a given algorithm may ignore.
pub trait CongestionController: Debug + Send {
    /// Resets the controller to its initial state for a freshly validated path
    fn init(&mut self, now: Timestamp);

    /// Returns the current congestion window, in bytes
    fn congestion_window(&self) -> u32;

    /// Invoked when a packet is sent and counts against the window
    fn sent(&mut self, sent_bytes: usize, bytes_in_flight: u32, app_limited: Option<bool>);

    /// Invoked when a packet is acknowledged
    fn ack(&mut self, sent_bytes: usize, now: Timestamp, app_limited: Option<bool>);

    /// Invoked when a packet is declared lost
    fn lost(&mut self, sent_bytes: usize);

    /// Invoked once per loss-detection pass that found at least one lost packet
    fn loss(&mut self);

    /// Invoked when the retransmission alarm fires in RTO mode
    fn timeout(&mut self);

    /// Invoked at the start of processing an ACK frame, before any `ack`/`lost` calls
    fn begin_ack(&mut self, _now: Timestamp, _bytes_in_flight: u32) {}

    /// Invoked after all packets in an ACK frame have been processed
    fn end_ack(&mut self, _bytes_in_flight: u32) {}

    /// Invoked when the connection has gone idle with nothing in flight
    fn was_quiet(&mut self, _now: Timestamp, _bytes_in_flight: u32) {}

    /// Returns `true` if another packet of `max_datagram_size` would exceed the window
    fn is_congestion_limited(&self, bytes_in_flight: u32, max_datagram_size: u16) -> bool {
        self.congestion_window()
            .saturating_sub(bytes_in_flight)
            .lt(&(max_datagram_size as u32))
    }

    /// The pacing rate, in bytes per second, to use while `in_recovery`
    fn pacing_rate(&self, in_recovery: bool) -> u64;

    /// Releases any resources held for the connection
    fn cleanup(&mut self) {}
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;

    /// An unlimited congestion controller useful for tests that don't exercise admission control
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Unlimited;

    impl CongestionController for Unlimited {
        fn init(&mut self, _now: Timestamp) {}

        fn congestion_window(&self) -> u32 {
            u32::MAX
        }

        fn sent(&mut self, _sent_bytes: usize, _bytes_in_flight: u32, _app_limited: Option<bool>) {}

        fn ack(&mut self, _sent_bytes: usize, _now: Timestamp, _app_limited: Option<bool>) {}

        fn lost(&mut self, _sent_bytes: usize) {}

        fn loss(&mut self) {}

        fn timeout(&mut self) {}

        fn pacing_rate(&self, _in_recovery: bool) -> u64 {
            u64::MAX
        }
    }

    /// A tracking mock that counts every callback invocation, for assertions in controller tests
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Mock {
        pub window: u32,
        pub on_sent: u32,
        pub on_ack: u32,
        pub on_lost: u32,
        pub on_loss: u32,
        pub on_timeout: u32,
    }

    impl Mock {
        pub fn new(window: u32) -> Self {
            Self {
                window,
                ..Default::default()
            }
        }
    }

    impl CongestionController for Mock {
        fn init(&mut self, _now: Timestamp) {}

        fn congestion_window(&self) -> u32 {
            self.window
        }

        fn sent(&mut self, _sent_bytes: usize, _bytes_in_flight: u32, _app_limited: Option<bool>) {
            self.on_sent += 1;
        }

        fn ack(&mut self, _sent_bytes: usize, _now: Timestamp, _app_limited: Option<bool>) {
            self.on_ack += 1;
        }

        fn lost(&mut self, _sent_bytes: usize) {
            self.on_lost += 1;
        }

        fn loss(&mut self) {
            self.on_loss += 1;
        }

        fn timeout(&mut self) {
            self.on_timeout += 1;
        }

        fn pacing_rate(&self, _in_recovery: bool) -> u64 {
            u64::MAX
        }
    }
}
