// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    counter::{Counter, Saturating},
    recovery::RttEstimator,
    time::{Duration, Timestamp},
};
use core::ops::Div;

struct Fraction(u32, u32);

impl Div<Fraction> for Duration {
    type Output = Duration;

    fn div(self, rhs: Fraction) -> Self::Output {
        self * rhs.1 / rhs.0
    }
}

//= https://www.rfc-editor.org/rfc/rfc9002.txt#7.7
//# Using a value for "N" that is small, but at least 1 (for example, 1.25) ensures
//# that variations in RTT do not result in underutilization of the congestion window.
const N: Fraction = Fraction(5, 4); // 5/4 = 1.25

// In Slow Start the window grows rapidly, so there is a higher likelihood it is
// underutilized due to pacing; use a higher `N` while in slow start, as Linux does.
const SLOW_START_N: Fraction = Fraction(2, 1); // 2/1 = 2.00

const MAX_BURST_PACKETS: u16 = 10;

/// The capability contract the send controller drives a pacer through.
///
/// `n_out` is the number of packets currently scheduled but not yet written to the wire.
pub trait Pacer: core::fmt::Debug {
    /// Resets the pacer for a freshly validated path
    fn init(&mut self, now: Timestamp);

    /// Returns `true` if another packet may be scheduled without exceeding the pacing budget
    fn can_schedule(&self, n_out: u32) -> bool;

    /// Records that a packet has been scheduled
    fn packet_scheduled(&mut self, n_out: u32, in_recovery: bool, tx_time: Timestamp);

    /// Returns the amount of time the next send should be delayed by, if any
    fn delayed(&self) -> Option<Timestamp>;

    /// Returns the next scheduled departure time, if the pacer is holding one back
    fn next_sched(&self) -> Option<Timestamp>;

    /// Invoked when the loss detector finds at least one lost packet
    fn loss_event(&mut self);

    /// Releases any resources held for the connection
    fn cleanup(&mut self) {}
}

/// A packet pacer that returns departure times that evenly distribute bursts of packets over time
#[derive(Clone, Debug, Default)]
pub struct TokenBucketPacer {
    capacity: Counter<u32, Saturating>,
    next_packet_departure_time: Option<Timestamp>,
}

impl TokenBucketPacer {
    /// Called when each packet has been written
    #[inline]
    pub fn on_packet_sent(
        &mut self,
        now: Timestamp,
        bytes_sent: usize,
        rtt_estimator: &RttEstimator,
        congestion_window: u32,
        max_datagram_size: u16,
        slow_start: bool,
    ) {
        if self.capacity == 0 {
            if let Some(next_packet_departure_time) = self.next_packet_departure_time {
                let interval = Self::interval(
                    rtt_estimator,
                    congestion_window,
                    max_datagram_size,
                    slow_start,
                );
                self.next_packet_departure_time =
                    Some((next_packet_departure_time + interval).max(now));
            } else {
                self.next_packet_departure_time = Some(now);
            }
            self.capacity = Counter::new((MAX_BURST_PACKETS * max_datagram_size) as u32);
        }

        self.capacity -= bytes_sent as u32;
    }

    /// Returns the earliest time that a packet may be transmitted.
    ///
    /// If the time is in the past or is `None`, the packet should be transmitted immediately.
    pub fn earliest_departure_time(&self) -> Option<Timestamp> {
        self.next_packet_departure_time
    }

    #[inline]
    fn interval(
        rtt_estimator: &RttEstimator,
        congestion_window: u32,
        max_datagram_size: u16,
        slow_start: bool,
    ) -> Duration {
        debug_assert_ne!(congestion_window, 0);

        let n = if slow_start { SLOW_START_N } else { N };
        let packet_size = (MAX_BURST_PACKETS * max_datagram_size) as u32;

        //= https://www.rfc-editor.org/rfc/rfc9002.txt#7.7
        //# rate = N * congestion_window / smoothed_rtt
        //# interval = ( smoothed_rtt * packet_size / congestion_window ) / N
        (rtt_estimator.smoothed_rtt() * packet_size / congestion_window) / n
    }
}
