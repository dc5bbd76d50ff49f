//! Packet-number allocator (spec §4.1).
//!
//! Packet numbers are a single counter per controller — not per packet
//! number space. Grounded on the original's `sc_cur_packno`, a flat
//! `lsquic_packno_t` incremented by `send_ctl_next_packno` regardless of
//! which PNS the packet belongs to; `quic_core::packet::number::PacketNumber`
//! packs the PNS into the value and assumes per-space independence, so it
//! doesn't fit here (see DESIGN.md).

use crate::{config::NumberingStyle, packet::PacketNumber};

#[derive(Clone, Copy, Debug)]
pub struct Allocator {
    next: PacketNumber,
}

impl Allocator {
    pub fn new(style: NumberingStyle) -> Self {
        let next = match style {
            NumberingStyle::Ietf => 0,
            NumberingStyle::Legacy => 1,
        };
        Self { next }
    }

    /// Issues the next packet number. Never yields a duplicate absent a reset.
    #[inline]
    pub fn next(&mut self) -> PacketNumber {
        let issued = self.next;
        self.next += 1;
        issued
    }

    /// Largest number issued so far, or `None` if nothing has been issued.
    #[inline]
    pub fn largest_issued(&self) -> Option<PacketNumber> {
        if self.next == 0 {
            None
        } else {
            Some(self.next - 1)
        }
    }

    /// Resets the counter to one past the largest number the send-history has
    /// ever emitted. Callers must separately mark every scheduled packet
    /// `REPACKNO` so the reschedule/chooser path renumbers them in order.
    pub fn reset(&mut self, largest_ever_emitted: PacketNumber) {
        self.next = largest_ever_emitted + 1;
    }
}
