//! Packet descriptor flags (spec §3).
//!
//! Exactly one of `SCHEDULED`, `UNACKED`, `LOST` holds for a live packet; a
//! loss record holds `UNACKED | LOSS_RECORD`. The rest are independent bits.

use core::fmt;

macro_rules! flags {
    ($($(#[$doc:meta])* $name:ident = $bit:expr;)*) => {
        #[derive(Clone, Copy, Default, PartialEq, Eq)]
        pub struct Flags(u16);

        impl Flags {
            $(
                $(#[$doc])*
                pub const $name: Flags = Flags($bit);
            )*

            #[inline]
            pub fn contains(self, other: Flags) -> bool {
                self.0 & other.0 == other.0
            }

            #[inline]
            pub fn insert(&mut self, other: Flags) {
                self.0 |= other.0;
            }

            #[inline]
            pub fn remove(&mut self, other: Flags) {
                self.0 &= !other.0;
            }
        }

        impl core::ops::BitOr for Flags {
            type Output = Flags;

            #[inline]
            fn bitor(self, rhs: Flags) -> Flags {
                Flags(self.0 | rhs.0)
            }
        }

        impl fmt::Debug for Flags {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                let mut set = f.debug_set();
                $(
                    if self.contains(Flags::$name) {
                        set.entry(&stringify!($name));
                    }
                )*
                set.finish()
            }
        }
    };
}

flags! {
    /// Lives in the scheduled queue, awaiting the next write to the socket.
    SCHEDULED = 1 << 0;
    /// Lives in an unacked queue, awaiting an ACK or loss declaration.
    UNACKED = 1 << 1;
    /// Lives in the lost queue, awaiting reschedule.
    LOST = 1 << 2;
    /// A shadow entry in the unacked queue for a packet already declared lost.
    LOSS_RECORD = 1 << 3;
    /// The on-wire bytes have been encrypted.
    ENCRYPTED = 1 << 4;
    /// Carries handshake material; survives a plain RTO/loss expire during
    /// the handshake, and is the only thing a HANDSHAKE-mode alarm expires.
    HELLO = 1 << 5;
    /// Must be renumbered before it may be sent (after a squeeze/reset).
    REPACKNO = 1 << 6;
    /// Spent one RTO-verification token to be admitted.
    LIMITED = 1 << 7;
    /// Sent by a mini connection; never elidable.
    MINI = 1 << 8;
    /// Carries the stream's FIN.
    STREAM_END = 1 << 9;
    /// The sent size has been frozen and must not be recomputed.
    SENT_SZ = 1 << 10;
}
