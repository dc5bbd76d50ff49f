// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//= https://www.rfc-editor.org/rfc/rfc9000#section-12.3
//# The packet number is an integer in the range 0 to 2^62-1. This
//# number is used in determining the cryptographic nonce for packet
//# protection. Each endpoint maintains a separate packet number for
//# sending and receiving.

mod packet_number;
pub use packet_number::PacketNumber;

//= https://www.rfc-editor.org/rfc/rfc9000#section-12.3
//# *  Initial space: All Initial packets are in this space.
//# *  Handshake space: All Handshake packets are in this space.
//# *  Application data space: All 0-RTT and 1-RTT encrypted packets
//#    are in this space.

mod packet_number_space;
pub use packet_number_space::PacketNumberSpace;

/// The packet number len is the two least significant bits of the packet tag
pub(crate) const PACKET_NUMBER_LEN_MASK: u8 = 0b11;

mod packet_number_len;
pub use packet_number_len::{derive_truncation_range, PacketNumberLen};

mod packet_number_range;
pub use packet_number_range::PacketNumberRange;

#[cfg(feature = "alloc")]
pub mod map;
#[cfg(feature = "alloc")]
pub use map::Map;
