// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{packet::number::packet_number_space::PacketNumberSpace, varint::VarInt};

/// The width, in bytes, a packet number would need to be encoded in on the
/// wire given the distance from the largest packet number the peer has
/// acknowledged.
///
/// The framer is responsible for the actual encoding; the send controller
/// only needs to reason about how many bytes a given width costs, since a
/// buffered packet can outgrow the width it was optimistically given before
/// it is promoted to the scheduled queue (see the buffered-priority
/// scheduler).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketNumberLen {
    pub(crate) space: PacketNumberSpace,
    pub(crate) value: PacketNumberLenValue,
}

impl PacketNumberLen {
    pub const MAX_LEN: usize = U32_SIZE;

    /// Returns the widest supported encoding for the given `PacketNumberSpace`
    pub const fn max(space: PacketNumberSpace) -> Self {
        Self {
            value: PacketNumberLenValue::U32,
            space,
        }
    }

    #[inline]
    pub const fn space(self) -> PacketNumberSpace {
        self.space
    }

    /// Returns the bytesize required for encoding the given `PacketNumberLen`
    #[inline]
    pub fn bytesize(self) -> usize {
        self.value.bytesize()
    }

    /// Returns the bitsize required for encoding the given `PacketNumberLen`
    #[inline]
    pub fn bitsize(self) -> usize {
        self.value.bitsize()
    }

    #[inline]
    pub(crate) fn from_varint(value: VarInt, space: PacketNumberSpace) -> Option<Self> {
        Some(Self {
            value: PacketNumberLenValue::from_varint(value)?,
            space,
        })
    }
}

const U8_SIZE: usize = 1;
const U16_SIZE: usize = 16 / 8;
const U24_SIZE: usize = 24 / 8;
const U32_SIZE: usize = 32 / 8;

const U8_MAX: u64 = (1 << 8) - 1;
const U16_MAX: u64 = (1 << 16) - 1;
const U24_MAX: u64 = (1 << 24) - 1;
const U32_MAX: u64 = (1 << 32) - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum PacketNumberLenValue {
    U8,
    U16,
    U24,
    U32,
}

impl PacketNumberLenValue {
    #[inline]
    pub fn bytesize(self) -> usize {
        match self {
            Self::U8 => U8_SIZE,
            Self::U16 => U16_SIZE,
            Self::U24 => U24_SIZE,
            Self::U32 => U32_SIZE,
        }
    }

    #[inline]
    pub fn bitsize(self) -> usize {
        self.bytesize() * 8
    }

    #[inline]
    pub fn from_varint(value: VarInt) -> Option<Self> {
        #[allow(clippy::match_overlapping_arm)]
        match *value {
            0..=U8_MAX => Some(Self::U8),
            0..=U16_MAX => Some(Self::U16),
            0..=U24_MAX => Some(Self::U24),
            0..=U32_MAX => Some(Self::U32),
            _ => None,
        }
    }
}

/// Computes the narrowest `PacketNumberLen` that can represent `packet_number`
/// relative to the largest packet number the peer has acknowledged.
///
/// Mirrors the RFC 9000 packet number encoding rule: the encoding must be
/// able to represent more than twice the gap between the largest acked
/// packet number and the packet number being sent.
pub fn derive_truncation_range(
    largest_acknowledged_packet_number: crate::packet::number::PacketNumber,
    packet_number: crate::packet::number::PacketNumber,
) -> Option<PacketNumberLen> {
    let space = packet_number.space();
    space.assert_eq(largest_acknowledged_packet_number.space());
    packet_number
        .as_u64()
        .checked_sub(largest_acknowledged_packet_number.as_u64())
        .and_then(|value| value.checked_mul(2))
        .and_then(|value| VarInt::new(value).ok())
        .and_then(|value| PacketNumberLen::from_varint(value, space))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::number::PacketNumberSpace;

    #[test]
    fn widens_with_distance() {
        let largest = PacketNumberSpace::ApplicationData.new_packet_number(VarInt::from_u32(100));
        let next = PacketNumberSpace::ApplicationData.new_packet_number(VarInt::from_u32(101));
        assert_eq!(derive_truncation_range(largest, next).unwrap().bytesize(), 1);

        let far = PacketNumberSpace::ApplicationData.new_packet_number(VarInt::from_u32(100_000));
        assert_eq!(derive_truncation_range(largest, far).unwrap().bytesize(), 3);
    }
}
