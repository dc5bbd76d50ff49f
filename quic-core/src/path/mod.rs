// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Path identity.
//!
//! The full `Path` (MTU, validation state, congestion controller, RTT
//! estimator) is owned by the path manager. The send controller only needs
//! a lightweight, `Copy` handle so sent packets can be re-pointed at a new
//! path after a migration without retaining a borrow on the path table.

use core::fmt;

/// An index into the path manager's table of paths on a connection.
///
/// `Id` is intentionally opaque: constructing one out of thin air and using
/// it against the wrong path manager is a logic error, so construction is
/// restricted to callers that can uphold that invariant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u8);

impl Id {
    /// Creates a new `Id` for the given index into the path manager's table.
    ///
    /// # Safety
    ///
    /// Callers must ensure the index corresponds to a valid entry in the
    /// owning path manager's table.
    #[inline]
    pub const unsafe fn new(index: u8) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
