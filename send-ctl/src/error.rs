//! The fatal subset of the spec §7 error taxonomy.
//!
//! Everything else in that table (allocation failure, ECN inconsistency, an
//! alarm firing with nothing to expire) is handled in place and never
//! constructs one of these — see spec §7's propagation policy.

use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendControlError {
    /// An ACK frame referenced a packet number greater than any ever sent.
    ProtocolViolation,
    /// A token (from a Retry or NEW_TOKEN) exceeded the space reserved for it.
    TokenTooLong,
    /// More than `Config::max_retries` Retry packets were received.
    RetryLimitExceeded,
    /// The path MTU can't fit the frames a packet is required to carry.
    PacketTooSmall,
}

impl fmt::Display for SendControlError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let reason = match self {
            Self::ProtocolViolation => {
                "ack acknowledged a packet number that was never sent"
            }
            Self::TokenTooLong => "token exceeds the space reserved for it in a packet",
            Self::RetryLimitExceeded => "exceeded the maximum number of retries",
            Self::PacketTooSmall => "packet is too small to hold its required payload",
        };
        f.write_str(reason)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SendControlError {}

pub type Result<T> = core::result::Result<T, SendControlError>;
