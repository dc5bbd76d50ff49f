// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod ack;
pub mod admission;
pub mod alarm;
pub mod allocator;
pub mod buffered;
pub mod chooser;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod error;
pub mod flags;
pub mod loss;
pub mod mutators;
pub mod packet;
pub mod pns;
pub mod recorder;
pub mod reschedule;
pub mod store;

pub use config::Config;
pub use controller::Controller;
pub use error::SendControlError;
pub use packet::{PacketId, SentPacket};
pub use pns::PacketNumberSpace;
