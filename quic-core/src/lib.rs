#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod inet;
pub mod packet;
pub mod path;
pub mod recovery;
pub mod time;
pub mod varint;
