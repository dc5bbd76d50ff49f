// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

pub use congestion_controller::CongestionController;
pub use pacing::{Pacer, TokenBucketPacer};
pub use rtt_estimator::*;

pub mod congestion_controller;
mod pacing;
mod rtt_estimator;
