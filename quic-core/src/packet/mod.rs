// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Packet-level vocabulary retained from the wire-format layer.
//!
//! Encoding, decoding, and encryption of packets is owned by the framer and
//! crypto layers and is outside the scope of this crate. The send controller
//! only needs the packet number allocation machinery in [`number`].

pub mod number;
