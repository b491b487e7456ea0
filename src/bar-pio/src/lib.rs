// Copyright 2025 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Data-plane of a PCIe device emulator.
//!
//! The crate answers Memory Read/Write TLPs addressed at the device's BAR
//! windows. Inbound packets arrive as a stream of 128-bit beats; a pair of
//! packet engines decodes them, splits oversized reads into 128-byte-bounded
//! completion chunks, and drives per-DWORD requests into pluggable backing
//! stores selected by BAR region. Everything advances on a single synchronous
//! clock: each component exposes a `tick()` that either makes one step of
//! progress or holds state for the cycle. There is no blocking anywhere.
//!
//! Entry point is [`BarController`]: push ingress beats with
//! [`BarController::push`], advance the pipeline with
//! [`BarController::tick`], and drain completion beats with
//! [`BarController::pop_completion`].

pub mod bar;
pub mod logger;
pub mod store;
pub mod tlp;
pub mod utils;

pub use crate::bar::{BarController, BarError};
pub use crate::store::{BarStore, RamStore};
pub use crate::tlp::{Region, TlpBeat};
