// Copyright 2025 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! BAR PIO TLP controller.
//!
//! Two packet engines sit behind a thin classifier:
//! - the write engine decodes inbound Memory Write TLPs into an ordered
//!   sequence of per-DWORD `(region, address, byte-enable, data)` writes,
//!   one per clock;
//! - the read engine decodes inbound Memory Read TLPs, splits them into
//!   completion-sized chunks (128 bytes max, first chunk truncated to the
//!   128-byte boundary), walks each chunk DWORD-by-DWORD against the
//!   addressed backing store and reassembles the responses into outbound
//!   completion TLP beats.
//!
//! The two engines share only the ingress classification and the
//! backing-store address space; each TLP is processed strictly in ingress
//! order within its engine, and completions are never reordered.
//!
//! Error handling follows best-effort hardware semantics. An ingress packet
//! that cannot be buffered or classified is dropped silently with a metric
//! increment. The only typed errors are store registration failures.

mod controller;
pub mod metrics;
mod read_engine;
pub mod test_utils;
mod write_engine;

pub use self::controller::BarController;
pub use self::read_engine::{DwordRead, ReadContext, ReadEngine, ReadRequest, ReadResponse};
pub use self::write_engine::{DwordWrite, WriteEngine};

pub mod defs {
    /// Attachable regions: BAR0..BAR5 plus the expansion ROM.
    pub const NUM_REGIONS: usize = 7;
    /// Default write-ingress buffer depth, in beats.
    pub const WRITE_INGRESS_BEATS: usize = 64;
    /// Default read admission queue depth, in request descriptors.
    pub const READ_ADMISSION_DEPTH: usize = 4;
    /// Default egress completion queue depth, in beats.
    pub const EGRESS_BEATS: usize = 64;
    /// Egress slots the read engine keeps free before issuing another
    /// per-DWORD read; covers every response still in flight behind the
    /// deepest supported store latency.
    pub const EGRESS_HEADROOM: usize = MAX_STORE_LATENCY as usize + 2;
    /// Deepest read-port latency a store may declare.
    pub const MAX_STORE_LATENCY: u8 = 8;
}

/// Errors at the controller's integration surface. The packet data path
/// never returns these; see the crate docs for the drop policy.
#[derive(Debug, thiserror::Error, displaydoc::Display)]
pub enum BarError {
    /// Region selector {0} does not address an attachable region
    InvalidRegion(u8),
    /// Region selector {0} already has a store attached
    RegionOccupied(u8),
    /// Store for region selector {0} declares read latency {1}, controller expects {2}
    LatencyMismatch(u8, u8, u8),
    /// Store read latency {0} exceeds the supported maximum of {1}
    UnsupportedLatency(u8, u8),
}
