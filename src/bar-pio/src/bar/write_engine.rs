// Copyright 2025 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Write engine: Memory Write TLPs in, one per-DWORD write per clock out.
//!
//! Beats of the TLP currently arriving are staged and committed to the
//! bounded ingress buffer atomically on the TLP's last beat. A TLP that does
//! not fit is dropped in its entirety, silently. No error TLP is sent and
//! nothing is logged; the protocol layer above is responsible for detecting
//! missing effects.
//!
//! The walk emits at most one `(region, address, byte-enable, data)` write
//! per `tick()`: the header's first-DWORD byte-enable applies to the first
//! payload DWORD, the last-DWORD byte-enable to the final one, and every
//! DWORD in between is written fully enabled. A single-DWORD write honors
//! only the first-DWORD byte-enable.

use crate::bar::defs;
use crate::bar::metrics::METRICS;
use crate::logger::IncMetric;
use crate::tlp::{MemoryHeader, MemoryOp, Region, TlpBeat, defs as tlp_defs};
use crate::utils::ring_buffer::RingBuffer;

/// A single per-DWORD write dispatched to a backing-store port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwordWrite {
    pub region: Region,
    pub address: u32,
    pub byte_enable: u8,
    pub data: u32,
}

/// Walk through the payload DWORDs of one committed write TLP.
#[derive(Debug, Clone, Copy)]
struct WriteWalk {
    region: Region,
    address: u32,
    first_be: u8,
    last_be: u8,
    /// DWORDs still to emit, including the one at the cursor.
    remaining: u16,
    emitted: u16,
    cur: Option<TlpBeat>,
    /// Next DWORD slot in `cur`.
    slot: usize,
    /// Declared count exhausted but the TLP has more beats; drain them.
    drain_excess: bool,
}

/// The §4.1 write engine. Feed it beats with [`WriteEngine::push`], step it
/// once per clock with [`WriteEngine::tick`].
#[derive(Debug)]
pub struct WriteEngine {
    ingress: RingBuffer<TlpBeat>,
    staged: Vec<TlpBeat>,
    /// Current inbound TLP is already condemned; swallow its remaining beats.
    staging_condemned: bool,
    walk: Option<WriteWalk>,
}

impl Default for WriteEngine {
    fn default() -> Self {
        WriteEngine::new(defs::WRITE_INGRESS_BEATS)
    }
}

impl WriteEngine {
    /// Engine with an ingress buffer of `capacity` beats.
    pub fn new(capacity: usize) -> WriteEngine {
        WriteEngine {
            ingress: RingBuffer::with_capacity(capacity),
            staged: Vec::new(),
            staging_condemned: false,
            walk: None,
        }
    }

    /// Back-pressure level: the engine can still absorb beats. Upstream may
    /// ignore it; the penalty is whole-TLP loss, not corruption.
    pub fn ready(&self) -> bool {
        self.ingress.free_len() > self.staged.len()
    }

    /// Accept one beat of an already-classified Memory Write TLP.
    pub fn push(&mut self, beat: TlpBeat) {
        if beat.first {
            // A new TLP implicitly abandons any unterminated predecessor.
            self.staged.clear();
            self.staging_condemned = false;
        }
        if self.staging_condemned {
            if beat.last {
                self.staging_condemned = false;
            }
            return;
        }
        // Longest legal write TLP: 4-DW header plus 1024 payload DWORDs.
        let max_beats = (4 + tlp_defs::MAX_REQ_DWORDS as usize).div_ceil(tlp_defs::DWORDS_PER_BEAT);
        if self.staged.len() >= max_beats {
            self.condemn(beat.last);
            return;
        }
        self.staged.push(beat);
        if beat.last {
            if self.ingress.free_len() < self.staged.len() {
                self.staged.clear();
                METRICS.write_overflow_tlps.inc();
                return;
            }
            for staged in self.staged.drain(..) {
                self.ingress.push(staged);
            }
        }
    }

    fn condemn(&mut self, was_last: bool) {
        self.staged.clear();
        self.staging_condemned = !was_last;
        METRICS.write_overflow_tlps.inc();
    }

    /// Advance one clock. Emits at most one write.
    pub fn tick(&mut self) -> Option<DwordWrite> {
        let mut walk = match self.walk.take() {
            Some(walk) => walk,
            None => self.start_walk()?,
        };

        if walk.drain_excess {
            return self.drain_excess(walk);
        }

        // Fetch the next beat of the TLP if the previous one is spent.
        if walk.cur.is_none() {
            let Some(beat) = self.ingress.pop_front() else {
                self.walk = Some(walk);
                return None;
            };
            if beat.first {
                // Previous TLP ended without delivering its declared count.
                debug_assert!(false, "write TLP truncated mid-walk");
                METRICS.malformed_write_walks.inc();
                self.walk = None;
                self.push_back_header(beat);
                return None;
            }
            walk.cur = Some(beat);
            walk.slot = 0;
        }
        let beat = walk.cur.unwrap();

        if walk.slot >= tlp_defs::DWORDS_PER_BEAT || beat.keep & (1 << walk.slot) == 0 {
            // Beat exhausted; repositioning consumes the cycle.
            if beat.last {
                if walk.remaining > 0 {
                    debug_assert!(false, "write TLP shorter than its declared DWORD count");
                    METRICS.malformed_write_walks.inc();
                }
                self.walk = None;
            } else {
                walk.cur = None;
                self.walk = Some(walk);
            }
            return None;
        }

        let byte_enable = if walk.emitted == 0 {
            walk.first_be
        } else if walk.remaining == 1 {
            walk.last_be
        } else {
            0b1111
        };
        let out = DwordWrite {
            region: walk.region,
            address: walk.address,
            byte_enable,
            data: beat.data[walk.slot],
        };
        walk.address = walk.address.wrapping_add(4);
        walk.slot += 1;
        walk.emitted += 1;
        walk.remaining -= 1;

        if walk.remaining == 0 {
            if beat.last {
                self.walk = None;
            } else {
                // More beats than the declared count accounts for.
                debug_assert!(false, "write TLP longer than its declared DWORD count");
                METRICS.malformed_write_walks.inc();
                walk.drain_excess = true;
                self.walk = Some(walk);
            }
        } else {
            self.walk = Some(walk);
        }
        METRICS.write_dwords.inc();
        Some(out)
    }

    /// Parse the header beat at the front of the ingress buffer and begin a
    /// walk. The first payload DWORD (if it shares the header beat) is
    /// emitted by the caller in this same cycle.
    fn start_walk(&mut self) -> Option<WriteWalk> {
        let beat = self.ingress.pop_front()?;
        if !beat.first {
            // Stray continuation beat; nothing to attach it to.
            METRICS.dropped_tlps.inc();
            return None;
        }
        let hdr = match MemoryHeader::parse(&beat) {
            Ok(hdr) => hdr,
            Err(_) => {
                // Upstream classification already filtered; treat as drop.
                METRICS.dropped_tlps.inc();
                return None;
            }
        };
        debug_assert!(hdr.op == MemoryOp::Write);
        Some(WriteWalk {
            region: beat.region,
            address: hdr.address,
            first_be: hdr.first_be,
            last_be: hdr.last_be,
            remaining: hdr.dword_len,
            emitted: 0,
            slot: hdr.payload_start_slot(),
            cur: Some(beat),
            drain_excess: false,
        })
    }

    fn drain_excess(&mut self, walk: WriteWalk) -> Option<DwordWrite> {
        match self.ingress.pop_front() {
            Some(beat) if beat.last => self.walk = None,
            Some(_) => self.walk = Some(walk),
            None => self.walk = Some(walk),
        }
        None
    }

    /// A first-beat surfaced while a walk was still open: the walk is dead,
    /// but the new TLP must not be lost. Re-stage its header beat.
    fn push_back_header(&mut self, beat: TlpBeat) {
        // The ingress ring just freed a slot by popping this beat, so the
        // push cannot fail; order is preserved because the walk owned every
        // beat ahead of it.
        let pushed = self.pushed_front(beat);
        debug_assert!(pushed);
    }

    fn pushed_front(&mut self, beat: TlpBeat) -> bool {
        // Rebuild with the header beat at the front.
        let mut reordered = RingBuffer::with_capacity(self.ingress.capacity());
        let ok = reordered.push(beat);
        while let Some(b) = self.ingress.pop_front() {
            reordered.push(b);
        }
        self.ingress = reordered;
        ok
    }

    /// Abandon all buffered and in-flight state. Not graceful: a partially
    /// emitted write sequence stays partially applied.
    pub fn reset(&mut self) {
        self.ingress.clear();
        self.staged.clear();
        self.staging_condemned = false;
        self.walk = None;
    }
}
