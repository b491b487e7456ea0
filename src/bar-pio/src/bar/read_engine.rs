// Copyright 2025 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Read engine: Memory Read TLPs in, completion TLP beats out.
//!
//! Four stages, each holding its own state and advancing once per clock:
//!
//! - **admission**: the parsed request descriptor is queued;
//! - **splitting**: one request at a time is carved into completion chunks of
//!   at most 32 DWORDs, the first chunk truncated so it ends on a 128-byte
//!   boundary unless the whole request fits in one chunk;
//! - **walk**: each chunk is walked DWORD-by-DWORD, one backing-store read
//!   per clock, the chunk's first and last DWORDs tagged for completion
//!   framing;
//! - **reassembly**: responses accumulate into 128-bit beats; the chunk's
//!   first response also synthesizes the three completion header DWORDs.
//!
//! Chunks of one request are emitted strictly in ascending-address order and
//! the next request is not split until the current one has been handed to
//! the walk completely, so completions are never reordered or interleaved.

use crate::bar::defs;
use crate::bar::metrics::METRICS;
use crate::logger::IncMetric;
use crate::tlp::{CplHeader, MemoryHeader, Region, TlpBeat, defs as tlp_defs, to_wire_order};
use crate::utils::ring_buffer::RingBuffer;

/// Descriptor of an admitted memory-read TLP. Exclusively owned by the
/// engine until the matching completions have been emitted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub region: Region,
    /// 4-byte-aligned starting byte address.
    pub address: u32,
    pub requester_id: u16,
    pub tag: u8,
    /// Requested length in DWORDs, 1..=1024.
    pub dword_len: u16,
    /// Byte-enable of the first DWORD, retained from the header. Completions
    /// report the chunk's DWORD-aligned byte address; disabled leading bytes
    /// are not folded into the lower-address field.
    pub first_be: u8,
}

impl ReadRequest {
    /// Build a descriptor from a parsed header and the beat's region tag.
    pub fn from_header(hdr: &MemoryHeader, region: Region) -> ReadRequest {
        ReadRequest {
            region,
            address: hdr.address,
            requester_id: hdr.requester_id,
            tag: hdr.tag,
            dword_len: hdr.dword_len,
            first_be: hdr.first_be,
        }
    }
}

/// Context threaded through a backing-store read port unmodified, so a
/// response can be reunited with its originating chunk. Opaque to the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadContext {
    /// First DWORD of its chunk: starts a new completion TLP.
    pub first: bool,
    /// Last DWORD of its chunk: closes the completion TLP.
    pub last: bool,
    /// Completion header for the chunk; consulted only when `first` is set.
    pub header: CplHeader,
}

/// The atomic unit dispatched to a backing-store read port.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DwordRead {
    pub region: Region,
    pub address: u32,
    pub context: ReadContext,
}

/// A backing-store response, delivered after the store's fixed latency.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadResponse {
    pub data: u32,
    pub context: ReadContext,
}

/// Stage-B state: the request currently being carved into chunks.
#[derive(Debug, Clone, Copy)]
struct SplitState {
    req: ReadRequest,
    /// Byte address of the next chunk.
    address: u32,
    /// DWORDs of the request not yet handed to the walk.
    remaining: u16,
}

/// Stage-C state: the chunk currently being walked.
#[derive(Debug, Clone, Copy)]
struct ChunkWalk {
    region: Region,
    address: u32,
    remaining: u16,
    header: CplHeader,
    issued_any: bool,
}

/// Stage-D state: the outbound beat being filled.
#[derive(Debug, Default, Clone, Copy)]
struct Assembler {
    data: [u32; 4],
    keep: u8,
    slot: usize,
    /// The next emitted beat is the first of its completion TLP.
    tlp_first: bool,
}

/// The §4.2–§4.5 read engine.
#[derive(Debug)]
pub struct ReadEngine {
    admission: RingBuffer<ReadRequest>,
    split: Option<SplitState>,
    walk: Option<ChunkWalk>,
    asm: Assembler,
    egress: RingBuffer<TlpBeat>,
    /// Completion TLPs started but not yet fully handed to the egress queue.
    in_flight: u32,
    completer_id: u16,
}

impl Default for ReadEngine {
    fn default() -> Self {
        ReadEngine::new(defs::READ_ADMISSION_DEPTH, defs::EGRESS_BEATS, 0)
    }
}

impl ReadEngine {
    pub fn new(admission_depth: usize, egress_beats: usize, completer_id: u16) -> ReadEngine {
        ReadEngine {
            admission: RingBuffer::with_capacity(admission_depth),
            split: None,
            walk: None,
            asm: Assembler::default(),
            egress: RingBuffer::with_capacity(egress_beats),
            in_flight: 0,
            completer_id,
        }
    }

    /// Stage A: admit a validated read request. A request arriving while the
    /// queue is full is dropped silently, per the best-effort policy.
    pub fn admit(&mut self, req: ReadRequest) {
        if !self.admission.push(req) {
            METRICS.read_overflow_tlps.inc();
        }
    }

    /// Advance one clock: refill the splitter and walk, and issue at most
    /// one per-DWORD read. The caller dispatches the request to the
    /// addressed store and later feeds the response to [`ReadEngine::complete`].
    pub fn tick(&mut self) -> Option<DwordRead> {
        if self.walk.is_none() {
            self.refill_walk();
        }

        // Hold off while the egress queue could not absorb the beats of the
        // responses already in flight plus this one.
        if self.egress.free_len() < defs::EGRESS_HEADROOM {
            return None;
        }

        let mut walk = self.walk.take()?;
        let context = ReadContext {
            first: !walk.issued_any,
            last: walk.remaining == 1,
            header: walk.header,
        };
        let out = DwordRead {
            region: walk.region,
            address: walk.address,
            context,
        };
        walk.address = walk.address.wrapping_add(4);
        walk.remaining -= 1;
        walk.issued_any = true;
        if walk.remaining > 0 {
            self.walk = Some(walk);
        }
        METRICS.read_dwords.inc();
        Some(out)
    }

    /// Stage B: carve the next chunk of the current request (admitting the
    /// next request first if none is being split).
    fn refill_walk(&mut self) {
        let mut split = match self.split.take() {
            Some(split) => split,
            None => {
                let req = match self.admission.pop_front() {
                    Some(req) => req,
                    None => return,
                };
                SplitState {
                    address: req.address,
                    remaining: req.dword_len,
                    req,
                }
            }
        };

        // DWORD offset within the current 128-byte window; the first chunk
        // is truncated so it ends on the window boundary.
        let window_offset = (split.address >> 2) % u32::from(tlp_defs::CPL_CHUNK_DWORDS);
        let span = tlp_defs::CPL_CHUNK_DWORDS - window_offset as u16;
        let chunk_len = split.remaining.min(span);

        let header = CplHeader {
            completer_id: self.completer_id,
            requester_id: split.req.requester_id,
            tag: split.req.tag,
            dword_len: chunk_len,
            // Bytes remaining for the request including this chunk.
            byte_count: split.remaining * 4,
            lower_addr: (split.address & 0x7f) as u8,
        };
        self.walk = Some(ChunkWalk {
            region: split.req.region,
            address: split.address,
            remaining: chunk_len,
            header,
            issued_any: false,
        });

        split.address = split.address.wrapping_add(u32::from(chunk_len) * 4);
        split.remaining -= chunk_len;
        if split.remaining > 0 {
            self.split = Some(split);
        }
    }

    /// Stage D: fold one backing-store response into the outbound stream.
    ///
    /// A completion TLP starts existing at its chunk's first response; a
    /// chunk whose store never answers (an unpopulated region) therefore
    /// never raises the pending level.
    pub fn complete(&mut self, resp: ReadResponse) {
        let ctx = resp.context;
        if ctx.first {
            self.in_flight += 1;
            let [dw0, dw1, dw2] = ctx.header.pack();
            self.asm = Assembler {
                data: [dw0, dw1, dw2, 0],
                keep: 0b0111,
                slot: 3,
                tlp_first: true,
            };
        }
        self.asm.data[self.asm.slot] = to_wire_order(resp.data);
        self.asm.keep |= 1 << self.asm.slot;
        self.asm.slot += 1;

        if self.asm.slot == tlp_defs::DWORDS_PER_BEAT || ctx.last {
            let beat = TlpBeat {
                data: self.asm.data,
                keep: self.asm.keep,
                first: self.asm.tlp_first,
                last: ctx.last,
                region: Region::None,
            };
            // Issue-side headroom guarantees room for every in-flight
            // response; a full ring here is a latency-contract violation.
            let pushed = self.egress.push(beat);
            debug_assert!(pushed, "egress completion queue overrun");
            self.asm = Assembler::default();
            if ctx.last {
                self.in_flight -= 1;
                METRICS.completions.inc();
            }
        }
    }

    /// Pop the next outbound completion beat, if any.
    pub fn pop_completion(&mut self) -> Option<TlpBeat> {
        self.egress.pop_front()
    }

    /// Level signal: completion data has been started and not fully drained.
    pub fn has_pending(&self) -> bool {
        self.in_flight > 0 || !self.egress.is_empty()
    }

    /// Abandon every queued request, in-flight split/walk and partially
    /// assembled completion. No completion is ever sent for them.
    pub fn reset(&mut self) {
        self.admission.clear();
        self.split = None;
        self.walk = None;
        self.asm = Assembler::default();
        self.egress.clear();
        self.in_flight = 0;
    }
}
