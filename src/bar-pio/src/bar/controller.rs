// Copyright 2025 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The controller: ingress classification, region routing and the response
//! multiplexer, wrapped around the two packet engines.
//!
//! Ingress beats are classified on their first beat and routed whole-TLP to
//! one engine; anything unclassifiable is dropped and counted. Per-DWORD
//! requests leaving the engines are steered by region selector into one of
//! up to seven attached backing stores. Read responses come back through a
//! per-region delay queue that models the store's fixed read latency, and a
//! single multiplexer hands at most one response per clock to the read
//! engine's reassembly stage.
//!
//! A region with no store attached is a black hole: writes to it vanish and
//! reads to it never produce a completion.

use crate::bar::metrics::METRICS;
use crate::bar::read_engine::{ReadEngine, ReadRequest, ReadResponse};
use crate::bar::write_engine::WriteEngine;
use crate::bar::{BarError, defs};
use crate::logger::{IncMetric, error};
use crate::store::BarStore;
use crate::tlp::{MemoryHeader, MemoryOp, Region, TlpBeat};
use crate::utils::ring_buffer::RingBuffer;

/// A read response waiting out its store's declared latency.
#[derive(Debug, Default, Clone, Copy)]
struct Pending {
    /// Cycle at which the response may cross the multiplexer.
    due: u64,
    resp: ReadResponse,
}

/// One attached backing store plus its read-latency delay queue.
#[derive(Debug)]
struct RegionPort {
    store: Box<dyn BarStore>,
    pipe: RingBuffer<Pending>,
}

/// Where the beats of the TLP currently arriving are being routed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum OpenRoute {
    #[default]
    Idle,
    Write,
    Discard,
}

/// The BAR PIO TLP controller.
///
/// Feed ingress beats with [`BarController::push`], advance the whole
/// pipeline one clock with [`BarController::tick`], drain outbound completion
/// beats with [`BarController::pop_completion`].
#[derive(Debug)]
pub struct BarController {
    ports: [Option<RegionPort>; defs::NUM_REGIONS],
    write_engine: WriteEngine,
    read_engine: ReadEngine,
    route: OpenRoute,
    /// Uniform read latency of the attached stores; fixed by the first
    /// attach.
    latency: Option<u8>,
    now: u64,
}

impl Default for BarController {
    fn default() -> Self {
        BarController::new(0)
    }
}

impl BarController {
    /// Controller with default queue depths. `completer_id` is stamped into
    /// every outbound completion header.
    pub fn new(completer_id: u16) -> BarController {
        BarController::with_capacities(
            completer_id,
            defs::WRITE_INGRESS_BEATS,
            defs::READ_ADMISSION_DEPTH,
            defs::EGRESS_BEATS,
        )
    }

    /// Controller with explicit queue depths.
    pub fn with_capacities(
        completer_id: u16,
        write_ingress_beats: usize,
        read_admission_depth: usize,
        egress_beats: usize,
    ) -> BarController {
        BarController {
            ports: std::array::from_fn(|_| None),
            write_engine: WriteEngine::new(write_ingress_beats),
            read_engine: ReadEngine::new(read_admission_depth, egress_beats, completer_id),
            route: OpenRoute::Idle,
            latency: None,
            now: 0,
        }
    }

    /// Attach a backing store behind `region`.
    ///
    /// Every store attached to one controller must declare the same read
    /// latency; the response multiplexer relies on it to guarantee at most
    /// one response becomes due per clock.
    pub fn attach_store(
        &mut self,
        region: Region,
        store: Box<dyn BarStore>,
    ) -> Result<(), BarError> {
        let selector = region.selector();
        let Some(index) = region.index() else {
            return Err(BarError::InvalidRegion(selector));
        };
        if self.ports[index].is_some() {
            return Err(BarError::RegionOccupied(selector));
        }
        let latency = store.read_latency();
        if latency > defs::MAX_STORE_LATENCY {
            return Err(BarError::UnsupportedLatency(latency, defs::MAX_STORE_LATENCY));
        }
        match self.latency {
            Some(expected) if expected != latency => {
                return Err(BarError::LatencyMismatch(selector, latency, expected));
            }
            _ => self.latency = Some(latency),
        }
        self.ports[index] = Some(RegionPort {
            store,
            // One slot per latency step plus issue/deliver slack.
            pipe: RingBuffer::with_capacity(defs::MAX_STORE_LATENCY as usize + 2),
        });
        Ok(())
    }

    /// Accept one ingress beat. Classification happens on the TLP's first
    /// beat; later beats follow the route chosen there. Unclassifiable
    /// traffic is dropped silently with a metric increment.
    pub fn push(&mut self, beat: TlpBeat) {
        if beat.first {
            self.route = self.classify(&beat);
        }
        match self.route {
            OpenRoute::Write => self.write_engine.push(beat),
            OpenRoute::Discard => (),
            OpenRoute::Idle => {
                // Continuation beat with no open TLP.
                METRICS.dropped_tlps.inc();
            }
        }
        if beat.last {
            self.route = OpenRoute::Idle;
        }
    }

    fn classify(&mut self, beat: &TlpBeat) -> OpenRoute {
        if beat.region == Region::None {
            METRICS.dropped_tlps.inc();
            return OpenRoute::Discard;
        }
        let hdr = match MemoryHeader::parse(beat) {
            Ok(hdr) => hdr,
            Err(_) => {
                METRICS.dropped_tlps.inc();
                return OpenRoute::Discard;
            }
        };
        match hdr.op {
            MemoryOp::Write => {
                METRICS.write_tlps.inc();
                OpenRoute::Write
            }
            MemoryOp::Read => {
                METRICS.read_tlps.inc();
                self.read_engine.admit(ReadRequest::from_header(&hdr, beat.region));
                // A read carries no payload; swallow any trailing beats.
                OpenRoute::Discard
            }
        }
    }

    /// Advance the whole pipeline one clock: dispatch at most one per-DWORD
    /// write, move at most one due store response across the multiplexer,
    /// and issue at most one per-DWORD read.
    pub fn tick(&mut self) {
        if let Some(w) = self.write_engine.tick()
            && let Some(index) = w.region.index()
        {
            if let Some(port) = self.ports[index].as_mut() {
                port.store.write_dword(w.address, w.byte_enable, w.data);
            }
            // Unpopulated region: the write vanishes.
        }

        if let Some(index) = self.due_response_region()
            && let Some(port) = self.ports[index].as_mut()
            && let Some(pending) = port.pipe.pop_front()
        {
            self.read_engine.complete(pending.resp);
        }

        if let Some(rd) = self.read_engine.tick()
            && let Some(index) = rd.region.index()
            && let Some(port) = self.ports[index].as_mut()
        {
            let data = port.store.read_dword(rd.address);
            let due = self.now + u64::from(self.latency.unwrap_or(0));
            let pushed = port.pipe.push(Pending {
                due,
                resp: ReadResponse {
                    data,
                    context: rd.context,
                },
            });
            // Pipe depth covers the deepest latency and the issue rate is
            // one per clock, so the push cannot fail.
            debug_assert!(pushed, "region response pipe overrun");
        }
        // Unpopulated region: the read never completes.

        self.now = self.now.wrapping_add(1);
    }

    /// Response multiplexer: pick the due response, if any. Under the
    /// uniform-latency contract at most one store has a due response per
    /// clock; more than one means a store violated its declared latency.
    fn due_response_region(&self) -> Option<usize> {
        let mut due = None;
        for (index, slot) in self.ports.iter().enumerate() {
            let Some(port) = slot else { continue };
            if port.pipe.front().is_some_and(|p| p.due <= self.now) {
                if due.is_none() {
                    due = Some(index);
                } else {
                    debug_assert!(false, "store violated the uniform-latency contract");
                    METRICS.response_collisions.inc();
                    error!("multiple region stores responded in one cycle");
                    // The later response stays queued and crosses next clock.
                }
            }
        }
        due
    }

    /// Pop the next outbound completion beat, if any.
    pub fn pop_completion(&mut self) -> Option<TlpBeat> {
        self.read_engine.pop_completion()
    }

    /// Level signal: completion traffic has been started and not drained.
    pub fn has_pending_completions(&self) -> bool {
        self.read_engine.has_pending()
    }

    /// Back-pressure level of the write ingress buffer.
    pub fn write_ready(&self) -> bool {
        self.write_engine.ready()
    }

    /// Drop all in-flight state, non-gracefully: a half-applied write TLP
    /// stays half-applied, admitted reads never complete. Attached stores
    /// and their contents are untouched.
    pub fn reset(&mut self) {
        self.write_engine.reset();
        self.read_engine.reset();
        for slot in self.ports.iter_mut().flatten() {
            slot.pipe.clear();
        }
        self.route = OpenRoute::Idle;
        METRICS.resets.inc();
    }
}
