// Copyright 2025 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Helpers for building TLP beat streams and driving the controller in
//! tests.

#![doc(hidden)]

use std::sync::{Arc, Mutex};

use crate::bar::BarController;
use crate::store::BarStore;
use crate::tlp::{Region, TlpBeat, defs, to_wire_order};

/// Frame a flat DWORD sequence into a beat stream: four DWORDs per beat,
/// contiguous keep mask, first/last markers set, every beat tagged `region`.
pub fn beats_from_dwords(region: Region, dwords: &[u32]) -> Vec<TlpBeat> {
    assert!(!dwords.is_empty());
    let beat_count = dwords.len().div_ceil(defs::DWORDS_PER_BEAT);
    dwords
        .chunks(defs::DWORDS_PER_BEAT)
        .enumerate()
        .map(|(i, chunk)| {
            let mut data = [0u32; 4];
            data[..chunk.len()].copy_from_slice(chunk);
            TlpBeat {
                data,
                keep: (1u8 << chunk.len()) - 1,
                first: i == 0,
                last: i == beat_count - 1,
                region,
            }
        })
        .collect()
}

fn len_field(dword_len: usize) -> u32 {
    assert!(dword_len >= 1 && dword_len <= usize::from(defs::MAX_REQ_DWORDS));
    (dword_len as u32) & 0x3ff
}

/// Memory write TLP with a 3-DW header; payload DWORDs follow the header in
/// the same beat stream.
pub fn mwr32(
    region: Region,
    address: u32,
    payload: &[u32],
    first_be: u8,
    last_be: u8,
) -> Vec<TlpBeat> {
    let mut dwords = vec![
        (u32::from(defs::FMT_TYPE_MWR32) << 24) | len_field(payload.len()),
        (u32::from(last_be) << 4) | u32::from(first_be),
        address,
    ];
    dwords.extend_from_slice(payload);
    beats_from_dwords(region, &dwords)
}

/// Memory write TLP with a 4-DW header (64-bit addressing, upper bits zero).
pub fn mwr64(
    region: Region,
    address: u32,
    payload: &[u32],
    first_be: u8,
    last_be: u8,
) -> Vec<TlpBeat> {
    let mut dwords = vec![
        (u32::from(defs::FMT_TYPE_MWR64) << 24) | len_field(payload.len()),
        (u32::from(last_be) << 4) | u32::from(first_be),
        0,
        address,
    ];
    dwords.extend_from_slice(payload);
    beats_from_dwords(region, &dwords)
}

/// Memory read TLP with a 3-DW header. Byte enables follow the usual rule:
/// all four first-DWORD bytes enabled, last-DWORD enables zero for a
/// single-DWORD request.
pub fn mrd32(
    region: Region,
    address: u32,
    dword_len: usize,
    requester_id: u16,
    tag: u8,
) -> Vec<TlpBeat> {
    let last_be: u32 = if dword_len == 1 { 0 } else { 0b1111 };
    beats_from_dwords(
        region,
        &[
            (u32::from(defs::FMT_TYPE_MRD32) << 24) | len_field(dword_len),
            (u32::from(requester_id) << 16) | (u32::from(tag) << 8) | (last_be << 4) | 0b1111,
            address,
        ],
    )
}

/// Memory read TLP with a 4-DW header (upper address bits zero).
pub fn mrd64(
    region: Region,
    address: u32,
    dword_len: usize,
    requester_id: u16,
    tag: u8,
) -> Vec<TlpBeat> {
    let last_be: u32 = if dword_len == 1 { 0 } else { 0b1111 };
    beats_from_dwords(
        region,
        &[
            (u32::from(defs::FMT_TYPE_MRD64) << 24) | len_field(dword_len),
            (u32::from(requester_id) << 16) | (u32::from(tag) << 8) | (last_be << 4) | 0b1111,
            0,
            address,
        ],
    )
}

/// Tick the controller, draining completion beats each cycle, until `tlps`
/// completion TLPs have fully egressed. Panics after `max_ticks`.
pub fn run_to_completions(
    ctl: &mut BarController,
    tlps: usize,
    max_ticks: usize,
) -> Vec<TlpBeat> {
    let mut beats = Vec::new();
    let mut done = 0;
    for _ in 0..max_ticks {
        ctl.tick();
        while let Some(beat) = ctl.pop_completion() {
            if beat.last {
                done += 1;
            }
            beats.push(beat);
        }
        if done >= tlps {
            return beats;
        }
    }
    panic!("expected {tlps} completion TLPs, saw {done} after {max_ticks} ticks");
}

/// Strip completion headers from a beat stream and return the payload
/// DWORDs, swapped back out of wire order. Handles multiple TLPs.
pub fn extract_payload(beats: &[TlpBeat]) -> Vec<u32> {
    let mut payload = Vec::new();
    for beat in beats {
        let skip = if beat.first { 3 } else { 0 };
        for slot in skip..defs::DWORDS_PER_BEAT {
            if beat.keep & (1 << slot) != 0 {
                payload.push(to_wire_order(beat.data[slot]));
            }
        }
    }
    payload
}

/// Store that records every per-DWORD write it receives and answers reads
/// with a function of the address, for asserting on dispatch order and byte
/// enables.
#[derive(Debug, Clone)]
pub struct RecordingStore {
    pub writes: Arc<Mutex<Vec<(u32, u8, u32)>>>,
    latency: u8,
}

impl RecordingStore {
    pub fn new(latency: u8) -> RecordingStore {
        RecordingStore {
            writes: Arc::new(Mutex::new(Vec::new())),
            latency,
        }
    }
}

impl BarStore for RecordingStore {
    fn read_latency(&self) -> u8 {
        self.latency
    }

    fn read_dword(&mut self, addr: u32) -> u32 {
        // Deterministic, address-derived pattern.
        addr ^ 0x5a5a_5a5a
    }

    fn write_dword(&mut self, addr: u32, byte_enable: u8, data: u32) {
        self.writes.lock().unwrap().push((addr, byte_enable, data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_framing() {
        let beats = beats_from_dwords(Region::Bar0, &[1, 2, 3, 4, 5]);
        assert_eq!(beats.len(), 2);
        assert!(beats[0].first && !beats[0].last);
        assert_eq!(beats[0].keep, 0b1111);
        assert!(!beats[1].first && beats[1].last);
        assert_eq!(beats[1].keep, 0b0001);
        assert_eq!(beats[1].data[0], 5);
    }

    #[test]
    fn test_mwr32_header_layout() {
        let beats = mwr32(Region::Bar2, 0x2000, &[0xaa], 0b0110, 0b0000);
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0].data[0], 0x4000_0001);
        assert_eq!(beats[0].data[1], 0x0000_0006);
        assert_eq!(beats[0].data[2], 0x2000);
        assert_eq!(beats[0].data[3], 0xaa);
        assert_eq!(beats[0].keep, 0b1111);
    }

    #[test]
    fn test_mrd_len_1024_encodes_as_zero() {
        let beats = mrd32(Region::Bar0, 0x0, 1024, 0x1, 0x1);
        assert_eq!(beats[0].data[0] & 0x3ff, 0);
        let beats = mrd64(Region::Bar0, 0x0, 1024, 0x1, 0x1);
        assert_eq!(beats[0].data[0] & 0x3ff, 0);
        assert_eq!(beats[0].keep, 0b1111);
    }
}
