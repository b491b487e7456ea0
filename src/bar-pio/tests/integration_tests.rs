// Copyright 2025 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end exercises of the controller: beats in, beats out, real
//! backing stores behind the regions.

use proptest::prelude::*;

use bar_pio::bar::test_utils::{
    RecordingStore, extract_payload, mrd32, mrd64, mwr32, run_to_completions,
};
use bar_pio::{BarController, BarStore, RamStore, Region, TlpBeat};

/// Completion header fields of each TLP in an egress beat stream, in order:
/// `(dword_len, byte_count, lower_addr)`.
fn completion_headers(beats: &[TlpBeat]) -> Vec<(u16, u16, u8)> {
    beats
        .iter()
        .filter(|b| b.first)
        .map(|b| {
            (
                (b.data[0] & 0x3ff) as u16,
                (b.data[1] & 0xfff) as u16,
                (b.data[2] & 0x7f) as u8,
            )
        })
        .collect()
}

fn controller_with_ram(latency: u8, size: usize) -> BarController {
    let mut ctl = BarController::new(0x0100);
    ctl.attach_store(Region::Bar0, Box::new(RamStore::with_latency(size, latency)))
        .unwrap();
    ctl
}

fn push_all(ctl: &mut BarController, beats: Vec<TlpBeat>) {
    for beat in beats {
        ctl.push(beat);
    }
}

#[test]
fn test_aligned_read_splits_into_two_completions() {
    // 48 DWORDs at 0x1000: one full 128-byte chunk, one 16-DWORD residual.
    let mut ctl = controller_with_ram(2, 8192);
    let payload: Vec<u32> = (0..48).map(|i| 0x1000_0000 + i).collect();
    push_all(&mut ctl, mwr32(Region::Bar0, 0x1000, &payload, 0b1111, 0b1111));
    push_all(&mut ctl, mrd32(Region::Bar0, 0x1000, 48, 0xbeef, 0x21));
    let beats = run_to_completions(&mut ctl, 2, 400);
    assert_eq!(
        completion_headers(&beats),
        vec![(32, 192, 0x00), (16, 64, 0x00)]
    );
    assert_eq!(extract_payload(&beats), payload);
}

#[test]
fn test_unaligned_read_truncates_first_chunk() {
    // 40 DWORDs at 0x1044: 15 DWORDs to the 128-byte boundary, then 25.
    let mut ctl = controller_with_ram(0, 8192);
    let payload: Vec<u32> = (0..40).map(|i| 0xaa00_0000 + i).collect();
    push_all(&mut ctl, mwr32(Region::Bar0, 0x1044, &payload, 0b1111, 0b1111));
    push_all(&mut ctl, mrd32(Region::Bar0, 0x1044, 40, 0xbeef, 0x22));
    let beats = run_to_completions(&mut ctl, 2, 400);
    assert_eq!(
        completion_headers(&beats),
        vec![(15, 160, 0x44), (25, 100, 0x00)]
    );
    assert_eq!(extract_payload(&beats), payload);
}

#[test]
fn test_64bit_read_request() {
    let mut ctl = controller_with_ram(0, 4096);
    push_all(&mut ctl, mwr32(Region::Bar0, 0x200, &[0xfeed_f00d], 0b1111, 0b0000));
    push_all(&mut ctl, mrd64(Region::Bar0, 0x200, 1, 0x1, 0x3));
    let beats = run_to_completions(&mut ctl, 1, 100);
    assert_eq!(completion_headers(&beats), vec![(1, 4, 0x00)]);
    assert_eq!(extract_payload(&beats), vec![0xfeed_f00d]);
}

#[test]
fn test_single_dword_write_byte_enables() {
    // One DWORD at 0x2000 with byte enable 0b0110: only the middle two
    // bytes are written.
    let store = RecordingStore::new(0);
    let writes = store.writes.clone();
    let mut ctl = BarController::default();
    ctl.attach_store(Region::Bar0, Box::new(store)).unwrap();
    push_all(&mut ctl, mwr32(Region::Bar0, 0x2000, &[0xcafe_f00d], 0b0110, 0b0000));
    for _ in 0..10 {
        ctl.tick();
    }
    assert_eq!(*writes.lock().unwrap(), vec![(0x2000, 0b0110, 0xcafe_f00d)]);
}

#[test]
fn test_multi_dword_write_byte_enables() {
    // Three DWORDs at 0x3000: first BE on DWORD 0, last BE on DWORD 2, the
    // interior DWORD fully enabled.
    let store = RecordingStore::new(0);
    let writes = store.writes.clone();
    let mut ctl = BarController::default();
    ctl.attach_store(Region::Bar0, Box::new(store)).unwrap();
    push_all(&mut ctl, mwr32(Region::Bar0, 0x3000, &[1, 2, 3], 0b1111, 0b0011));
    for _ in 0..20 {
        ctl.tick();
    }
    assert_eq!(
        *writes.lock().unwrap(),
        vec![
            (0x3000, 0b1111, 1),
            (0x3004, 0b1111, 2),
            (0x3008, 0b0011, 3),
        ]
    );
}

#[test]
fn test_partial_write_read_back_merges_bytes() {
    let mut ctl = controller_with_ram(0, 4096);
    push_all(&mut ctl, mwr32(Region::Bar0, 0x100, &[0xaabb_ccdd], 0b1111, 0b0000));
    push_all(&mut ctl, mwr32(Region::Bar0, 0x100, &[0x1122_3344], 0b0110, 0b0000));
    push_all(&mut ctl, mrd32(Region::Bar0, 0x100, 1, 0x1, 0x9));
    let beats = run_to_completions(&mut ctl, 1, 100);
    assert_eq!(extract_payload(&beats), vec![0xaa22_33dd]);
}

#[test]
fn test_writes_apply_in_tlp_order() {
    // Two writes to the same DWORD: the later one wins.
    let mut ctl = controller_with_ram(0, 4096);
    push_all(&mut ctl, mwr32(Region::Bar0, 0x40, &[0x1111_1111], 0b1111, 0b0000));
    push_all(&mut ctl, mwr32(Region::Bar0, 0x40, &[0x2222_2222], 0b1111, 0b0000));
    push_all(&mut ctl, mrd32(Region::Bar0, 0x40, 1, 0x1, 0x0));
    let beats = run_to_completions(&mut ctl, 1, 100);
    assert_eq!(extract_payload(&beats), vec![0x2222_2222]);
}

#[test]
fn test_regions_are_isolated() {
    let mut ctl = BarController::default();
    ctl.attach_store(Region::Bar0, Box::new(RamStore::new(256))).unwrap();
    ctl.attach_store(Region::Rom, Box::new(RamStore::new(256))).unwrap();
    push_all(&mut ctl, mwr32(Region::Bar0, 0x10, &[0xa], 0b1111, 0b0000));
    push_all(&mut ctl, mwr32(Region::Rom, 0x10, &[0xb], 0b1111, 0b0000));
    push_all(&mut ctl, mrd32(Region::Bar0, 0x10, 1, 0x1, 0x0));
    push_all(&mut ctl, mrd32(Region::Rom, 0x10, 1, 0x1, 0x1));
    let beats = run_to_completions(&mut ctl, 2, 200);
    assert_eq!(extract_payload(&beats), vec![0xa, 0xb]);
}

#[test]
fn test_max_length_read() {
    // 1024 DWORDs (wire length field 0) from an aligned address: 32 full
    // chunks, byte counts descending by 128.
    let mut ram = RamStore::with_latency(4096, 2);
    let expected: Vec<u32> = (0..1024u32).map(|i| i.wrapping_mul(0x0101_0101) ^ 0xc3).collect();
    for (i, dword) in expected.iter().enumerate() {
        ram.write_dword(i as u32 * 4, 0b1111, *dword);
    }
    let mut ctl = BarController::new(0x0100);
    ctl.attach_store(Region::Bar0, Box::new(ram)).unwrap();
    push_all(&mut ctl, mrd32(Region::Bar0, 0x0, 1024, 0x1, 0x7));
    let beats = run_to_completions(&mut ctl, 32, 4096);
    let headers = completion_headers(&beats);
    assert_eq!(headers.len(), 32);
    for (i, (dword_len, byte_count, lower_addr)) in headers.iter().enumerate() {
        assert_eq!(*dword_len, 32);
        // 4096 bytes remaining at the first chunk encodes as 0.
        assert_eq!(*byte_count, ((4096 - 128 * i) & 0xfff) as u16);
        assert_eq!(*lower_addr, 0);
    }
    assert_eq!(extract_payload(&beats), expected);
}

proptest! {
    /// Chunking invariants hold for any request: chunks cover the request
    /// exactly, no chunk exceeds 32 DWORDs or crosses a 128-byte boundary,
    /// and every chunk after the first starts on one.
    #[test]
    fn proptest_read_chunking(len in 1usize..=1024, offset_dw in 0u32..32) {
        let address = 0x800 + offset_dw * 4;
        let first_chunk = len.min(32 - offset_dw as usize);
        let chunks = 1 + (len - first_chunk).div_ceil(32);
        let mut ctl = controller_with_ram(0, 16384);
        push_all(&mut ctl, mrd32(Region::Bar0, address, len, 0x1, 0x0));
        let beats = run_to_completions(&mut ctl, chunks, 8192);
        let headers = completion_headers(&beats);

        let mut addr = address;
        let mut remaining = len as u16;
        for (dword_len, byte_count, lower_addr) in &headers {
            prop_assert!(*dword_len >= 1 && *dword_len <= 32);
            // No chunk crosses a 128-byte boundary.
            prop_assert!((addr % 128) + u32::from(*dword_len) * 4 <= 128);
            prop_assert_eq!(*byte_count, (remaining * 4) & 0xfff);
            prop_assert_eq!(*lower_addr, (addr & 0x7f) as u8);
            addr += u32::from(*dword_len) * 4;
            remaining -= dword_len;
        }
        prop_assert_eq!(remaining, 0);
        // Every chunk after the first starts on a 128-byte boundary.
        let mut addr = address + u32::from(headers[0].0) * 4;
        for _ in &headers[1..] {
            prop_assert_eq!(addr % 128, 0);
            addr += 128;
        }
    }

    /// Written data reads back exactly, through the full pipeline.
    #[test]
    fn proptest_write_read_round_trip(
        payload in proptest::collection::vec(any::<u32>(), 1..=96),
        offset_dw in 0u32..32,
        latency in 0u8..=4,
    ) {
        let address = 0x400 + offset_dw * 4;
        let first_chunk = payload.len().min(32 - offset_dw as usize);
        let chunks = 1 + (payload.len() - first_chunk).div_ceil(32);
        let mut ctl = controller_with_ram(latency, 16384);
        push_all(&mut ctl, mwr32(Region::Bar0, address, &payload, 0b1111, 0b1111));
        push_all(&mut ctl, mrd32(Region::Bar0, address, payload.len(), 0x1, 0x0));
        let beats = run_to_completions(&mut ctl, chunks, 2048);
        prop_assert_eq!(extract_payload(&beats), payload);
    }
}
