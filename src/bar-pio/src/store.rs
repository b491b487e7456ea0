// Copyright 2025 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Backing-store ports: the pluggable contract behind each BAR region.
//!
//! A store answers per-DWORD reads and writes. The read port has a fixed,
//! documented latency in clocks; the controller models that latency with an
//! explicit delay queue per region and requires every store sharing one
//! controller instance to declare the same value. Writes are fire-and-forget
//! and take effect in the cycle they are dispatched.

/// Contract every pluggable backing store must satisfy.
///
/// Implementations must answer `read_dword` deterministically and must not
/// vary `read_latency` over the lifetime of the store; the response
/// multiplexer assumes at most one store response becomes due per clock,
/// which holds by construction only under a uniform fixed latency.
pub trait BarStore: std::fmt::Debug {
    /// Fixed read-port latency in clocks.
    fn read_latency(&self) -> u8 {
        0
    }

    /// Read the DWORD at `addr` (4-byte aligned).
    fn read_dword(&mut self, addr: u32) -> u32;

    /// Write `data` to `addr`, modifying only the bytes enabled in the low
    /// 4 bits of `byte_enable` (bit 0 = least significant byte).
    fn write_dword(&mut self, addr: u32, byte_enable: u8, data: u32);
}

/// Memory-backed store: a flat little-endian byte array behind a BAR window.
///
/// Addresses wrap modulo the window size, mirroring how a device BAR decodes
/// only the low address bits. DWORDs are stored little-endian at their byte
/// offset.
#[derive(Debug, Clone)]
pub struct RamStore {
    mem: Vec<u8>,
    latency: u8,
}

impl RamStore {
    /// Zero-filled store of `size` bytes with a combinational (0-cycle) read
    /// port. `size` must be a non-zero multiple of 4.
    pub fn new(size: usize) -> RamStore {
        RamStore::with_latency(size, 0)
    }

    /// Zero-filled store with an explicit read latency.
    pub fn with_latency(size: usize, latency: u8) -> RamStore {
        assert!(size != 0 && size % 4 == 0);
        RamStore {
            mem: vec![0; size],
            latency,
        }
    }

    /// Window size in bytes.
    pub fn size(&self) -> usize {
        self.mem.len()
    }

    fn offset(&self, addr: u32) -> usize {
        (addr as usize) % self.mem.len()
    }
}

impl BarStore for RamStore {
    fn read_latency(&self) -> u8 {
        self.latency
    }

    fn read_dword(&mut self, addr: u32) -> u32 {
        let base = self.offset(addr & !0x3);
        let bytes: [u8; 4] = self.mem[base..base + 4].try_into().unwrap();
        u32::from_le_bytes(bytes)
    }

    fn write_dword(&mut self, addr: u32, byte_enable: u8, data: u32) {
        let base = self.offset(addr & !0x3);
        for (i, byte) in data.to_le_bytes().iter().enumerate() {
            if byte_enable & (1 << i) != 0 {
                self.mem[base + i] = *byte;
            }
        }
    }
}
