// Copyright 2025 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Wire-format types for the 128-bit TLP beat stream.
//!
//! A TLP travels through the data-plane as a contiguous sequence of
//! [`TlpBeat`]s: four DWORDs of packet data per beat plus a per-DWORD keep
//! mask, `first`/`last` framing markers and the BAR region the upstream
//! classifier resolved the address to. Beats of one TLP are never interleaved
//! with beats of another.
//!
//! Memory request headers occupy the first beat (3 DWORDs for 32-bit
//! addressing, 4 for 64-bit); completion headers are synthesized from
//! [`CplHeader`]. Header DWORDs are handled in their natural bit layout,
//! payload DWORDs of completions are byte-swapped to wire order before they
//! leave the device ([`to_wire_order`]). Write payload DWORDs are consumed
//! exactly as they arrive.

pub mod defs {
    /// Memory read request, 3-DW header (32-bit address).
    pub const FMT_TYPE_MRD32: u8 = 0x00;
    /// Memory read request, 4-DW header (64-bit address).
    pub const FMT_TYPE_MRD64: u8 = 0x20;
    /// Memory write request, 3-DW header.
    pub const FMT_TYPE_MWR32: u8 = 0x40;
    /// Memory write request, 4-DW header.
    pub const FMT_TYPE_MWR64: u8 = 0x60;
    /// Completion with data, 3-DW header.
    pub const FMT_TYPE_CPLD: u8 = 0x4A;

    /// DWORD length encoded as 0 in the 10-bit wire field.
    pub const MAX_REQ_DWORDS: u16 = 1024;
    /// Max completion payload per chunk: 128 bytes.
    pub const CPL_CHUNK_DWORDS: u16 = 32;
    /// Packet DWORDs carried per beat.
    pub const DWORDS_PER_BEAT: usize = 4;
}

/// TLP wire-format errors. The data path never surfaces these to a caller;
/// an unparseable ingress TLP is dropped and counted.
#[derive(Debug, thiserror::Error, displaydoc::Display)]
pub enum TlpError {
    /// Unsupported format/type field: {0:#04x}
    UnsupportedFmtType(u8),
    /// Header beat keep mask {0:#06b} does not cover a {1}-DW header
    ShortHeader(u8, u8),
}

/// BAR region a TLP is addressed to, as resolved by the upstream classifier.
///
/// Selector 0 means "not a BAR access" and is ignored by the controller;
/// selectors 1..=7 map to BAR0..BAR5 and the expansion ROM.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    #[default]
    None,
    Bar0,
    Bar1,
    Bar2,
    Bar3,
    Bar4,
    Bar5,
    Rom,
}

impl Region {
    /// All attachable regions, in selector order.
    pub const ALL: [Region; 7] = [
        Region::Bar0,
        Region::Bar1,
        Region::Bar2,
        Region::Bar3,
        Region::Bar4,
        Region::Bar5,
        Region::Rom,
    ];

    pub fn from_selector(selector: u8) -> Region {
        match selector {
            1 => Region::Bar0,
            2 => Region::Bar1,
            3 => Region::Bar2,
            4 => Region::Bar3,
            5 => Region::Bar4,
            6 => Region::Bar5,
            7 => Region::Rom,
            _ => Region::None,
        }
    }

    pub fn selector(self) -> u8 {
        match self {
            Region::None => 0,
            Region::Bar0 => 1,
            Region::Bar1 => 2,
            Region::Bar2 => 3,
            Region::Bar3 => 4,
            Region::Bar4 => 5,
            Region::Bar5 => 6,
            Region::Rom => 7,
        }
    }

    /// Slot index into the controller's port table, `None` for selector 0.
    pub fn index(self) -> Option<usize> {
        match self {
            Region::None => None,
            other => Some(usize::from(other.selector()) - 1),
        }
    }
}

/// One 128-bit beat of TLP data.
///
/// `keep` is the per-DWORD valid mask (bit 0 = `data[0]`); valid DWORDs are
/// contiguous from slot 0. `first` starts a new TLP, `last` ends the current
/// one; a single-beat TLP carries both.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TlpBeat {
    pub data: [u32; 4],
    pub keep: u8,
    pub first: bool,
    pub last: bool,
    pub region: Region,
}

impl TlpBeat {
    /// Number of valid DWORDs in this beat.
    pub fn dword_count(&self) -> usize {
        (self.keep & 0xf).count_ones() as usize
    }
}

/// Which memory operation a request header encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOp {
    Read,
    Write,
}

/// Parsed memory request header (the first beat of a MRd/MWr TLP).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryHeader {
    pub op: MemoryOp,
    pub is_4dw: bool,
    /// Requested length in DWORDs, 1..=1024 (wire value 0 decodes to 1024).
    pub dword_len: u16,
    pub requester_id: u16,
    pub tag: u8,
    pub first_be: u8,
    pub last_be: u8,
    /// 4-byte-aligned byte address. For 4-DW headers the upper 32 address
    /// bits are ignored; BAR space is below 4 GiB.
    pub address: u32,
}

impl MemoryHeader {
    /// Parse the header DWORDs out of the first beat of a memory TLP.
    pub fn parse(beat: &TlpBeat) -> Result<MemoryHeader, TlpError> {
        let dw0 = beat.data[0];
        let fmt_type = (dw0 >> 24) as u8;
        let (op, is_4dw) = match fmt_type {
            defs::FMT_TYPE_MRD32 => (MemoryOp::Read, false),
            defs::FMT_TYPE_MRD64 => (MemoryOp::Read, true),
            defs::FMT_TYPE_MWR32 => (MemoryOp::Write, false),
            defs::FMT_TYPE_MWR64 => (MemoryOp::Write, true),
            other => return Err(TlpError::UnsupportedFmtType(other)),
        };

        let header_dwords: u8 = if is_4dw { 4 } else { 3 };
        let header_mask = (1u8 << header_dwords) - 1;
        if beat.keep & header_mask != header_mask {
            return Err(TlpError::ShortHeader(beat.keep, header_dwords));
        }

        let mut dword_len = (dw0 & 0x3ff) as u16;
        if dword_len == 0 {
            dword_len = defs::MAX_REQ_DWORDS;
        }

        let dw1 = beat.data[1];
        let address = if is_4dw { beat.data[3] } else { beat.data[2] } & !0x3;

        Ok(MemoryHeader {
            op,
            is_4dw,
            dword_len,
            requester_id: (dw1 >> 16) as u16,
            tag: (dw1 >> 8) as u8,
            first_be: (dw1 & 0xf) as u8,
            last_be: ((dw1 >> 4) & 0xf) as u8,
            address,
        })
    }

    /// Beat slot the first payload DWORD occupies: 3 for a 3-DW header
    /// (payload starts in the header beat), 4 for a 4-DW header (payload
    /// starts in the next beat).
    pub fn payload_start_slot(&self) -> usize {
        if self.is_4dw { 4 } else { 3 }
    }
}

/// Header fields of one outbound completion TLP (one per chunk).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CplHeader {
    pub completer_id: u16,
    pub requester_id: u16,
    pub tag: u8,
    /// DWORDs carried by this completion: the chunk length, not the request's.
    pub dword_len: u16,
    /// Bytes remaining for the request including this chunk. 12-bit wire
    /// field; 4096 encodes as 0.
    pub byte_count: u16,
    /// Low 7 bits of the chunk's starting byte address.
    pub lower_addr: u8,
}

impl CplHeader {
    /// Pack the three header DWORDs of a CplD TLP. Completion status is
    /// always Successful Completion; BCM is never set.
    pub fn pack(&self) -> [u32; 3] {
        let dw0 = (u32::from(defs::FMT_TYPE_CPLD) << 24) | u32::from(self.dword_len & 0x3ff);
        let dw1 = (u32::from(self.completer_id) << 16) | u32::from(self.byte_count & 0xfff);
        let dw2 = (u32::from(self.requester_id) << 16)
            | (u32::from(self.tag) << 8)
            | u32::from(self.lower_addr & 0x7f);
        [dw0, dw1, dw2]
    }
}

/// Byte-swap a payload DWORD into wire order.
pub fn to_wire_order(dword: u32) -> u32 {
    dword.swap_bytes()
}
