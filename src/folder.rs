//! Folder, coder and bind-pair descriptions.
//!
//! These structures describe one independently-decodable compressed block
//! of a 7z archive. They are produced by archive-metadata parsing (out of
//! scope here) and are read-only input to decoding: an ordered list of
//! coders, the bind pairs wiring coder outputs to coder inputs, the
//! pack-stream assignment for unbound inputs, and the declared unpacked
//! size of every coder output.

use crate::{Error, Result};

/// Method IDs for the coders this decoder knows about.
///
/// The identifier space is fixed by the 7z format; the big-endian byte
/// sequence stored in the archive header is folded into a `u64`.
pub mod method {
    /// Copy (no compression).
    pub const COPY: u64 = 0x00;
    /// LZMA2 compression.
    pub const LZMA2: u64 = 0x21;
    /// LZMA compression.
    pub const LZMA: u64 = 0x030101;
    /// PPMd (H variant) compression.
    pub const PPMD: u64 = 0x030401;
    /// BCJ (x86) branch filter.
    pub const BCJ_X86: u64 = 0x03030103;
    /// BCJ (PowerPC) branch filter. Recognized, not implemented.
    pub const BCJ_PPC: u64 = 0x03030205;
    /// BCJ (ARM) branch filter.
    pub const BCJ_ARM: u64 = 0x03030501;
    /// BCJ (ARM Thumb) branch filter. Recognized, not implemented.
    pub const BCJ_ARM_THUMB: u64 = 0x03030701;
    /// BCJ (SPARC) branch filter. Recognized, not implemented.
    pub const BCJ_SPARC: u64 = 0x03030805;
    /// BCJ2 (4-stream x86) branch filter.
    pub const BCJ2: u64 = 0x0303011B;

    /// Returns a human-readable name for a method ID.
    pub fn name(id: u64) -> &'static str {
        match id {
            COPY => "Copy",
            LZMA => "LZMA",
            LZMA2 => "LZMA2",
            PPMD => "PPMd",
            BCJ_X86 => "BCJ (x86)",
            BCJ_PPC => "BCJ (PowerPC)",
            BCJ_ARM => "BCJ (ARM)",
            BCJ_ARM_THUMB => "BCJ (ARM Thumb)",
            BCJ_SPARC => "BCJ (SPARC)",
            BCJ2 => "BCJ2",
            _ => "Unknown",
        }
    }
}

/// One transform stage of a folder's pipeline.
#[derive(Debug, Clone)]
pub struct Coder {
    /// 7z method identifier (see [`method`]).
    pub method_id: u64,
    /// Number of input streams this coder consumes.
    pub num_in_streams: u64,
    /// Number of output streams this coder produces.
    pub num_out_streams: u64,
    /// Codec-specific property blob (e.g. LZMA dictionary size and
    /// literal-context bits), if present.
    pub properties: Option<Vec<u8>>,
}

impl Coder {
    /// Creates a plain 1-in/1-out coder.
    pub fn simple(method_id: u64, properties: Option<Vec<u8>>) -> Self {
        Self {
            method_id,
            num_in_streams: 1,
            num_out_streams: 1,
            properties,
        }
    }

    /// The property blob, or an empty slice when absent.
    pub fn props(&self) -> &[u8] {
        self.properties.as_deref().unwrap_or(&[])
    }
}

/// A directed edge stating "coder input stream `in_index` is fed by coder
/// output stream `out_index`".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindPair {
    /// Global index of the consuming input stream.
    pub in_index: u64,
    /// Global index of the producing output stream.
    pub out_index: u64,
}

/// A folder: one independently-decodable compressed block.
///
/// Input/output stream indices are global across the coder list, assigned
/// in declaration order (coder 0's inputs first, then coder 1's, ...).
#[derive(Debug, Clone)]
pub struct Folder {
    /// Coders in declaration order.
    pub coders: Vec<Coder>,
    /// Edges wiring coder outputs to coder inputs.
    pub bind_pairs: Vec<BindPair>,
    /// For each top-level packed stream, the global input stream index it
    /// feeds.
    pub packed_streams: Vec<u64>,
    /// Declared unpacked size of each coder output stream, in global
    /// output stream order.
    pub unpack_sizes: Vec<u64>,
    /// Optional CRC-32 of the folder's final unpacked bytes.
    pub unpack_crc: Option<u32>,
}

impl Folder {
    /// Returns the total number of input streams across all coders.
    pub fn total_in_streams(&self) -> u64 {
        self.coders.iter().map(|c| c.num_in_streams).sum()
    }

    /// Returns the total number of output streams across all coders.
    pub fn total_out_streams(&self) -> u64 {
        self.coders.iter().map(|c| c.num_out_streams).sum()
    }

    /// Returns `(first_in_stream, first_out_stream)` global indices for
    /// each coder.
    pub fn coder_stream_offsets(&self) -> Vec<(u64, u64)> {
        let mut result = Vec::with_capacity(self.coders.len());
        let mut in_offset = 0;
        let mut out_offset = 0;
        for coder in &self.coders {
            result.push((in_offset, out_offset));
            in_offset += coder.num_in_streams;
            out_offset += coder.num_out_streams;
        }
        result
    }

    /// Finds the bind pair feeding the given global input stream, if any.
    pub fn find_bind_pair_for_in_stream(&self, in_stream: u64) -> Option<&BindPair> {
        self.bind_pairs.iter().find(|bp| bp.in_index == in_stream)
    }

    /// Returns the packed-stream slot feeding the given global input
    /// stream, if any.
    pub fn find_packed_stream_index(&self, in_stream: u64) -> Option<usize> {
        self.packed_streams.iter().position(|&ps| ps == in_stream)
    }

    /// Index of the coder whose output is the folder's final output: the
    /// one output stream no bind pair consumes.
    pub fn main_coder_index(&self) -> Option<usize> {
        let offsets = self.coder_stream_offsets();
        for (ci, coder) in self.coders.iter().enumerate() {
            let first_out = offsets[ci].1;
            for local in 0..coder.num_out_streams {
                let out = first_out + local;
                if !self.bind_pairs.iter().any(|bp| bp.out_index == out) {
                    return Some(ci);
                }
            }
        }
        None
    }

    /// Declared size of the folder's final unpacked output.
    pub fn final_unpack_size(&self) -> Result<u64> {
        let ci = self
            .main_coder_index()
            .ok_or_else(|| Error::data("folder has no unbound output stream"))?;
        // 1-out coders only in every supported shape, so the output stream
        // index equals the coder's first output offset.
        let out = self.coder_stream_offsets()[ci].1 as usize;
        self.unpack_sizes
            .get(out)
            .copied()
            .ok_or_else(|| Error::data("folder is missing a declared unpack size"))
    }

    /// Declared unpacked size of coder `ci`'s (single) output stream.
    pub fn coder_unpack_size(&self, ci: usize) -> Result<u64> {
        let out = self.coder_stream_offsets()[ci].1 as usize;
        self.unpack_sizes
            .get(out)
            .copied()
            .ok_or_else(|| Error::data("folder is missing a declared unpack size"))
    }
}

/// Byte offset of pack stream `index` within the folder's packed region:
/// the prefix sum of the preceding pack sizes.
pub(crate) fn pack_offset(pack_sizes: &[u64], index: usize) -> u64 {
    pack_sizes[..index].iter().sum()
}
