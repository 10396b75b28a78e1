//! Shared fixture builders for folder-decode integration tests.
//!
//! The crate has no write path, so the fixtures are produced here: LZMA
//! and LZMA2 streams via `lzma-rust2`'s writers, and BCJ2 stream sets via
//! a minimal reference-compatible encoder.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::io::Write;

use zevenfold::{BindPair, Coder, Folder, method};

#[cfg(feature = "lzma")]
pub fn lzma_compress(data: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut opts = lzma_rust2::LzmaOptions::with_preset(1);
    // Small dictionary so modest payloads span several dictionary sizes.
    opts.dict_size = 64 * 1024;
    let mut props = vec![opts.get_props()];
    props.extend_from_slice(&opts.dict_size.to_le_bytes());

    let mut compressed = Vec::new();
    let mut writer = lzma_rust2::LzmaWriter::new_no_header(&mut compressed, &opts, true).unwrap();
    writer.write_all(data).unwrap();
    writer.finish().unwrap();
    (compressed, props)
}

#[cfg(feature = "lzma")]
pub fn lzma2_compress(data: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut opts = lzma_rust2::Lzma2Options::with_preset(1);
    opts.lzma_options.dict_size = 64 * 1024;
    let dict_size = opts.lzma_options.dict_size;
    let prop = lzma2_dict_prop(dict_size);

    let mut compressed = Vec::new();
    let mut writer = lzma_rust2::Lzma2Writer::new(&mut compressed, opts);
    writer.write_all(data).unwrap();
    writer.finish().unwrap();
    (compressed, vec![prop])
}

/// Smallest LZMA2 dictionary property byte covering `dict_size`.
#[cfg(feature = "lzma")]
fn lzma2_dict_prop(dict_size: u32) -> u8 {
    for prop in 0..40u8 {
        let base_log = u32::from(prop) / 2 + 12;
        let size = if prop % 2 == 0 {
            1u32 << base_log
        } else {
            3u32 << (base_log - 1)
        };
        if size >= dict_size {
            return prop;
        }
    }
    40
}

/// Single-coder folder over one pack stream.
pub fn single_folder(method_id: u64, props: Option<Vec<u8>>, unpack_size: u64) -> Folder {
    Folder {
        coders: vec![Coder::simple(method_id, props)],
        bind_pairs: Vec::new(),
        packed_streams: vec![0],
        unpack_sizes: vec![unpack_size],
        unpack_crc: None,
    }
}

/// Codec + branch-filter folder (coder 0 main, coder 1 filter).
pub fn filtered_folder(
    main_method: u64,
    props: Option<Vec<u8>>,
    filter_method: u64,
    unpack_size: u64,
) -> Folder {
    Folder {
        coders: vec![
            Coder::simple(main_method, props),
            Coder::simple(filter_method, None),
        ],
        bind_pairs: vec![BindPair {
            in_index: 1,
            out_index: 0,
        }],
        packed_streams: vec![0],
        unpack_sizes: vec![unpack_size, unpack_size],
        unpack_crc: None,
    }
}

// ==========================================================================
// BCJ2 fixture encoder
// ==========================================================================

const TOP_VALUE: u32 = 1 << 24;
const BIT_MODEL_TOTAL: u32 = 1 << 11;
const NUM_MOVE_BITS: u32 = 5;

struct RangeEncoder {
    range: u32,
    low: u64,
    cache: u8,
    cache_size: u32,
    out: Vec<u8>,
}

impl RangeEncoder {
    fn new() -> Self {
        Self {
            range: 0xFFFF_FFFF,
            low: 0,
            cache: 0,
            cache_size: 1,
            out: Vec::new(),
        }
    }

    fn encode_bit(&mut self, bit: bool, prob: &mut u16) {
        let ttt = u32::from(*prob);
        let bound = (self.range >> 11) * ttt;
        if bit {
            self.low += u64::from(bound);
            self.range -= bound;
            *prob = (ttt - (ttt >> NUM_MOVE_BITS)) as u16;
        } else {
            self.range = bound;
            *prob = (ttt + ((BIT_MODEL_TOTAL - ttt) >> NUM_MOVE_BITS)) as u16;
        }
        while self.range < TOP_VALUE {
            self.shift_low();
            self.range <<= 8;
        }
    }

    fn shift_low(&mut self) {
        let low32 = self.low as u32;
        let high = (self.low >> 32) as u8;
        self.low = u64::from(low32 << 8);
        if low32 < 0xFF00_0000 || high != 0 {
            self.out.push(self.cache.wrapping_add(high));
            for _ in 1..self.cache_size {
                self.out.push(0xFFu8.wrapping_add(high));
            }
            self.cache = (low32 >> 24) as u8;
            self.cache_size = 0;
        }
        self.cache_size += 1;
    }

    fn finish(mut self) -> Vec<u8> {
        for _ in 0..5 {
            self.shift_low();
        }
        self.out
    }
}

pub struct Bcj2Streams {
    pub main: Vec<u8>,
    pub call: Vec<u8>,
    pub jump: Vec<u8>,
    pub control: Vec<u8>,
}

fn is_branch(prev: u8, b: u8) -> bool {
    (b & 0xFE) == 0xE8 || (prev == 0x0F && (b & 0xF0) == 0x80)
}

fn context_index(prev: u8, b: u8) -> usize {
    match b {
        0xE8 => prev as usize,
        0xE9 => 256,
        _ => 257,
    }
}

/// Splits x86-ish bytes into the four BCJ2 streams, converting every
/// branch candidate that has a complete displacement behind it.
pub fn bcj2_encode(data: &[u8]) -> Bcj2Streams {
    let mut main = Vec::new();
    let mut call = Vec::new();
    let mut jump = Vec::new();
    let mut rc = RangeEncoder::new();
    let mut probs = [(BIT_MODEL_TOTAL >> 1) as u16; 258];

    let mut prev = 0u8;
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        main.push(b);
        if is_branch(prev, b) {
            let idx = context_index(prev, b);
            let convert = i + 4 < data.len();
            rc.encode_bit(convert, &mut probs[idx]);
            if convert {
                let rel =
                    u32::from_le_bytes([data[i + 1], data[i + 2], data[i + 3], data[i + 4]]);
                let abs = rel.wrapping_add(i as u32 + 5);
                let dest = if b == 0xE8 { &mut call } else { &mut jump };
                dest.extend_from_slice(&abs.to_be_bytes());
                prev = data[i + 4];
                i += 5;
                continue;
            }
        }
        prev = b;
        i += 1;
    }

    Bcj2Streams {
        main,
        call,
        jump,
        control: rc.finish(),
    }
}

/// Builds a complete four-coder BCJ2 folder whose feeders are LZMA
/// coders. Returns the folder, its pack-size table and the packed blob.
#[cfg(feature = "lzma")]
pub fn bcj2_lzma_folder(original: &[u8]) -> (Folder, Vec<u64>, Vec<u8>) {
    let streams = bcj2_encode(original);

    let (main_c, main_p) = lzma_compress(&streams.main);
    let (call_c, call_p) = lzma_compress(&streams.call);
    let (jump_c, jump_p) = lzma_compress(&streams.jump);

    let folder = Folder {
        coders: vec![
            Coder::simple(method::LZMA, Some(jump_p)),
            Coder::simple(method::LZMA, Some(call_p)),
            Coder::simple(method::LZMA, Some(main_p)),
            Coder {
                method_id: method::BCJ2,
                num_in_streams: 4,
                num_out_streams: 1,
                properties: None,
            },
        ],
        bind_pairs: vec![
            BindPair { in_index: 5, out_index: 0 },
            BindPair { in_index: 4, out_index: 1 },
            BindPair { in_index: 3, out_index: 2 },
        ],
        packed_streams: vec![2, 6, 1, 0],
        unpack_sizes: vec![
            streams.jump.len() as u64,
            streams.call.len() as u64,
            streams.main.len() as u64,
            original.len() as u64,
        ],
        unpack_crc: None,
    };

    // Pack slots: 0 = main, 1 = control (raw), 2 = call, 3 = jump.
    let pack_sizes = vec![
        main_c.len() as u64,
        streams.control.len() as u64,
        call_c.len() as u64,
        jump_c.len() as u64,
    ];
    let mut packed = Vec::new();
    packed.extend_from_slice(&main_c);
    packed.extend_from_slice(&streams.control);
    packed.extend_from_slice(&call_c);
    packed.extend_from_slice(&jump_c);

    (folder, pack_sizes, packed)
}

/// Encode-direction x86 branch conversion for fixture building: the
/// exact inverse of the crate's BCJ decode transform.
pub fn bcj_x86_encode(buf: &mut [u8]) {
    let len = buf.len();
    if len < 5 {
        return;
    }
    let mut pos = 0usize;
    let mut mask = 0u32;
    loop {
        let p = pos;
        while pos < len - 4 {
            if buf[pos] & 0xFE == 0xE8 {
                break;
            }
            pos += 1;
        }
        let d = pos - p;
        if pos >= len - 4 {
            return;
        }
        if d > 2 {
            mask = 0;
        } else {
            mask >>= d;
            if mask != 0
                && (mask > 4 || mask == 3 || test_ms_byte(buf[pos + (mask >> 1) as usize + 1]))
            {
                mask = (mask >> 1) | 4;
                pos += 1;
                continue;
            }
        }
        if test_ms_byte(buf[pos + 4]) {
            let mut v =
                u32::from_le_bytes([buf[pos + 1], buf[pos + 2], buf[pos + 3], buf[pos + 4]]);
            let cur = (pos as u32).wrapping_add(5);
            pos += 5;
            v = v.wrapping_add(cur);
            if mask != 0 {
                let sh = (mask & 6) << 2;
                if test_ms_byte((v >> sh) as u8) {
                    v ^= (0x100u32 << sh).wrapping_sub(1);
                    v = v.wrapping_add(cur);
                }
                mask = 0;
            }
            let bytes = v.to_le_bytes();
            buf[pos - 4] = bytes[0];
            buf[pos - 3] = bytes[1];
            buf[pos - 2] = bytes[2];
            buf[pos - 1] = 0u8.wrapping_sub(bytes[3] & 1);
        } else {
            mask = (mask >> 1) | 4;
            pos += 1;
        }
    }
}

fn test_ms_byte(b: u8) -> bool {
    b.wrapping_add(1) & 0xFE == 0
}

/// A synthetic x86 code block with plenty of CALL/JMP sites.
pub fn sample_x86_code(len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    let mut i = 0u32;
    while data.len() < len {
        data.extend_from_slice(&[0x55, 0x48, 0x89, 0xE5]);
        data.push(0xE8);
        data.extend_from_slice(&(i * 0x40).to_le_bytes());
        data.extend_from_slice(&[0x85, 0xC0, 0x74, 0x05]);
        data.push(0xE9);
        data.extend_from_slice(&(i * 0x11 + 7).to_le_bytes());
        data.extend_from_slice(&[0x31, 0xC0, 0x5D, 0xC3]);
        i = i.wrapping_add(1);
    }
    data.truncate(len);
    data
}
