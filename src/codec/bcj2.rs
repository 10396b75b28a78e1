//! BCJ2 four-stream branch filter (decode side).
//!
//! BCJ2 splits filtered x86 code across four streams:
//!
//! - **main** — the code with `E8`/`E9`/`0F 8x` opcodes but without the
//!   displacement fields of converted instructions;
//! - **call** — absolute `CALL` targets, 4 bytes big-endian each;
//! - **jump** — absolute `JMP`/`Jcc` targets, 4 bytes big-endian each;
//! - **control** — a range-coded bit per candidate opcode saying whether
//!   its displacement was converted.
//!
//! The decoder walks the main stream byte by byte. Whenever the previous
//! and current bytes form a branch candidate it consults the range
//! decoder: bit 0 means the bytes pass through untouched, bit 1 means the
//! next 4 output bytes are a displacement reconstructed from the call or
//! jump stream, rebased from absolute to relative against the current
//! output position.
//!
//! The range decoder follows the reference renormalization rule exactly:
//! 32-bit range, top-byte normalization at `2^24` before every bit,
//! 11-bit probability scale with a 5-bit adaptation shift, 256 adaptive
//! contexts indexed by the byte preceding an `E8` plus one context each
//! for `E9` and `Jcc`, all initialized to the midpoint, and a 5-byte code
//! preload.
//!
//! [`Bcj2Decoder`] is resumable: its registers, the previous output byte
//! and the per-stream cursors persist across
//! [`decode_into`](Bcj2Decoder::decode_into) calls, so output can be
//! drained in bounded chunks. A splice interrupted by a chunk boundary
//! continues in the next call.

use crate::{Error, Result};

const NUM_TOP_BITS: u32 = 24;
const TOP_VALUE: u32 = 1 << NUM_TOP_BITS;
const NUM_BIT_MODEL_TOTAL_BITS: u32 = 11;
const BIT_MODEL_TOTAL: u32 = 1 << NUM_BIT_MODEL_TOTAL_BITS;
const NUM_MOVE_BITS: u32 = 5;

/// 256 previous-byte contexts for E8, one for E9, one for Jcc.
const NUM_CONTEXTS: usize = 256 + 2;

#[inline]
fn is_branch(prev: u8, b: u8) -> bool {
    (b & 0xFE) == 0xE8 || (prev == 0x0F && (b & 0xF0) == 0x80)
}

#[inline]
fn context_index(prev: u8, b: u8) -> usize {
    match b {
        0xE8 => prev as usize,
        0xE9 => 256,
        _ => 257,
    }
}

/// Resumable BCJ2 recombiner over four fully-materialized input streams.
pub struct Bcj2Decoder<'a> {
    main: &'a [u8],
    call: &'a [u8],
    jump: &'a [u8],
    control: &'a [u8],

    probs: [u16; NUM_CONTEXTS],
    range: u32,
    code: u32,

    main_pos: usize,
    call_pos: usize,
    jump_pos: usize,
    control_pos: usize,

    prev_byte: u8,
    /// Total output bytes emitted, for absolute→relative rebasing.
    out_total: u32,
    /// Splice bytes decoded but not yet emitted (chunk boundary hit
    /// mid-displacement).
    pending: [u8; 4],
    pending_len: usize,
}

impl<'a> std::fmt::Debug for Bcj2Decoder<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bcj2Decoder")
            .field("main_pos", &self.main_pos)
            .field("out_total", &self.out_total)
            .finish_non_exhaustive()
    }
}

impl<'a> Bcj2Decoder<'a> {
    /// Creates a decoder over the four streams, preloading the range
    /// decoder from the control stream.
    pub fn new(main: &'a [u8], call: &'a [u8], jump: &'a [u8], control: &'a [u8]) -> Result<Self> {
        if control.len() < 5 {
            return Err(Error::data(
                "BCJ2 control stream shorter than range decoder preload",
            ));
        }
        let mut code = 0u32;
        for &b in &control[..5] {
            code = (code << 8) | u32::from(b);
        }
        Ok(Self {
            main,
            call,
            jump,
            control,
            probs: [(BIT_MODEL_TOTAL >> 1) as u16; NUM_CONTEXTS],
            range: 0xFFFF_FFFF,
            code,
            main_pos: 0,
            call_pos: 0,
            jump_pos: 0,
            control_pos: 5,
            prev_byte: 0,
            out_total: 0,
            pending: [0; 4],
            pending_len: 0,
        })
    }

    /// Bytes consumed from the main stream so far.
    pub fn main_consumed(&self) -> usize {
        self.main_pos
    }

    /// Bytes consumed from the call stream so far.
    pub fn call_consumed(&self) -> usize {
        self.call_pos
    }

    /// Bytes consumed from the jump stream so far.
    pub fn jump_consumed(&self) -> usize {
        self.jump_pos
    }

    /// Bytes consumed from the control stream so far.
    pub fn control_consumed(&self) -> usize {
        self.control_pos
    }

    fn decode_bit(&mut self, idx: usize) -> Result<u32> {
        if self.range < TOP_VALUE {
            let b = *self.control.get(self.control_pos).ok_or_else(|| {
                Error::data("BCJ2 control stream exhausted before the output completed")
            })?;
            self.control_pos += 1;
            self.range <<= 8;
            self.code = (self.code << 8) | u32::from(b);
        }
        let ttt = u32::from(self.probs[idx]);
        let bound = (self.range >> NUM_BIT_MODEL_TOTAL_BITS) * ttt;
        if self.code < bound {
            self.range = bound;
            self.probs[idx] = (ttt + ((BIT_MODEL_TOTAL - ttt) >> NUM_MOVE_BITS)) as u16;
            Ok(0)
        } else {
            self.range -= bound;
            self.code -= bound;
            self.probs[idx] = (ttt - (ttt >> NUM_MOVE_BITS)) as u16;
            Ok(1)
        }
    }

    /// Decodes into `out`, returning the number of bytes produced.
    ///
    /// Produces fewer than `out.len()` bytes only when the main stream is
    /// exhausted; the caller compares the cumulative count against the
    /// folder's declared size. Over-reading the call, jump or control
    /// stream is a data error.
    pub fn decode_into(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut n = 0;

        while n < out.len() {
            // Displacement bytes left over from the previous chunk.
            if self.pending_len > 0 {
                out[n] = self.pending[4 - self.pending_len];
                n += 1;
                self.pending_len -= 1;
                self.out_total = self.out_total.wrapping_add(1);
                continue;
            }

            let Some(&b) = self.main.get(self.main_pos) else {
                break;
            };
            self.main_pos += 1;
            out[n] = b;
            n += 1;
            self.out_total = self.out_total.wrapping_add(1);

            if !is_branch(self.prev_byte, b) {
                self.prev_byte = b;
                continue;
            }

            let bit = self.decode_bit(context_index(self.prev_byte, b))?;
            if bit == 0 {
                self.prev_byte = b;
                continue;
            }

            // Converted instruction: splice the displacement in.
            let (stream, pos) = if b == 0xE8 {
                (self.call, &mut self.call_pos)
            } else {
                (self.jump, &mut self.jump_pos)
            };
            let src = stream.get(*pos..*pos + 4).ok_or_else(|| {
                Error::data("BCJ2 target stream exhausted before the output completed")
            })?;
            *pos += 4;

            let absolute = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
            let relative = absolute.wrapping_sub(self.out_total.wrapping_add(4));

            self.pending = relative.to_le_bytes();
            self.pending_len = 4;
            self.prev_byte = (relative >> 24) as u8;
        }

        Ok(n)
    }
}
