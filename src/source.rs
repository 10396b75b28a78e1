//! Byte source abstraction for compressed input.
//!
//! Every decoder in this crate pulls compressed bytes through the
//! [`ByteSource`] trait: peek a window without consuming (`look`), consume
//! bytes previously peeked (`skip`), jump to an absolute offset in the
//! containing stream (`seek_to`), or read sequentially (`read`). The
//! orchestrator seeks once per coder to that coder's packed-stream start
//! and then consumes strictly sequentially.
//!
//! Two implementations are provided: [`SliceSource`] over an in-memory
//! buffer (zero-copy peeking) and [`LookReader`] over any seekable reader,
//! which maintains a small lookahead buffer so decoders can peek without
//! the underlying reader supporting it.

use std::io::{Read, Seek, SeekFrom};

use crate::{Error, Result};

/// Lookahead buffer size for [`LookReader`] (16 KiB).
const LOOK_BUF_SIZE: usize = 1 << 14;

/// A seekable, peekable source of compressed bytes.
///
/// Contract notes:
///
/// - `look` may return fewer bytes than requested, but returns an empty
///   slice only when the source is truly exhausted. Callers that still
///   expect data translate an empty result into
///   [`Error::InputExhausted`].
/// - `skip` may only consume bytes that a previous `look` exposed.
/// - A source must not be shared between concurrent folder decodes; each
///   decode owns its cursor.
pub trait ByteSource {
    /// Exposes up to `max` upcoming bytes without consuming them.
    fn look(&mut self, max: usize) -> Result<&[u8]>;

    /// Advances the read cursor past `n` bytes previously returned by
    /// [`look`](Self::look).
    fn skip(&mut self, n: usize) -> Result<()>;

    /// Repositions the cursor to an absolute byte offset.
    fn seek_to(&mut self, offset: u64) -> Result<()>;

    /// Bulk sequential read for consumers that do not need peek/skip
    /// semantics. Returns the number of bytes read; 0 only at end of
    /// stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let window = self.look(buf.len())?;
        let n = window.len().min(buf.len());
        buf[..n].copy_from_slice(&window[..n]);
        if n > 0 {
            self.skip(n)?;
        }
        Ok(n)
    }
}

/// In-memory byte source over a borrowed slice.
#[derive(Debug)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    /// Creates a source positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current cursor position.
    pub fn position(&self) -> u64 {
        self.pos as u64
    }
}

impl ByteSource for SliceSource<'_> {
    fn look(&mut self, max: usize) -> Result<&[u8]> {
        let end = self.data.len().min(self.pos + max);
        Ok(&self.data[self.pos..end])
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        if n > self.data.len() - self.pos {
            return Err(Error::data("skip past end of in-memory source"));
        }
        self.pos += n;
        Ok(())
    }

    fn seek_to(&mut self, offset: u64) -> Result<()> {
        if offset > self.data.len() as u64 {
            return Err(Error::data("seek past end of in-memory source"));
        }
        self.pos = offset as usize;
        Ok(())
    }
}

/// Buffered byte source over any `Read + Seek`, typically an archive file.
///
/// Keeps a 16 KiB lookahead window so decoders can peek bounded spans of
/// compressed data without extra syscalls per byte.
pub struct LookReader<R> {
    inner: R,
    buf: Box<[u8]>,
    /// Valid bytes in `buf`.
    len: usize,
    /// Consumed bytes in `buf`.
    pos: usize,
}

impl<R> std::fmt::Debug for LookReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookReader")
            .field("buffered", &(self.len - self.pos))
            .finish_non_exhaustive()
    }
}

impl<R: Read + Seek> LookReader<R> {
    /// Wraps a seekable reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: vec![0u8; LOOK_BUF_SIZE].into_boxed_slice(),
            len: 0,
            pos: 0,
        }
    }

    /// Consumes the adapter and returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self) -> Result<()> {
        if self.pos == self.len {
            self.len = 0;
            self.pos = 0;
        } else if self.pos > 0 {
            self.buf.copy_within(self.pos..self.len, 0);
            self.len -= self.pos;
            self.pos = 0;
        }
        while self.len < self.buf.len() {
            let n = self.inner.read(&mut self.buf[self.len..])?;
            if n == 0 {
                break;
            }
            self.len += n;
        }
        Ok(())
    }
}

impl<R: Read + Seek> ByteSource for LookReader<R> {
    fn look(&mut self, max: usize) -> Result<&[u8]> {
        if self.len - self.pos < max.min(self.buf.len()) {
            self.fill()?;
        }
        let end = self.len.min(self.pos + max);
        Ok(&self.buf[self.pos..end])
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        if n > self.len - self.pos {
            return Err(Error::data("skip past buffered lookahead"));
        }
        self.pos += n;
        Ok(())
    }

    fn seek_to(&mut self, offset: u64) -> Result<()> {
        // Drop the lookahead; the next look refills from the new position.
        self.len = 0;
        self.pos = 0;
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }
}

/// Bounded `std::io::Read` view over a byte source.
///
/// Limits consumption to one coder's declared packed size and converts the
/// peek/skip contract into plain sequential reads, which is what the
/// LZMA/LZMA2/PPMd backends consume. Reaching the bound reads as end of
/// stream; [`remaining`](Self::remaining) lets the caller verify afterwards
/// that the coder consumed exactly its declared window.
pub struct SourceReader<'a, S: ByteSource + ?Sized> {
    source: &'a mut S,
    remaining: u64,
}

impl<'a, S: ByteSource + ?Sized> SourceReader<'a, S> {
    /// Creates a reader over the next `limit` bytes of `source`.
    pub fn new(source: &'a mut S, limit: u64) -> Self {
        Self {
            source,
            remaining: limit,
        }
    }

    /// Bytes of the declared window not yet consumed.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<S: ByteSource + ?Sized> Read for SourceReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min(self.remaining.min(usize::MAX as u64) as usize);
        let window = self
            .source
            .look(max)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let n = window.len().min(max);
        buf[..n].copy_from_slice(&window[..n]);
        if n > 0 {
            self.source
                .skip(n)
                .map_err(|e| std::io::Error::other(e.to_string()))?;
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
