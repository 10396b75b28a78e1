//! Primitive decoders and branch filters.
//!
//! Each main coder (Copy, LZMA, LZMA2, PPMd) decodes one bounded window
//! of compressed input into exactly its declared unpacked size. There is
//! one canonical decode loop, parameterized over an `emit` callback, so
//! the in-memory and streamed-to-sink paths share the same code and
//! produce byte-identical output; the callback either appends to a buffer
//! or hands chunks to the output sink.

pub mod branch;
pub mod bcj2;
pub(crate) mod copy;

#[cfg(feature = "lzma")]
pub(crate) mod lzma;

#[cfg(feature = "ppmd")]
pub(crate) mod ppmd;

use crate::folder::{Coder, method};
use crate::source::ByteSource;
use crate::{Error, Result};

/// Output chunk size for the canonical decode loop (1 MiB).
pub(crate) const OUT_CHUNK_SIZE: usize = 1 << 20;

/// Allocates a zeroed buffer, reporting allocation failure as
/// [`Error::Memory`] instead of aborting.
pub(crate) fn alloc_buf(size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size).map_err(|_| Error::Memory)?;
    buf.resize(size, 0);
    Ok(buf)
}

/// Allocates the scratch chunk for a decode of `out_size` bytes.
pub(crate) fn alloc_chunk(out_size: u64) -> Result<Vec<u8>> {
    alloc_buf(out_size.min(OUT_CHUNK_SIZE as u64) as usize)
}

/// Drives a decoder until `out_size` bytes were produced or it reports
/// end of stream, handing every chunk to `emit`. Returns the number of
/// bytes produced; the caller decides whether a short count is data
/// corruption or input exhaustion.
pub(crate) fn drive_chunks(
    reader: &mut dyn std::io::Read,
    out_size: u64,
    emit: &mut dyn FnMut(&[u8]) -> Result<()>,
) -> Result<u64> {
    let mut chunk = alloc_chunk(out_size)?;
    let mut produced = 0u64;
    while produced < out_size {
        let want = chunk.len().min((out_size - produced) as usize);
        let n = reader
            .read(&mut chunk[..want])
            .map_err(|e| Error::data(format!("decoder failed: {e}")))?;
        if n == 0 {
            break;
        }
        emit(&chunk[..n])?;
        produced += n as u64;
    }
    Ok(produced)
}

/// Decodes one main coder's packed window through `emit`.
///
/// The source must already be positioned at the coder's packed-stream
/// start. Exactly `out_size` bytes are emitted, or an error is returned:
/// a decoder terminating early on a live source, running past the
/// declared size, or leaving the mandated consumption checks unsatisfied
/// is [`Error::Data`]; a dry source is [`Error::InputExhausted`].
pub(crate) fn decode_main_coder<S: ByteSource + ?Sized>(
    coder: &Coder,
    in_size: u64,
    source: &mut S,
    out_size: u64,
    emit: &mut dyn FnMut(&[u8]) -> Result<()>,
) -> Result<()> {
    match coder.method_id {
        method::COPY => copy::decode(in_size, source, out_size, emit),

        #[cfg(feature = "lzma")]
        method::LZMA => lzma::decode_lzma(coder, in_size, source, out_size, emit),

        #[cfg(feature = "lzma")]
        method::LZMA2 => lzma::decode_lzma2(coder, in_size, source, out_size, emit),

        #[cfg(feature = "ppmd")]
        method::PPMD => ppmd::decode(coder, in_size, source, out_size, emit),

        other => Err(Error::UnsupportedCoder { method_id: other }),
    }
}

/// Decodes one main coder's packed window into a fresh buffer.
pub(crate) fn decode_main_coder_to_vec<S: ByteSource + ?Sized>(
    coder: &Coder,
    in_size: u64,
    source: &mut S,
    out_size: u64,
) -> Result<Vec<u8>> {
    let size = usize::try_from(out_size).map_err(|_| Error::Memory)?;
    let mut out = Vec::new();
    out.try_reserve_exact(size).map_err(|_| Error::Memory)?;
    decode_main_coder(coder, in_size, source, out_size, &mut |chunk| {
        out.extend_from_slice(chunk);
        Ok(())
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::Coder;
    use crate::source::SliceSource;

    #[test]
    fn test_decode_main_coder_copy() {
        let data = b"pass-through payload";
        let coder = Coder::simple(method::COPY, None);
        let mut src = SliceSource::new(data);
        let out =
            decode_main_coder_to_vec(&coder, data.len() as u64, &mut src, data.len() as u64)
                .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_decode_main_coder_unknown_method() {
        let coder = Coder::simple(0x040202, None); // BZip2
        let mut src = SliceSource::new(&[]);
        let err = decode_main_coder_to_vec(&coder, 0, &mut src, 0).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCoder { method_id: 0x040202 }));
    }

    #[test]
    fn test_drive_chunks_counts_output() {
        let data = vec![0xABu8; 3000];
        let mut reader = &data[..];
        let mut collected = Vec::new();
        let produced = drive_chunks(&mut reader, 2500, &mut |c| {
            collected.extend_from_slice(c);
            Ok(())
        })
        .unwrap();
        assert_eq!(produced, 2500);
        assert_eq!(collected.len(), 2500);
    }
}
