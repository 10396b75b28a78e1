//! PPMd (H variant) coder adapter.
//!
//! The model itself comes from `ppmd-rust`; this module validates the
//! 5-byte property blob (1 byte model order, 4 bytes little-endian memory
//! size), feeds the decoder through the bounded peek/skip-to-read adapter
//! and enforces the format's consumption rule: a PPMd coder must consume
//! exactly its declared packed size while producing exactly its declared
//! unpacked size. PPMd has no end-of-stream marker, so both bounds are
//! load-bearing.

use ppmd_rust::{PPMD7_MAX_MEM_SIZE, PPMD7_MAX_ORDER, PPMD7_MIN_MEM_SIZE, PPMD7_MIN_ORDER};

use crate::codec::drive_chunks;
use crate::folder::{Coder, method};
use crate::source::{ByteSource, SourceReader};
use crate::{Error, Result};

/// Decodes one PPMd coder window through `emit`.
pub(crate) fn decode<S: ByteSource + ?Sized>(
    coder: &Coder,
    in_size: u64,
    source: &mut S,
    out_size: u64,
    emit: &mut dyn FnMut(&[u8]) -> Result<()>,
) -> Result<()> {
    let props = coder.props();
    if props.len() != 5 {
        return Err(Error::UnsupportedCoder {
            method_id: method::PPMD,
        });
    }
    let order = u32::from(props[0]);
    let mem_size = u32::from_le_bytes(props[1..5].try_into().unwrap());
    if !(PPMD7_MIN_ORDER..=PPMD7_MAX_ORDER).contains(&order)
        || !(PPMD7_MIN_MEM_SIZE..=PPMD7_MAX_MEM_SIZE).contains(&mem_size)
    {
        return Err(Error::UnsupportedCoder {
            method_id: method::PPMD,
        });
    }

    let mut input = SourceReader::new(source, in_size);
    let mut reader = ppmd_rust::Ppmd7Decoder::new(&mut input, order, mem_size)
        .map_err(|e| Error::data(format!("PPMd init failed: {e:?}")))?;

    let produced = drive_chunks(&mut reader, out_size, emit)?;
    drop(reader);

    if produced < out_size {
        return Err(if input.remaining() > 0 {
            Error::data(format!(
                "PPMd stream ended {} bytes before the declared unpacked size",
                out_size - produced
            ))
        } else {
            Error::InputExhausted
        });
    }
    if input.remaining() > 0 {
        return Err(Error::data(format!(
            "PPMd coder left {} of its declared packed bytes unconsumed",
            input.remaining()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SliceSource;
    use std::io::Write;

    const ORDER: u32 = 6;
    const MEM_SIZE: u32 = 1 << 20;

    fn ppmd_props() -> Vec<u8> {
        let mut props = vec![ORDER as u8];
        props.extend_from_slice(&MEM_SIZE.to_le_bytes());
        props
    }

    fn ppmd_compress(data: &[u8]) -> Vec<u8> {
        let mut compressed = Vec::new();
        let mut encoder =
            ppmd_rust::Ppmd7Encoder::new(&mut compressed, ORDER, MEM_SIZE).unwrap();
        encoder.write_all(data).unwrap();
        encoder.finish(false).unwrap();
        compressed
    }

    fn decode_to_vec(compressed: &[u8], props: Vec<u8>, out_size: u64) -> Result<Vec<u8>> {
        let coder = Coder::simple(method::PPMD, Some(props));
        let mut src = SliceSource::new(compressed);
        let mut out = Vec::new();
        decode(
            &coder,
            compressed.len() as u64,
            &mut src,
            out_size,
            &mut |chunk| {
                out.extend_from_slice(chunk);
                Ok(())
            },
        )?;
        Ok(out)
    }

    #[test]
    fn test_ppmd_roundtrip() {
        let data = b"Prediction by partial matching works well on text like this \
                     sentence, which repeats itself. Prediction by partial matching \
                     works well on text.";
        let compressed = ppmd_compress(data);
        let out = decode_to_vec(&compressed, ppmd_props(), data.len() as u64).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_ppmd_props_length_unsupported() {
        let err = decode_to_vec(&[0u8; 8], vec![6, 0, 0], 4).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedCoder { method_id: method::PPMD }
        ));
    }

    #[test]
    fn test_ppmd_order_out_of_range() {
        let mut props = vec![1u8]; // below PPMD7_MIN_ORDER
        props.extend_from_slice(&MEM_SIZE.to_le_bytes());
        let err = decode_to_vec(&[0u8; 8], props, 4).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCoder { .. }));

        let mut props = vec![0xFFu8];
        props.extend_from_slice(&MEM_SIZE.to_le_bytes());
        let err = decode_to_vec(&[0u8; 8], props, 4).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCoder { .. }));
    }

    #[test]
    fn test_ppmd_mem_size_out_of_range() {
        let mut props = vec![ORDER as u8];
        props.extend_from_slice(&0u32.to_le_bytes());
        let err = decode_to_vec(&[0u8; 8], props, 4).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCoder { .. }));
    }

    #[test]
    fn test_ppmd_undeclared_trailing_input() {
        // Appending bytes the decoder never needs violates the exact
        // consumption rule.
        let data = b"exact consumption check";
        let mut compressed = ppmd_compress(data);
        compressed.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        let err = decode_to_vec(&compressed, ppmd_props(), data.len() as u64).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }
}
