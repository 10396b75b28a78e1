//! LZMA and LZMA2 coder adapters.
//!
//! Decompression itself is delegated to `lzma-rust2`; this module owns
//! the 7z-side contract: property-blob validation, bounding the input to
//! the coder's declared packed window, and enforcing that the stream
//! terminates at exactly the declared unpacked size.

use std::io::Read;

use crate::codec::drive_chunks;
use crate::folder::Coder;
use crate::source::{ByteSource, SourceReader};
use crate::{Error, Result};

/// Decodes the LZMA2 dictionary size from the single property byte.
///
/// Values 0..=39 alternate powers of two and three-halves steps between
/// 4 KiB and 3 GiB; 40 means 4 GiB - 1.
pub(crate) fn decode_lzma2_dict_size(prop: u8) -> Result<u32> {
    if prop > 40 {
        return Err(Error::data(format!(
            "invalid LZMA2 dictionary size property: {prop}"
        )));
    }
    if prop == 40 {
        return Ok(0xFFFF_FFFF);
    }
    let base_log = u32::from(prop) / 2 + 12;
    Ok(if prop % 2 == 0 {
        1u32 << base_log
    } else {
        3u32 << (base_log - 1)
    })
}

/// Termination bookkeeping shared by the LZMA and LZMA2 paths.
///
/// `produced` short of `out_size` is corruption or a dry source; a stream
/// that keeps producing past the declared size is corruption. Leftover
/// packed bytes after a clean finish are tolerated (the declared window
/// bounds what the decoder may consume, not what it must).
fn check_termination(
    name: &str,
    produced: u64,
    out_size: u64,
    extra_byte: bool,
    input_left: u64,
) -> Result<()> {
    if produced < out_size {
        return Err(if input_left > 0 {
            Error::data(format!(
                "{name} stream ended {} bytes before the declared unpacked size",
                out_size - produced
            ))
        } else {
            Error::InputExhausted
        });
    }
    if extra_byte {
        return Err(Error::data(format!(
            "{name} stream continues past the declared unpacked size"
        )));
    }
    if input_left > 0 {
        log::debug!("{name} coder left {input_left} packed bytes unconsumed");
    }
    Ok(())
}

/// Probes a finished decoder for one extra byte.
fn probe_extra(reader: &mut dyn Read) -> Result<bool> {
    let mut probe = [0u8; 1];
    match reader.read(&mut probe) {
        Ok(0) => Ok(false),
        Ok(_) => Ok(true),
        // A decoder choking right at the declared boundary is corruption
        // of the same kind as producing extra bytes.
        Err(e) => Err(Error::data(format!("decoder failed past declared size: {e}"))),
    }
}

/// Decodes one LZMA coder window through `emit`.
pub(crate) fn decode_lzma<S: ByteSource + ?Sized>(
    coder: &Coder,
    in_size: u64,
    source: &mut S,
    out_size: u64,
    emit: &mut dyn FnMut(&[u8]) -> Result<()>,
) -> Result<()> {
    let props = coder.props();
    if props.len() != 5 {
        return Err(Error::data(
            "LZMA coder requires a 5-byte property blob (props byte + dictionary size)",
        ));
    }
    let props_byte = props[0];
    let dict_size = u32::from_le_bytes(props[1..5].try_into().unwrap());

    let mut input = SourceReader::new(source, in_size);
    let mut reader =
        lzma_rust2::LzmaReader::new_with_props(&mut input, out_size, props_byte, dict_size, None)
            .map_err(|e| Error::data(format!("LZMA init failed: {e}")))?;

    let produced = drive_chunks(&mut reader, out_size, emit)?;
    let extra = if produced == out_size {
        probe_extra(&mut reader)?
    } else {
        false
    };
    drop(reader);

    check_termination("LZMA", produced, out_size, extra, input.remaining())
}

/// Decodes one LZMA2 coder window through `emit`.
pub(crate) fn decode_lzma2<S: ByteSource + ?Sized>(
    coder: &Coder,
    in_size: u64,
    source: &mut S,
    out_size: u64,
    emit: &mut dyn FnMut(&[u8]) -> Result<()>,
) -> Result<()> {
    let props = coder.props();
    if props.len() != 1 {
        return Err(Error::data(
            "LZMA2 coder requires exactly one property byte (dictionary size)",
        ));
    }
    let dict_size = decode_lzma2_dict_size(props[0])?;

    let mut input = SourceReader::new(source, in_size);
    let mut reader = lzma_rust2::Lzma2Reader::new(&mut input, dict_size, None);

    let produced = drive_chunks(&mut reader, out_size, emit)?;
    let extra = if produced == out_size {
        probe_extra(&mut reader)?
    } else {
        false
    };
    drop(reader);

    check_termination("LZMA2", produced, out_size, extra, input.remaining())
}
