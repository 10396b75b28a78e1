//! Copy coder (no compression).

use crate::source::ByteSource;
use crate::{Error, Result};

/// Transfer chunk size (256 KiB).
const COPY_CHUNK_SIZE: usize = 1 << 18;

/// Streams `in_size` bytes from the source straight through `emit`.
///
/// A Copy coder transforms nothing, so the declared packed and unpacked
/// sizes must agree exactly; any difference is corruption in the folder
/// description.
pub(crate) fn decode<S: ByteSource + ?Sized>(
    in_size: u64,
    source: &mut S,
    out_size: u64,
    emit: &mut dyn FnMut(&[u8]) -> Result<()>,
) -> Result<()> {
    if in_size != out_size {
        return Err(Error::data(format!(
            "copy coder size mismatch: {in_size} packed vs {out_size} unpacked"
        )));
    }

    let mut remaining = in_size;
    while remaining > 0 {
        let want = remaining.min(COPY_CHUNK_SIZE as u64) as usize;
        let window = source.look(want)?;
        if window.is_empty() {
            return Err(Error::InputExhausted);
        }
        let n = window.len();
        emit(window)?;
        source.skip(n)?;
        remaining -= n as u64;
    }
    Ok(())
}
