//! Error types for folder decoding.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when decoding a 7z folder, along with a convenient
//! [`Result<T>`] type alias.
//!
//! A folder decode either fully succeeds (produces its entire declared
//! unpacked size, split across the destination files) or fails outright
//! with one of the variants below. Nothing is silently recovered inside
//! the decoder; the only local cleanup is releasing temporary buffers and
//! closing a partially-open output file. Callers decide whether a failed
//! folder aborts the whole extraction or is skipped.

use std::io;

/// The main error type for folder decoding.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | Source/sink seek, read or write failed |
/// | Compatibility | [`UnsupportedTopology`][Self::UnsupportedTopology], [`UnsupportedCoder`][Self::UnsupportedCoder] | Coder graph outside the supported catalogue |
/// | Corruption | [`Data`][Self::Data], [`InputExhausted`][Self::InputExhausted], [`CrcMismatch`][Self::CrcMismatch] | Malformed or truncated compressed data |
/// | Resources | [`Memory`][Self::Memory] | Buffer or decoder-state allocation refused |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred on the underlying byte source or output sink.
    ///
    /// No automatic retry is attempted; retry policy, if any, belongs to
    /// the collaborator that supplied the source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The folder's coder graph does not match any supported shape.
    ///
    /// The decoder recognizes exactly three folder shapes (single coder,
    /// codec + branch filter, and the four-coder BCJ2 arrangement).
    /// Anything else is rejected before a single byte of the source is
    /// touched, so no partial state is ever created for such a folder.
    #[error("unsupported folder topology: {0}")]
    UnsupportedTopology(&'static str),

    /// A recognized folder shape references a coder this build does not
    /// implement.
    ///
    /// This covers both methods that are never supported (Deflate, the
    /// non-x86/ARM branch filters, ...) and optional ones compiled out of
    /// this build (PPMd without the `ppmd` feature). Same no-I/O guarantee
    /// as [`UnsupportedTopology`][Self::UnsupportedTopology].
    #[error("unsupported coder method {method_id:#x}")]
    UnsupportedCoder {
        /// The 7z method identifier of the offending coder.
        method_id: u64,
    },

    /// The compressed data is malformed.
    ///
    /// Raised for declared-size mismatches, decoders that terminate in the
    /// wrong state, BCJ2 streams that run dry mid-instruction, and similar
    /// inconsistencies. Corrupted input cannot self-correct, so the folder
    /// is abandoned without retry.
    #[error("data error: {0}")]
    Data(String),

    /// The byte source ran out before the declared compressed size was
    /// consumed.
    ///
    /// Semantically a [`Data`][Self::Data] error; kept distinct because a
    /// truncated archive is worth diagnosing differently from a corrupt
    /// one.
    #[error("input exhausted before declared compressed size")]
    InputExhausted,

    /// An allocation for a temporary buffer or decoder state was refused.
    ///
    /// All buffers already allocated for the invocation are still released.
    #[error("allocation failed for decode buffer")]
    Memory,

    /// The decoded folder bytes do not match the declared CRC-32.
    #[error("folder CRC mismatch: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        /// CRC-32 declared in the folder description.
        expected: u32,
        /// CRC-32 of the bytes actually produced.
        actual: u32,
    },
}

impl Error {
    /// Shorthand for a [`Data`][Self::Data] error.
    pub(crate) fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }
}

/// A specialized `Result` type for folder decoding.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = Error::UnsupportedCoder { method_id: 0x40108 };
        assert_eq!(e.to_string(), "unsupported coder method 0x40108");

        let e = Error::CrcMismatch {
            expected: 0xDEADBEEF,
            actual: 0x12345678,
        };
        assert!(e.to_string().contains("0xdeadbeef"));
        assert!(e.to_string().contains("0x12345678"));
    }

    #[test]
    fn test_io_conversion() {
        let ioe = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        let e: Error = ioe.into();
        assert!(matches!(e, Error::Io(_)));
    }
}
