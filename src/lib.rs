//! # zevenfold
//!
//! A decoder for 7z *folders*: the independently-decodable compressed
//! blocks of a 7z archive, described as a graph of chained coders (Copy,
//! LZMA, LZMA2, PPMd) and branch filters (BCJ, BCJ2) over one or more
//! packed input streams.
//!
//! This crate deliberately covers only the decode core. Archive header
//! parsing produces the [`Folder`] description and pack-size table and is
//! a separate concern, as are CLI plumbing and file-system layout; the
//! boundaries are the [`ByteSource`] trait on the input side and the
//! [`OutputSink`] trait on the output side.
//!
//! ## Decoding a folder into memory
//!
//! ```rust
//! use zevenfold::{Coder, Folder, FolderDecoder, SliceSource, method};
//!
//! fn main() -> zevenfold::Result<()> {
//!     // A trivial single-coder folder: 12 bytes stored uncompressed.
//!     let folder = Folder {
//!         coders: vec![Coder::simple(method::COPY, None)],
//!         bind_pairs: vec![],
//!         packed_streams: vec![0],
//!         unpack_sizes: vec![12],
//!         unpack_crc: None,
//!     };
//!     let archive = b"hello folder";
//!     let mut source = SliceSource::new(archive);
//!
//!     let mut decoder = FolderDecoder::new(&folder, &[12], &mut source, 0)?;
//!     let bytes = decoder.decode_to_vec()?;
//!     assert_eq!(&bytes, b"hello folder");
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming a folder across multiple files
//!
//! Large folders are decoded in bounded chunks straight into an
//! [`OutputSink`], split at the archive's declared file boundaries:
//!
//! ```rust
//! use zevenfold::{Coder, Folder, FolderDecoder, SliceSource, VecSink, method};
//!
//! fn main() -> zevenfold::Result<()> {
//!     let folder = Folder {
//!         coders: vec![Coder::simple(method::COPY, None)],
//!         bind_pairs: vec![],
//!         packed_streams: vec![0],
//!         unpack_sizes: vec![10],
//!         unpack_crc: None,
//!     };
//!     let archive = b"aaaabbbccc";
//!     let mut source = SliceSource::new(archive);
//!     let mut sink = VecSink::new();
//!
//!     let mut decoder = FolderDecoder::new(&folder, &[10], &mut source, 0)?;
//!     decoder.decode_to_sink(&mut sink, &[4, 3, 3])?;
//!     assert_eq!(sink.files, vec![b"aaaa".to_vec(), b"bbb".to_vec(), b"ccc".to_vec()]);
//!     Ok(())
//! }
//! ```
//!
//! ## Supported folder shapes
//!
//! Exactly three coder-graph shapes are accepted; see [`FolderKind`].
//! Anything else fails with [`Error::UnsupportedTopology`] or
//! [`Error::UnsupportedCoder`] before the byte source is touched. A
//! folder decode either produces its full declared unpacked size or
//! fails outright; there is no partial-success mode.
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `lzma` | Yes | LZMA decoding via `lzma-rust2` |
//! | `lzma2` | Yes | LZMA2 decoding (implies `lzma`) |
//! | `ppmd` | Yes | PPMd decoding via `ppmd-rust` |
//!
//! A folder that requires a compiled-out coder is rejected with
//! [`Error::UnsupportedCoder`].

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod decode;
pub mod error;
pub mod folder;
pub mod sink;
pub mod source;
pub mod topology;

pub use codec::branch::{BranchKind, BranchState};
pub use codec::bcj2::Bcj2Decoder;
pub use decode::FolderDecoder;
pub use error::{Error, Result};
pub use folder::{BindPair, Coder, Folder, method};
pub use sink::{FileSink, OutputSink, SplitSink, VecSink};
pub use source::{ByteSource, LookReader, SliceSource, SourceReader};
pub use topology::FolderKind;
